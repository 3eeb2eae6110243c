use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Participation mode a note declares for one of its peer vaults.
///
/// `Live` peers receive pushes, deletions and renames; a `Watch` peer is one
/// the declaring vault only ever pulls from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerMode {
    Live,
    Watch,
}

impl PeerMode {
    #[must_use]
    pub fn is_live(self) -> bool {
        matches!(self, Self::Live)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Watch => "watch",
        }
    }
}

/// In-memory record for one note discovered by the ephemeral index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRec {
    /// Stable note identity from the `cast-id` header field.
    pub cast_id: String,
    /// Vault-relative path, POSIX separators.
    pub relpath: String,
    /// Normalized content digest, lowercase hex.
    pub digest: String,
    /// Declared peers, name to mode.
    pub peers: BTreeMap<String, PeerMode>,
    /// Declared codebases (`cast-codebases`); carried but never mirrored.
    pub codebases: Vec<String>,
}

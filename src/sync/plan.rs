//! Executable plan for one (note, peer) pair.

use std::path::PathBuf;

use super::decide::SyncDecision;

/// One action decided by the engine, with everything the executor needs.
#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub cast_id: String,
    pub peer_name: String,
    /// The peer's cast root (parent of its vault).
    pub peer_root: PathBuf,
    /// The peer's vault content directory.
    pub peer_vault: PathBuf,
    pub decision: SyncDecision,
    /// Vault-relative path of the local copy, when one exists.
    pub local_rel: Option<String>,
    /// Vault-relative path of the peer copy, when one exists.
    pub peer_rel: Option<String>,
    pub local_digest: Option<String>,
    pub peer_digest: Option<String>,
    pub baseline_digest: Option<String>,
}

impl SyncPlan {
    /// Short human-readable form for dry runs and logs.
    #[must_use]
    pub fn describe(&self) -> String {
        let subject = self
            .local_rel
            .as_deref()
            .or(self.peer_rel.as_deref())
            .unwrap_or(self.cast_id.as_str());
        format!("{subject} -> {}: {}", self.peer_name, self.decision.as_str())
    }
}

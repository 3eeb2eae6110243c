//! Per-vault baseline store (`.cast/syncstate.json`).
//!
//! Baselines record the last-agreed digest for each (cast-id, peer) pair and
//! are kept symmetric: our entry for (X, peer N) matches N's entry for
//! (X, us) after every successful action.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::CastError;
use crate::fsutil;

pub const SYNCSTATE_VERSION: u32 = 1;

/// Baseline entry for a file/peer pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineEntry {
    /// SHA-256 hex digest.
    pub digest: String,
    /// Timestamp, `YYYY-MM-DD HH:MM`.
    pub ts: String,
}

/// Persistent sync state for one vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    pub version: u32,
    #[serde(default)]
    pub updated_at: String,
    /// cast-id -> peer name -> baseline.
    #[serde(default)]
    pub baselines: BTreeMap<String, BTreeMap<String, BaselineEntry>>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            version: SYNCSTATE_VERSION,
            updated_at: crate::now_ts(),
            baselines: BTreeMap::new(),
        }
    }
}

impl SyncState {
    /// Load the sync state for a cast root, empty when absent.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(root: &Path) -> Result<Self, CastError> {
        let path = fsutil::syncstate_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Persist atomically, refreshing `updated_at`.
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, root: &Path) -> Result<(), CastError> {
        let mut copy = self.clone();
        copy.updated_at = crate::now_ts();
        let text = serde_json::to_string_pretty(&copy)?;
        fsutil::atomic_write(&fsutil::syncstate_path(root), &text)?;
        Ok(())
    }

    /// Baseline digest for a (cast-id, peer) pair.
    #[must_use]
    pub fn baseline(&self, cast_id: &str, peer: &str) -> Option<&str> {
        self.baselines.get(cast_id)?.get(peer).map(|e| e.digest.as_str())
    }

    /// Record a baseline digest for a (cast-id, peer) pair.
    pub fn update(&mut self, cast_id: &str, peer: &str, digest: &str) {
        self.baselines.entry(cast_id.to_string()).or_default().insert(
            peer.to_string(),
            BaselineEntry { digest: digest.to_string(), ts: crate::now_ts() },
        );
    }

    /// Drop the baseline for a (cast-id, peer) pair, pruning empty inner
    /// maps.
    pub fn clear(&mut self, cast_id: &str, peer: &str) {
        if let Some(peers) = self.baselines.get_mut(cast_id) {
            peers.remove(peer);
            if peers.is_empty() {
                self.baselines.remove(cast_id);
            }
        }
    }

    /// Update our baseline and mirror the entry into the peer's store under
    /// *our* name, keeping the pair symmetric.
    ///
    /// # Errors
    /// Returns an error if the peer's store cannot be loaded or saved.
    pub fn update_both(
        &mut self,
        cast_id: &str,
        peer: &str,
        digest: &str,
        our_name: &str,
        peer_root: Option<&Path>,
    ) -> Result<(), CastError> {
        self.update(cast_id, peer, digest);
        if let Some(peer_root) = peer_root {
            let mut theirs = Self::load(peer_root)?;
            theirs.update(cast_id, our_name, digest);
            theirs.save(peer_root)?;
        }
        Ok(())
    }

    /// Clear our baseline and the mirrored entry in the peer's store.
    ///
    /// # Errors
    /// Returns an error if the peer's store cannot be loaded or saved.
    pub fn clear_both(
        &mut self,
        cast_id: &str,
        peer: &str,
        our_name: &str,
        peer_root: Option<&Path>,
    ) -> Result<(), CastError> {
        self.clear(cast_id, peer);
        if let Some(peer_root) = peer_root {
            let mut theirs = Self::load(peer_root)?;
            theirs.clear(cast_id, our_name);
            theirs.save(peer_root)?;
        }
        Ok(())
    }
}

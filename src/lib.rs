#![forbid(unsafe_code)]

//! Cast Sync: peer-to-peer synchronization for vaults of notes.
//!
//! A vault is a directory with a `.cast/` control subdirectory and a content
//! subdirectory of text-with-frontmatter notes. Notes declare a stable
//! `cast-id` and a set of peer vaults; the engine performs three-way
//! reconciliation between vault pairs so every note converges to the same
//! content and path across its declared peers.

pub mod config;
pub mod conflict;
pub mod digest;
pub mod errors;
pub mod events;
pub mod fsutil;
pub mod index;
pub mod lockfile;
pub mod logger;
pub mod registry;
pub mod rename;
pub mod sync;
pub mod syncstate;
pub mod types;
pub mod yamlio;

pub use config::CastConfig;
pub use errors::CastError;
pub use registry::{CastEntry, CastHome, Registry};
pub use sync::{HorizontalSync, SyncDecision, SyncOptions};
pub use types::{FileRec, PeerMode};

/// Timestamp in the `YYYY-MM-DD HH:MM` form used across all persisted
/// documents.
#[must_use]
pub fn now_ts() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M").to_string()
}

/// Find the cast root containing `start` by walking up to the nearest
/// directory with a `.cast/` subdirectory.
#[must_use]
pub fn find_cast_root(start: &std::path::Path) -> Option<std::path::PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if fsutil::cast_dir(dir).is_dir() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

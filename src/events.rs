//! JSON-lines event log under the control directory (`.cast/sync.log`).

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::errors::CastError;
use crate::fsutil;

/// One structured sync event.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub ts: String,
    pub event: String,
    pub cast_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    pub peer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Event {
    #[must_use]
    pub fn new(event: &str, cast_id: &str, peer: &str) -> Self {
        Self {
            ts: crate::now_ts(),
            event: event.to_string(),
            cast_id: cast_id.to_string(),
            from: None,
            to: None,
            peer: peer.to_string(),
            path: None,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    #[must_use]
    pub fn with_move(mut self, from: &str, to: &str) -> Self {
        self.from = Some(from.to_string());
        self.to = Some(to.to_string());
        self
    }
}

/// Append an event to the vault's log. Append-only within a run; failures
/// are reported, never fatal to the sync itself.
///
/// # Errors
/// Returns an error if the log cannot be opened or written.
pub fn record(root: &Path, event: &Event) -> Result<(), CastError> {
    let path = fsutil::event_log_path(root);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().append(true).create(true).open(&path)?;
    let line = serde_json::to_string(event)?;
    writeln!(file, "{line}")?;
    Ok(())
}

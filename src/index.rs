//! Ephemeral per-vault index.
//!
//! A single pass over the vault's note files, producing a by-id and by-path
//! view plus the union of declared peers. The index is never persisted; it
//! is rebuilt for every run.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use walkdir::WalkDir;

use crate::digest;
use crate::errors::CastError;
use crate::fsutil;
use crate::types::FileRec;
use crate::yamlio::{self, ParsedNote};

#[derive(Debug, Default)]
pub struct EphemeralIndex {
    by_id: BTreeMap<String, FileRec>,
    by_path: BTreeMap<String, FileRec>,
    peers: BTreeSet<String>,
    codebases: BTreeSet<String>,
}

impl EphemeralIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan a vault into this index. Indices are additive, so multiple
    /// targeted scans accumulate.
    ///
    /// With `fixup` (local scans only), notes that declare peer intent but
    /// lack a `cast-id` get one generated and written back. `limit` restricts
    /// recording to a single relpath or cast-id.
    ///
    /// # Errors
    /// Propagates I/O errors from the scan; unreadable notes are skipped with
    /// a warning.
    pub fn scan(
        &mut self,
        vault_path: &Path,
        fixup: bool,
        limit: Option<&str>,
    ) -> Result<(), CastError> {
        let limit_rel = limit.map(fsutil::to_posix);
        for entry in WalkDir::new(vault_path)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("scan error under {}: {e}", vault_path.display());
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let relpath = match path.strip_prefix(vault_path) {
                Ok(rel) => fsutil::to_posix(&rel.to_string_lossy()),
                Err(_) => continue,
            };

            let mut note = match yamlio::read_note(path) {
                Ok(n) => n,
                Err(e) => {
                    log::warn!("skipping unreadable note {}: {e}", path.display());
                    continue;
                }
            };
            if !note.has_cast_fields {
                continue;
            }

            if fixup && self.fixup_note(path, &mut note)? {
                log::info!("generated cast-id for {relpath}");
            }

            let rec = build_rec(&note, &relpath);
            if let (Some(lim_rel), Some(lim)) = (&limit_rel, limit) {
                if rec.relpath != *lim_rel && rec.cast_id != lim {
                    continue;
                }
            }

            self.peers.extend(rec.peers.keys().cloned());
            self.codebases.extend(rec.codebases.iter().cloned());

            if !rec.cast_id.is_empty() {
                if let Some(first) = self.by_id.get(&rec.cast_id) {
                    if first.relpath != rec.relpath {
                        log::warn!(
                            "duplicate cast-id {} at {} (already at {}); keeping first",
                            rec.cast_id,
                            rec.relpath,
                            first.relpath
                        );
                    }
                } else {
                    self.by_id.insert(rec.cast_id.clone(), rec.clone());
                }
            }
            self.by_path.insert(rec.relpath.clone(), rec);
        }
        Ok(())
    }

    /// Generate missing cast fields for a note with declared peer intent and
    /// write it back. Returns whether the file was modified.
    fn fixup_note(&self, path: &Path, note: &mut ParsedNote) -> Result<bool, CastError> {
        let Some(header) = note.header.as_mut() else {
            return Ok(false);
        };
        let declares_peers = header.contains_key(serde_yaml::Value::from("cast-vaults"));
        if !declares_peers {
            return Ok(false);
        }
        let modified = yamlio::ensure_cast_fields(header, true);
        if modified {
            yamlio::write_cast_file(path, header, &note.body, true)?;
        }
        Ok(modified)
    }

    #[must_use]
    pub fn get_by_id(&self, cast_id: &str) -> Option<&FileRec> {
        self.by_id.get(cast_id)
    }

    #[must_use]
    pub fn get_by_path(&self, relpath: &str) -> Option<&FileRec> {
        self.by_path.get(relpath)
    }

    /// All indexed records, by id.
    #[must_use]
    pub fn records(&self) -> impl Iterator<Item = &FileRec> {
        self.by_id.values()
    }

    /// Union of peer names declared across all records.
    #[must_use]
    pub fn all_peers(&self) -> BTreeSet<String> {
        self.peers.clone()
    }

    /// Union of codebase names declared across all records.
    #[must_use]
    pub fn all_codebases(&self) -> BTreeSet<String> {
        self.codebases.clone()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}

/// Build an index for one vault in a single call.
///
/// # Errors
/// Propagates scan errors.
pub fn build_ephemeral_index(
    vault_path: &Path,
    fixup: bool,
    limit: Option<&str>,
) -> Result<EphemeralIndex, CastError> {
    let mut index = EphemeralIndex::new();
    index.scan(vault_path, fixup, limit)?;
    Ok(index)
}

fn build_rec(note: &ParsedNote, relpath: &str) -> FileRec {
    let header = note.header.as_ref();
    let cast_id = header
        .and_then(|h| yamlio::get_str(h, "cast-id"))
        .unwrap_or_default()
        .to_string();
    let peers = header
        .map(|h| yamlio::parse_vault_entries(h.get(serde_yaml::Value::from("cast-vaults"))))
        .unwrap_or_default();
    let codebases =
        header.map(|h| yamlio::get_string_seq(h, "cast-codebases")).unwrap_or_default();
    FileRec {
        cast_id,
        relpath: relpath.to_string(),
        digest: digest::digest_note(note),
        peers,
        codebases,
    }
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_name().to_str().is_some_and(|s| s.starts_with('.'))
}

// Shared sandbox helpers for integration tests: isolated cast home plus
// registered vaults under one temp dir.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use cast_sync::conflict::{ConflictPreview, ConflictResolution, ConflictUi};
use cast_sync::{CastConfig, CastHome, HorizontalSync, Registry, SyncOptions};

pub struct Sandbox {
    _tmp: tempfile::TempDir,
    pub base: PathBuf,
    pub home: CastHome,
}

pub struct VaultHandle {
    pub root: PathBuf,
    pub vault: PathBuf,
    pub name: String,
}

impl Sandbox {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().expect("create sandbox tempdir");
        let base = tmp.path().to_path_buf();
        let home = CastHome::at(base.join(".cast-home"));
        Self { _tmp: tmp, base, home }
    }

    /// Create and register a vault with content directory `Cast/`.
    pub fn create_vault(&self, name: &str) -> VaultHandle {
        let root = self.base.join(name);
        fs::create_dir_all(root.join(".cast")).unwrap();
        fs::create_dir_all(root.join("Cast")).unwrap();
        let config = CastConfig::new(name);
        config.save(&root).unwrap();
        Registry::register(&self.home, &root).unwrap();
        VaultHandle { vault: root.join("Cast"), root, name: name.to_string() }
    }

    pub fn hsync(&self, vault: &VaultHandle, opts: &SyncOptions) -> i32 {
        let mut hs = HorizontalSync::new(&vault.root, &self.home).unwrap();
        hs.sync(opts).unwrap()
    }

    pub fn hsync_with_ui(
        &self,
        vault: &VaultHandle,
        opts: &SyncOptions,
        ui: &mut dyn ConflictUi,
    ) -> i32 {
        let mut hs = HorizontalSync::new(&vault.root, &self.home).unwrap();
        hs.sync_with_ui(opts, ui).unwrap()
    }
}

impl VaultHandle {
    pub fn note_path(&self, rel: &str) -> PathBuf {
        self.vault.join(rel)
    }

    pub fn syncstate(&self) -> cast_sync::syncstate::SyncState {
        cast_sync::syncstate::SyncState::load(&self.root).unwrap()
    }
}

/// Note text with front matter declaring the given peers. Peer names without
/// an explicit mode default to live.
pub fn mk_note(cast_id: &str, title: &str, body: &str, peers: &[&str]) -> String {
    let vaults = peers
        .iter()
        .map(|p| {
            if p.contains('(') {
                format!("  - \"{p}\"")
            } else {
                format!("  - \"{p} (live)\"")
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "---\ncast-id: \"{cast_id}\"\ncast-vaults:\n{vaults}\ncast-version: 1\ntitle: \"{title}\"\n---\n{body}"
    )
}

pub fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

pub fn read_file(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

/// Conflict collaborator that replays a fixed script of choices; anything
/// past the script skips.
pub struct ScriptedUi(pub VecDeque<ConflictResolution>);

impl ScriptedUi {
    pub fn one(choice: ConflictResolution) -> Self {
        Self(VecDeque::from([choice]))
    }
}

impl ConflictUi for ScriptedUi {
    fn choose(&mut self, _preview: &ConflictPreview) -> ConflictResolution {
        self.0.pop_front().unwrap_or(ConflictResolution::Skip)
    }
}

/// Default options for tests: non-interactive, no cascade.
pub fn opts() -> SyncOptions {
    SyncOptions { cascade: false, ..SyncOptions::default() }
}

pub fn opts_cascade() -> SyncOptions {
    SyncOptions::default()
}

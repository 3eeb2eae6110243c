//! Machine-wide registry of installed casts.
//!
//! Stores installed cast roots in a per-user file so vaults can discover
//! peers by name across the machine, with no per-vault wiring. The registry
//! is read-mostly; every writer replaces the whole file atomically.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::CastConfig;
use crate::errors::CastError;
use crate::fsutil;

pub const REGISTRY_VERSION: u32 = 1;

/// Per-user Cast home directory. Parameterized so tests stay hermetic; the
/// engine threads a `&CastHome` through rather than consulting a global.
#[derive(Debug, Clone)]
pub struct CastHome {
    dir: PathBuf,
}

impl CastHome {
    /// Resolve from the `CAST_HOME` environment variable, falling back to
    /// `~/.cast`.
    #[must_use]
    pub fn from_env() -> Self {
        let dir = std::env::var_os("CAST_HOME").map_or_else(
            || dirs_next::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".cast"),
            PathBuf::from,
        );
        Self { dir }
    }

    /// Use an explicit directory.
    #[must_use]
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn registry_path(&self) -> PathBuf {
        self.dir.join("registry.json")
    }
}

/// One installed cast root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastEntry {
    #[serde(skip)]
    pub cast_id: String,
    pub name: String,
    pub root: PathBuf,
    pub vault_location: String,
}

impl CastEntry {
    /// Absolute path to the entry's vault content directory.
    #[must_use]
    pub fn vault_path(&self) -> PathBuf {
        self.root.join(&self.vault_location)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    pub version: u32,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub casts: BTreeMap<String, CastEntry>,
}

impl Default for Registry {
    fn default() -> Self {
        Self { version: REGISTRY_VERSION, updated_at: String::new(), casts: BTreeMap::new() }
    }
}

impl Registry {
    /// Load the registry, creating an empty one on first use.
    ///
    /// # Errors
    /// `RegistryIo` if the file exists but cannot be read or parsed.
    pub fn load(home: &CastHome) -> Result<Self, CastError> {
        let path = home.registry_path();
        if !path.exists() {
            let reg = Self::default();
            reg.save(home)?;
            return Ok(reg);
        }
        let text = fs::read_to_string(&path)
            .map_err(|e| CastError::RegistryIo(format!("{}: {e}", path.display())))?;
        let mut reg: Self = serde_json::from_str(&text)
            .map_err(|e| CastError::RegistryIo(format!("{}: {e}", path.display())))?;
        for (id, entry) in &mut reg.casts {
            entry.cast_id.clone_from(id);
        }
        Ok(reg)
    }

    /// Persist atomically, refreshing `version` and `updated_at`.
    ///
    /// # Errors
    /// `RegistryIo` if serialization or the write fails.
    pub fn save(&self, home: &CastHome) -> Result<(), CastError> {
        let mut copy = self.clone();
        copy.version = REGISTRY_VERSION;
        copy.updated_at = crate::now_ts();
        let text = serde_json::to_string_pretty(&copy)
            .map_err(|e| CastError::RegistryIo(e.to_string()))?;
        fsutil::atomic_write(&home.registry_path(), &text)
            .map_err(|e| CastError::RegistryIo(e.to_string()))?;
        Ok(())
    }

    /// Register or update a cast root, reading its `.cast/config.yaml`.
    /// Replaces any prior entry with the same id, and evicts entries from
    /// other roots that claim the same name.
    ///
    /// # Errors
    /// Config errors from the root, or `RegistryIo` on persistence failure.
    pub fn register(home: &CastHome, root: &Path) -> Result<CastEntry, CastError> {
        let root = fsutil::canonicalize_lossy(root);
        let config = CastConfig::load(&root)?;

        let mut reg = Self::load(home)?;
        reg.casts.retain(|id, entry| {
            *id == config.cast_id || entry.name != config.cast_name
        });
        let entry = CastEntry {
            cast_id: config.cast_id.clone(),
            name: config.cast_name.clone(),
            root,
            vault_location: config.cast_location.clone(),
        };
        reg.casts.insert(config.cast_id, entry.clone());
        reg.save(home)?;
        Ok(entry)
    }

    #[must_use]
    pub fn resolve_by_id(&self, cast_id: &str) -> Option<&CastEntry> {
        self.casts.get(cast_id)
    }

    #[must_use]
    pub fn resolve_by_name(&self, name: &str) -> Option<&CastEntry> {
        self.casts.values().find(|e| e.name == name)
    }

    #[must_use]
    pub fn list(&self) -> Vec<&CastEntry> {
        self.casts.values().collect()
    }

    /// Remove an entry by id, name, or root path. Returns the removed entry.
    ///
    /// # Errors
    /// `RegistryIo` on persistence failure.
    pub fn unregister(
        home: &CastHome,
        cast_id: Option<&str>,
        name: Option<&str>,
        root: Option<&Path>,
    ) -> Result<Option<CastEntry>, CastError> {
        let mut reg = Self::load(home)?;
        let root = root.map(fsutil::canonicalize_lossy);
        let target = reg
            .casts
            .iter()
            .find(|(id, entry)| {
                cast_id.is_some_and(|c| c == *id)
                    || name.is_some_and(|n| n == entry.name)
                    || root.as_deref().is_some_and(|r| r == entry.root.as_path())
            })
            .map(|(id, _)| id.clone());
        let Some(id) = target else {
            return Ok(None);
        };
        let removed = reg.casts.remove(&id);
        reg.save(home)?;
        Ok(removed)
    }
}

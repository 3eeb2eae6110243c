use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::CastError;
use crate::fsutil;

fn default_version() -> u32 {
    1
}

fn default_location() -> String {
    "Cast".to_string()
}

/// Vault identity, stored in `.cast/config.yaml`.
///
/// `cast-id` and `cast-name` are stable for the vault's lifetime; renaming
/// either requires re-registration in the machine registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastConfig {
    #[serde(rename = "cast-version", default = "default_version")]
    pub cast_version: u32,
    #[serde(rename = "cast-id")]
    pub cast_id: String,
    #[serde(rename = "cast-name")]
    pub cast_name: String,
    #[serde(rename = "cast-location", default = "default_location")]
    pub cast_location: String,
}

impl CastConfig {
    /// Create a fresh config with a generated id.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            cast_version: 1,
            cast_id: uuid::Uuid::new_v4().to_string(),
            cast_name: name.to_string(),
            cast_location: default_location(),
        }
    }

    /// Load the config for a cast root.
    ///
    /// # Errors
    /// `ConfigMissing` if `.cast/config.yaml` does not exist, `ConfigInvalid`
    /// if it cannot be parsed or required fields are empty.
    pub fn load(root: &Path) -> Result<Self, CastError> {
        let path = fsutil::config_path(root);
        if !path.exists() {
            return Err(CastError::ConfigMissing(path));
        }
        let text = fs::read_to_string(&path)?;
        let config: Self =
            serde_yaml::from_str(&text).map_err(|e| CastError::ConfigInvalid(e.to_string()))?;
        if config.cast_id.is_empty() || config.cast_name.is_empty() {
            return Err(CastError::ConfigInvalid(
                "config.yaml missing required fields: cast-id/cast-name".to_string(),
            ));
        }
        Ok(config)
    }

    /// Persist the config for a cast root, atomically.
    ///
    /// # Errors
    /// Returns an error if serialization or the atomic write fails.
    pub fn save(&self, root: &Path) -> Result<(), CastError> {
        let text = serde_yaml::to_string(self)?;
        fsutil::atomic_write(&fsutil::config_path(root), &text)?;
        Ok(())
    }

    /// Absolute path to the vault content directory under `root`.
    #[must_use]
    pub fn vault_path(&self, root: &Path) -> std::path::PathBuf {
        root.join(&self.cast_location)
    }
}

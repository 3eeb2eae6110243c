use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CastError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Serde YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("vault lock busy: {0}")]
    LockBusy(PathBuf),

    #[error("cast not initialized: {0} not found")]
    ConfigMissing(PathBuf),

    #[error("invalid config.yaml: {0}")]
    ConfigInvalid(String),

    #[error("registry error: {0}")]
    RegistryIo(String),

    #[error("peer not found in registry: {0}")]
    PeerUnresolved(String),

    #[error("peer '{name}' has no control directory at {root}")]
    PeerMissingControlDir { name: String, root: PathBuf },

    #[error("malformed front matter in {0}")]
    MalformedHeader(PathBuf),

    #[error("execute failed for {path}: {source}")]
    ExecuteIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// Name of the control subdirectory inside a cast root.
pub const CAST_DIR: &str = ".cast";

/// Control directory for a cast root.
#[must_use]
pub fn cast_dir(root: &Path) -> PathBuf {
    root.join(CAST_DIR)
}

/// Path to the vault config inside a cast root.
#[must_use]
pub fn config_path(root: &Path) -> PathBuf {
    cast_dir(root).join("config.yaml")
}

/// Path to the persisted baselines inside a cast root.
#[must_use]
pub fn syncstate_path(root: &Path) -> PathBuf {
    cast_dir(root).join("syncstate.json")
}

/// Path to the conflict sidecar directory inside a cast root.
#[must_use]
pub fn conflicts_dir(root: &Path) -> PathBuf {
    cast_dir(root).join("conflicts")
}

/// Path to the JSON-lines event log inside a cast root.
#[must_use]
pub fn event_log_path(root: &Path) -> PathBuf {
    cast_dir(root).join("sync.log")
}

/// Path to the advisory lockfile inside a cast root.
#[must_use]
pub fn lockfile_path(root: &Path) -> PathBuf {
    cast_dir(root).join(".lock")
}

/// Write `contents` to `path` atomically: the bytes go to a temp file in the
/// same directory, which is then renamed over the destination. Same-directory
/// rename keeps the replacement on one filesystem, so readers observe either
/// the previous file or the new one, never a partial write.
///
/// # Errors
/// Returns an error if the parent directory cannot be created, or if writing
/// or persisting the temp file fails.
pub fn atomic_write(path: &Path, contents: &str) -> io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Canonicalize a path, falling back to the path itself when the file system
/// cannot resolve it (e.g. the path does not exist yet).
#[must_use]
pub fn canonicalize_lossy(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Convert a relative path to POSIX separators, collapsing `./` prefixes and
/// duplicate slashes. Vault-relative paths are stored in this form.
#[must_use]
pub fn to_posix(rel: &str) -> String {
    let mut s = rel.replace('\\', "/");
    while s.contains("//") {
        s = s.replace("//", "/");
    }
    let s = s.strip_prefix("./").unwrap_or(&s);
    s.trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        atomic_write(&path, "one").unwrap();
        atomic_write(&path, "two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
    }

    #[test]
    fn to_posix_normalizes() {
        assert_eq!(to_posix("./a//b\\c/"), "a/b/c");
        assert_eq!(to_posix("a/b"), "a/b");
    }
}

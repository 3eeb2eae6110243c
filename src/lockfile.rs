//! Exclusive per-vault process lock.
//!
//! One advisory OS file lock on a dedicated, empty lockfile inside the
//! control directory. Every mutating entry point must hold the vault's lock
//! from the first scan to the last baseline write.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::errors::CastError;
use crate::fsutil;

/// How long acquisition may block before failing with `LockBusy`.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
const RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Held exclusive lock on a vault. Released on drop.
#[derive(Debug)]
pub struct VaultLock {
    file: fs::File,
    path: PathBuf,
}

impl VaultLock {
    /// Acquire the lock for a cast root, blocking up to a short bound.
    ///
    /// # Errors
    /// `LockBusy` when another process holds the lock past the bound; `Io`
    /// when the lockfile cannot be created.
    pub fn acquire(root: &Path) -> Result<Self, CastError> {
        let path = fsutil::lockfile_path(root);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().read(true).write(true).create(true).truncate(false).open(&path)?;

        let deadline = Instant::now() + ACQUIRE_TIMEOUT;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(Self { file, path }),
                Err(_) if Instant::now() < deadline => std::thread::sleep(RETRY_INTERVAL),
                Err(_) => return Err(CastError::LockBusy(path)),
            }
        }
    }

    /// Path of the underlying lockfile.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for VaultLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_is_exclusive_within_process() {
        let dir = tempfile::tempdir().unwrap();
        let lock = VaultLock::acquire(dir.path()).unwrap();
        assert!(lock.path().exists());
        drop(lock);
        // Reacquire after release succeeds immediately.
        let _again = VaultLock::acquire(dir.path()).unwrap();
    }
}

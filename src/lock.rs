// src/lock.rs

//! Host-wide exclusive lock for mutating operations
//!
//! The configuration tree, the kernel-argument store, and the installed
//! package set are host-global resources with no OS-level locking across
//! this tool's multi-step call sequences. Only one systune instance may
//! mutate a host at a time; every mutating entry point acquires this lock
//! for its duration and releases it on all exit paths via drop.

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Advisory exclusive lock guarding host mutation.
pub struct HostLock {
    /// The lock file handle (kept open to maintain the lock)
    #[allow(dead_code)]
    file: File,
    path: PathBuf,
}

impl HostLock {
    /// Default lock path for the tool
    pub const DEFAULT_PATH: &'static str = "/var/lib/systune/systune.lock";

    /// Acquire the lock, retrying briefly before giving up.
    ///
    /// Retries: 0ms, 100ms, 200ms, 400ms, 800ms (total ~1.5s wait). A lock
    /// still held after that surfaces as `Error::HostLocked` rather than
    /// blocking indefinitely.
    pub fn acquire<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(&path)?;

        const MAX_RETRIES: u32 = 5;
        for attempt in 0..MAX_RETRIES {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    info!("Acquired host lock at {}", path.display());
                    return Ok(Self { file, path });
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if attempt < MAX_RETRIES - 1 {
                        let delay = Duration::from_millis(100 * (1 << attempt));
                        debug!(
                            "Host lock busy, retrying in {}ms (attempt {}/{})",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES
                        );
                        std::thread::sleep(delay);
                    }
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }

        Err(Error::HostLocked(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for HostLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        debug!("Released host lock at {}", self.path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_and_release() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.lock");

        let lock = HostLock::acquire(&path).unwrap();
        assert!(path.exists());
        drop(lock);

        // Re-acquirable after release
        let lock2 = HostLock::acquire(&path).unwrap();
        drop(lock2);
    }

    #[test]
    fn test_second_acquire_fails_while_held() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.lock");

        let _held = HostLock::acquire(&path).unwrap();
        let second = HostLock::acquire(&path);
        assert!(matches!(second, Err(Error::HostLocked(_))));
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/state/test.lock");

        let lock = HostLock::acquire(&path).unwrap();
        assert_eq!(lock.path(), path.as_path());
    }
}

//! Advisory file locks for cross-process coordination
//!
//! Tool installation is the only place Atmos coordinates across processes:
//! parallel invocations installing the same `(owner, repo)` must not race.
//! The lock file lives next to the installed versions and is held for the
//! whole install; waiters block with backoff and re-verify presence after
//! acquiring.

use crate::{Error, NormalizedPath, Result};
use backoff::ExponentialBackoff;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::time::Duration;

/// An exclusive advisory lock, released on drop.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: NormalizedPath,
}

impl FileLock {
    /// Acquire an exclusive lock, blocking with backoff up to `timeout`.
    pub fn acquire(path: &NormalizedPath, timeout: Duration) -> Result<Self> {
        let native = path.to_native();
        if let Some(parent) = native.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&native)
            .map_err(|e| Error::io(&native, e))?;

        let policy = ExponentialBackoff {
            max_elapsed_time: Some(timeout),
            ..ExponentialBackoff::default()
        };
        backoff::retry(policy, || {
            file.try_lock_exclusive().map_err(|_| {
                backoff::Error::transient(Error::LockFailed {
                    path: native.clone(),
                })
            })
        })
        .map_err(|e| match e {
            backoff::Error::Permanent(err) | backoff::Error::Transient { err, .. } => err,
        })?;

        tracing::debug!(path = %path, "lock acquired");
        Ok(Self {
            file,
            path: path.clone(),
        })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(path = %self.path, "failed to release lock: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn acquire_creates_lock_file_and_parents() {
        let dir = TempDir::new().unwrap();
        let path = NormalizedPath::new(dir.path().join("packages/acme/tool/.lock"));
        let lock = FileLock::acquire(&path, Duration::from_secs(1)).unwrap();
        assert!(path.is_file());
        drop(lock);
    }

    #[test]
    fn second_acquire_waits_then_succeeds_after_release() {
        let dir = TempDir::new().unwrap();
        let path = NormalizedPath::new(dir.path().join(".lock"));

        let first = FileLock::acquire(&path, Duration::from_secs(1)).unwrap();
        drop(first);
        // Immediately reacquirable once released
        let second = FileLock::acquire(&path, Duration::from_secs(1)).unwrap();
        drop(second);
    }

    #[test]
    fn contended_lock_times_out() {
        let dir = TempDir::new().unwrap();
        let path = NormalizedPath::new(dir.path().join(".lock"));

        let _held = FileLock::acquire(&path, Duration::from_secs(1)).unwrap();
        let err = FileLock::acquire(&path, Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, Error::LockFailed { .. }));
    }
}

//! Atomic file writes for synthesized tool inputs
//!
//! Backend files and varfiles are overwritten on every dispatch. A write
//! that is interrupted mid-way must never leave a half-written file the
//! external tool could read, so all writes go through a
//! write-to-temp-then-rename sequence with an advisory lock and retry on
//! transient failures.

use crate::{Error, NormalizedPath, Result};
use backoff::ExponentialBackoff;
use fs2::FileExt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::time::Duration;

/// Maximum time to keep retrying a contended write.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Write content atomically, replacing any existing file.
///
/// Concurrent dispatches of the same component serialize on a sibling
/// `.lock` file; the rename itself is atomic on all supported platforms.
pub fn write_atomic(path: &NormalizedPath, content: &[u8]) -> Result<()> {
    tracing::debug!(path = %path, len = content.len(), "atomic write");
    let native = path.to_native();

    if let Some(parent) = native.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let lock_path = format!("{}.lock", native.to_string_lossy());
    let lock_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| Error::io(&lock_path, e))?;

    let temp_name = format!(
        ".{}.{}.tmp",
        native
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    );
    let temp_path = native.with_file_name(&temp_name);

    let op = || -> std::result::Result<(), backoff::Error<Error>> {
        lock_file.try_lock_exclusive().map_err(|_| {
            backoff::Error::transient(Error::LockFailed {
                path: native.clone(),
            })
        })?;

        let mut temp_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| backoff::Error::transient(Error::io(&temp_path, e)))?;

        temp_file
            .write_all(content)
            .map_err(|e| backoff::Error::transient(Error::io(&temp_path, e)))?;
        temp_file
            .sync_all()
            .map_err(|e| backoff::Error::transient(Error::io(&temp_path, e)))?;

        // Close before rename (improves Windows reliability)
        drop(temp_file);

        fs::rename(&temp_path, &native)
            .map_err(|e| backoff::Error::transient(Error::io(&native, e)))?;

        if let Err(e) = lock_file.unlock() {
            tracing::warn!(path = %native.display(), "failed to release write lock: {e}");
        }

        Ok(())
    };

    let policy = ExponentialBackoff {
        max_elapsed_time: Some(WRITE_TIMEOUT),
        ..ExponentialBackoff::default()
    };

    let result = backoff::retry(policy, op).map_err(|e| match e {
        backoff::Error::Permanent(err) | backoff::Error::Transient { err, .. } => err,
    });

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    let _ = fs::remove_file(&lock_path);

    result
}

/// Read a file into a string.
pub fn read_text(path: &NormalizedPath) -> Result<String> {
    let native = path.to_native();
    fs::read_to_string(&native).map_err(|e| Error::io(&native, e))
}

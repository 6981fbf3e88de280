//! One-shot working-directory change
//!
//! `--chdir` must be applied once, before any path resolution, and no
//! other subsystem may change the process working directory afterwards.
//! Subprocesses receive their working directory as an explicit argument.

use crate::{Error, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

static CHDIR_APPLIED: AtomicBool = AtomicBool::new(false);

/// Change the process working directory. Callable at most once.
pub fn apply_chdir(path: &Path) -> Result<()> {
    if CHDIR_APPLIED.swap(true, Ordering::SeqCst) {
        return Err(Error::ChdirAlreadyApplied);
    }
    if !path.is_dir() {
        return Err(Error::ChdirInvalid {
            path: path.to_path_buf(),
        });
    }
    std::env::set_current_dir(path).map_err(|e| Error::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::debug!(path = %path.display(), "working directory changed");
    Ok(())
}

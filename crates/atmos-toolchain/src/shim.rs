//! PATH shims under `.tools/bin`
//!
//! On unix a shim is a symlink to the active version's binary; on Windows
//! it is a copy (symlinks need elevation there). Re-creating a shim
//! atomically replaces the previous target.

use crate::{Error, Result};
use atmos_fs::NormalizedPath;

/// Create or update the shim for a binary.
pub fn create(bin_dir: &NormalizedPath, name: &str, target: &NormalizedPath) -> Result<()> {
    std::fs::create_dir_all(bin_dir.to_native())
        .map_err(|e| Error::io(bin_dir.to_native(), e))?;
    let shim = bin_dir.join(name);
    if shim.exists() {
        std::fs::remove_file(shim.to_native()).map_err(|e| Error::io(shim.to_native(), e))?;
    }

    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target.to_native(), shim.to_native())
            .map_err(|e| Error::io(shim.to_native(), e))?;
    }
    #[cfg(not(unix))]
    {
        std::fs::copy(target.to_native(), shim.to_native())
            .map_err(|e| Error::io(shim.to_native(), e))?;
    }
    tracing::debug!(shim = %shim, target = %target, "shim updated");
    Ok(())
}

/// Best-effort removal of a shim.
pub fn remove(bin_dir: &NormalizedPath, name: &str) {
    let shim = bin_dir.join(name);
    let _ = std::fs::remove_file(shim.to_native());
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    #[test]
    fn shim_points_at_the_target() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("kubectl-1.31.4");
        std::fs::write(&target, "#!/bin/sh\n").unwrap();

        let bin = NormalizedPath::new(dir.path().join("bin"));
        create(&bin, "kubectl", &NormalizedPath::new(&target)).unwrap();

        let resolved = std::fs::read_link(bin.join("kubectl").to_native()).unwrap();
        assert_eq!(resolved, target);
    }

    #[cfg(unix)]
    #[test]
    fn recreating_a_shim_repoints_it() {
        let dir = TempDir::new().unwrap();
        let old = dir.path().join("v1");
        let new = dir.path().join("v2");
        std::fs::write(&old, "").unwrap();
        std::fs::write(&new, "").unwrap();

        let bin = NormalizedPath::new(dir.path().join("bin"));
        create(&bin, "tool", &NormalizedPath::new(&old)).unwrap();
        create(&bin, "tool", &NormalizedPath::new(&new)).unwrap();

        let resolved = std::fs::read_link(bin.join("tool").to_native()).unwrap();
        assert_eq!(resolved, new);
    }

    #[test]
    fn remove_is_quiet_when_absent() {
        let dir = TempDir::new().unwrap();
        remove(&NormalizedPath::new(dir.path()), "ghost");
    }
}

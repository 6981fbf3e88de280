//! Installation layout and procedure
//!
//! ```text
//! .tools/
//!   bin/<binary>                                    # PATH-prepended shims
//!   packages/<owner>/<repo>/<version>/<platform>/<binary>
//!   packages/<owner>/<repo>/.lock
//! ```
//!
//! Installation holds the per-tool lock for its whole duration. The first
//! installer wins; waiters acquire the lock after it and find the version
//! already present.

use crate::asset::{download_url, has_archive_extension, render_template};
use crate::platform::Platform;
use crate::registry::{RegistryChain, ToolPackage};
use crate::shim;
use crate::spec::{select_version, ToolSpec, VersionConstraint};
use crate::{download, extract, Error, Result};
use atmos_fs::{FileLock, NormalizedPath};
use serde::Serialize;
use std::time::Duration;

/// How long an installer waits on a contended per-tool lock.
const LOCK_TIMEOUT: Duration = Duration::from_secs(120);

/// One installed tool version on disk.
#[derive(Debug, Clone, Serialize)]
pub struct InstalledTool {
    pub owner: String,
    pub repo: String,
    pub version: String,
    pub platform: String,
    pub binary_paths: Vec<NormalizedPath>,
    pub checksum: Option<String>,
}

/// Performs installs against one `.tools` directory.
pub struct Installer {
    tools_dir: NormalizedPath,
    chain: RegistryChain,
}

impl Installer {
    pub fn new(tools_dir: NormalizedPath, chain: RegistryChain) -> Self {
        Self { tools_dir, chain }
    }

    pub fn bin_dir(&self) -> NormalizedPath {
        self.tools_dir.join("bin")
    }

    pub fn packages_dir(&self) -> NormalizedPath {
        self.tools_dir.join("packages")
    }

    fn tool_dir(&self, spec: &ToolSpec) -> NormalizedPath {
        self.packages_dir().join(&spec.owner).join(&spec.repo)
    }

    /// Install one spec, returning the on-disk record.
    pub fn install(&self, spec: &ToolSpec) -> Result<InstalledTool> {
        let (package, registry, retry) = self.chain.resolve(spec)?;
        let version = self.pick_version(spec, &package)?;
        let platform = Platform::host()?;
        tracing::info!(
            tool = %spec.slug(),
            version,
            registry,
            platform = %platform.dir_name(),
            "installing"
        );

        let lock_path = self.tool_dir(spec).join(".lock");
        let _lock = FileLock::acquire(&lock_path, LOCK_TIMEOUT)?;

        let install_dir = self
            .tool_dir(spec)
            .join(&version)
            .join(&platform.dir_name());
        if let Some(existing) = self.existing_install(spec, &version, &platform, &install_dir) {
            tracing::debug!(tool = %spec.slug(), version, "already installed");
            return Ok(existing);
        }

        let url = download_url(&package, &platform, &version, cfg!(windows))?;
        let staging = tempfile::tempdir()
            .map_err(|e| Error::io(std::env::temp_dir(), e))?;
        let asset_name = url
            .split(['?', '#'])
            .next()
            .unwrap_or(&url)
            .rsplit('/')
            .next()
            .unwrap_or("asset")
            .to_string();
        let asset_path = staging.path().join(&asset_name);
        download::fetch_file(&url, &asset_path, &retry)?;

        let checksum = self.verify_checksum(&package, &version, &platform, &url, &asset_path)?;

        let binaries = if has_archive_extension(&url) {
            let extracted = staging.path().join("extracted");
            extract::extract(&asset_path, &url, &extracted)?;
            self.place_archive_binaries(&package, &platform, &version, &extracted, &install_dir)?
        } else {
            self.place_bare_binary(&package, &asset_path, &install_dir)?
        };

        for binary in &binaries {
            let name = binary.file_name().unwrap_or(&package.repo_name);
            shim::create(&self.bin_dir(), name, binary)?;
        }

        Ok(InstalledTool {
            owner: spec.owner.clone(),
            repo: spec.repo.clone(),
            version,
            platform: platform.dir_name(),
            binary_paths: binaries,
            checksum,
        })
    }

    fn pick_version(&self, spec: &ToolSpec, package: &ToolPackage) -> Result<String> {
        let mut candidates = package.versions.clone();
        if let Some(package_constraint) = &package.version_constraint {
            let constraint = VersionConstraint::parse(package_constraint);
            candidates.retain(|v| constraint.matches(v));
        }
        if let Some(selected) = select_version(&spec.constraint, &candidates) {
            return Ok(selected.to_string());
        }
        // No advertised versions: an exact request stands on its own
        if candidates.is_empty() {
            if let VersionConstraint::Exact(version) = &spec.constraint {
                return Ok(version.clone());
            }
        }
        Err(Error::VersionUnsatisfiable {
            owner: spec.owner.clone(),
            repo: spec.repo.clone(),
            constraint: spec.constraint.to_string(),
        })
    }

    /// A completed earlier install under the same lock discipline.
    fn existing_install(
        &self,
        spec: &ToolSpec,
        version: &str,
        platform: &Platform,
        install_dir: &NormalizedPath,
    ) -> Option<InstalledTool> {
        if !install_dir.is_dir() {
            return None;
        }
        let binaries = list_files(install_dir);
        if binaries.is_empty() {
            return None;
        }
        Some(InstalledTool {
            owner: spec.owner.clone(),
            repo: spec.repo.clone(),
            version: version.to_string(),
            platform: platform.dir_name(),
            binary_paths: binaries,
            checksum: None,
        })
    }

    fn verify_checksum(
        &self,
        package: &ToolPackage,
        version: &str,
        platform: &Platform,
        url: &str,
        asset_path: &std::path::Path,
    ) -> Result<Option<String>> {
        let key = format!("{version}-{}-{}", platform.os, platform.arch);
        let Some(expected) = package.checksums.get(&key) else {
            return Ok(None);
        };
        let actual = atmos_fs::checksum::file_checksum(asset_path)
            .map_err(|e| Error::io(asset_path, e))?;
        if &actual != expected {
            return Err(Error::ChecksumMismatch {
                url: url.to_string(),
                expected: expected.clone(),
                actual,
            });
        }
        Ok(Some(actual))
    }

    fn place_archive_binaries(
        &self,
        package: &ToolPackage,
        platform: &Platform,
        version: &str,
        extracted: &std::path::Path,
        install_dir: &NormalizedPath,
    ) -> Result<Vec<NormalizedPath>> {
        std::fs::create_dir_all(install_dir.to_native())
            .map_err(|e| Error::io(install_dir.to_native(), e))?;
        let replaced = platform.replaced(&package.replacements);

        let mut placed = Vec::new();
        if package.files.is_empty() {
            // No mapping declared: take the file named after the repo
            let candidate = extracted.join(&package.repo_name);
            let source = if candidate.is_file() {
                candidate
            } else {
                find_single_binary(extracted).ok_or_else(|| Error::ExtractFailed {
                    message: format!(
                        "cannot locate `{}` in the extracted archive",
                        package.repo_name
                    ),
                })?
            };
            placed.push(self.place_file(&source, install_dir, &package.repo_name)?);
            return Ok(placed);
        }

        for file in &package.files {
            let src = file
                .src
                .as_deref()
                .map(|template| render_template(template, package, &replaced, version))
                .unwrap_or_else(|| file.name.clone());
            let source = extracted.join(&src);
            if !source.is_file() {
                return Err(Error::ExtractFailed {
                    message: format!("archive has no `{src}` entry"),
                });
            }
            placed.push(self.place_file(&source, install_dir, &file.name)?);
        }
        Ok(placed)
    }

    fn place_bare_binary(
        &self,
        package: &ToolPackage,
        asset_path: &std::path::Path,
        install_dir: &NormalizedPath,
    ) -> Result<Vec<NormalizedPath>> {
        std::fs::create_dir_all(install_dir.to_native())
            .map_err(|e| Error::io(install_dir.to_native(), e))?;
        let mut name = package
            .files
            .first()
            .map(|f| f.name.clone())
            .unwrap_or_else(|| package.repo_name.clone());
        if cfg!(windows) && !name.ends_with(".exe") {
            name.push_str(".exe");
        }
        Ok(vec![self.place_file(asset_path, install_dir, &name)?])
    }

    fn place_file(
        &self,
        source: &std::path::Path,
        install_dir: &NormalizedPath,
        name: &str,
    ) -> Result<NormalizedPath> {
        let dest = install_dir.join(name);
        std::fs::copy(source, dest.to_native())
            .map_err(|e| Error::io(dest.to_native(), e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(
                dest.to_native(),
                std::fs::Permissions::from_mode(0o755),
            )
            .map_err(|e| Error::io(dest.to_native(), e))?;
        }
        Ok(dest)
    }

    /// Every installed tool version on disk, sorted.
    pub fn list(&self) -> Result<Vec<InstalledTool>> {
        let mut found = Vec::new();
        let packages = self.packages_dir();
        for owner in read_dirs(&packages) {
            for repo in read_dirs(&packages.join(&owner)) {
                let repo_dir = packages.join(&owner).join(&repo);
                for version in read_dirs(&repo_dir) {
                    for platform in read_dirs(&repo_dir.join(&version)) {
                        let install_dir = repo_dir.join(&version).join(&platform);
                        found.push(InstalledTool {
                            owner: owner.clone(),
                            repo: repo.clone(),
                            version: version.clone(),
                            platform: platform.clone(),
                            binary_paths: list_files(&install_dir),
                            checksum: None,
                        });
                    }
                }
            }
        }
        found.sort_by(|a, b| {
            (&a.owner, &a.repo, &a.version).cmp(&(&b.owner, &b.repo, &b.version))
        });
        Ok(found)
    }

    /// Re-point shims at a specific installed version.
    pub fn set_active(&self, spec: &ToolSpec, version: &str) -> Result<InstalledTool> {
        let platform = Platform::host()?;
        let install_dir = self.tool_dir(spec).join(version).join(&platform.dir_name());
        let Some(existing) = self.existing_install(spec, version, &platform, &install_dir) else {
            return Err(Error::NotInstalled { name: spec.slug() });
        };
        for binary in &existing.binary_paths {
            let name = binary.file_name().unwrap_or(&spec.repo);
            shim::create(&self.bin_dir(), name, binary)?;
        }
        Ok(existing)
    }

    /// Remove every installed version of a tool and its shims.
    pub fn uninstall(&self, owner: &str, repo: &str) -> Result<()> {
        let tool_dir = self.packages_dir().join(owner).join(repo);
        if !tool_dir.is_dir() {
            return Err(Error::NotInstalled {
                name: format!("{owner}/{repo}"),
            });
        }
        // Collect binary names before deleting, to clean matching shims
        let mut names = Vec::new();
        for version in read_dirs(&tool_dir) {
            for platform in read_dirs(&tool_dir.join(&version)) {
                for path in list_files(&tool_dir.join(&version).join(&platform)) {
                    if let Some(name) = path.file_name() {
                        names.push(name.to_string());
                    }
                }
            }
        }
        std::fs::remove_dir_all(tool_dir.to_native())
            .map_err(|e| Error::io(tool_dir.to_native(), e))?;
        for name in names {
            shim::remove(&self.bin_dir(), &name);
        }
        Ok(())
    }
}

fn read_dirs(path: &NormalizedPath) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(path.to_native()) else {
        return Vec::new();
    };
    let mut dirs: Vec<String> = entries
        .flatten()
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().into_string().ok())
        .collect();
    dirs.sort();
    dirs
}

fn list_files(dir: &NormalizedPath) -> Vec<NormalizedPath> {
    let Ok(entries) = std::fs::read_dir(dir.to_native()) else {
        return Vec::new();
    };
    let mut files: Vec<NormalizedPath> = entries
        .flatten()
        .filter(|e| e.path().is_file())
        .map(|e| NormalizedPath::new(e.path()))
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn installer(dir: &TempDir) -> Installer {
        let chain = RegistryChain::new(&[], NormalizedPath::new(dir.path()));
        Installer::new(NormalizedPath::new(dir.path().join(".tools")), chain)
    }

    fn seed_install(dir: &TempDir, owner: &str, repo: &str, version: &str, bin: &str) {
        let platform = Platform::host().unwrap();
        let install = dir
            .path()
            .join(".tools/packages")
            .join(owner)
            .join(repo)
            .join(version)
            .join(platform.dir_name());
        std::fs::create_dir_all(&install).unwrap();
        std::fs::write(install.join(bin), "#!/bin/sh\n").unwrap();
    }

    #[test]
    fn list_walks_the_package_layout() {
        let dir = TempDir::new().unwrap();
        seed_install(&dir, "kubernetes", "kubectl", "1.31.4", "kubectl");
        seed_install(&dir, "opentofu", "opentofu", "1.8.0", "tofu");

        let tools = installer(&dir).list().unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].repo, "kubectl");
        assert_eq!(tools[0].version, "1.31.4");
        assert_eq!(tools[1].binary_paths.len(), 1);
    }

    #[test]
    fn set_active_requires_an_installed_version() {
        let dir = TempDir::new().unwrap();
        let spec = ToolSpec::parse("kubernetes/kubectl@1.31.4").unwrap();
        let err = installer(&dir).set_active(&spec, "1.31.4").unwrap_err();
        assert!(matches!(err, Error::NotInstalled { .. }));

        seed_install(&dir, "kubernetes", "kubectl", "1.31.4", "kubectl");
        let tool = installer(&dir).set_active(&spec, "1.31.4").unwrap();
        assert_eq!(tool.version, "1.31.4");
    }

    #[test]
    fn uninstall_removes_package_tree_and_shims() {
        let dir = TempDir::new().unwrap();
        seed_install(&dir, "kubernetes", "kubectl", "1.31.4", "kubectl");
        let inst = installer(&dir);
        let spec = ToolSpec::parse("kubernetes/kubectl@1.31.4").unwrap();
        inst.set_active(&spec, "1.31.4").unwrap();
        assert!(inst.bin_dir().join("kubectl").exists());

        inst.uninstall("kubernetes", "kubectl").unwrap();
        assert!(!inst
            .packages_dir()
            .join("kubernetes")
            .join("kubectl")
            .exists());
        assert!(!inst.bin_dir().join("kubectl").exists());
    }

    #[test]
    fn uninstalling_an_absent_tool_errors() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            installer(&dir).uninstall("acme", "ghost"),
            Err(Error::NotInstalled { .. })
        ));
    }
}

//! Content-addressed tool-version manager
//!
//! Resolves `owner/repo@constraint` requests through a priority-ordered
//! registry chain, downloads and extracts the platform's asset, installs
//! into `.tools/packages/<owner>/<repo>/<version>/<platform>/` and exposes
//! shims under `.tools/bin`. Parallel invocations coordinate through a
//! per-tool file lock.

pub mod asset;
pub mod download;
pub mod error;
pub mod extract;
pub mod install;
pub mod platform;
pub mod registry;
pub mod shim;
pub mod spec;
pub mod toolversions;

pub use error::{Error, Result};
pub use install::{InstalledTool, Installer};
pub use platform::Platform;
pub use registry::{PackageKind, RegistryChain, ToolPackage};
pub use spec::{ToolSpec, VersionConstraint};
pub use toolversions::ToolVersionsFile;

use atmos_config::AtmosConfig;
use atmos_fs::NormalizedPath;

/// The toolchain's public surface, bound to one project.
pub struct Toolchain {
    installer: Installer,
    tools_dir: NormalizedPath,
    tool_versions_file: String,
}

impl Toolchain {
    pub fn new(config: &AtmosConfig, project_root: NormalizedPath) -> Self {
        let tools_path = NormalizedPath::new(&config.toolchain.tools_dir);
        let tools_dir = if tools_path.is_absolute() {
            tools_path
        } else {
            project_root.join(&config.toolchain.tools_dir)
        };
        let chain = RegistryChain::new(&config.toolchain.registries, project_root);
        Self {
            installer: Installer::new(tools_dir.clone(), chain),
            tools_dir,
            tool_versions_file: config.toolchain.tool_versions_file.clone(),
        }
    }

    /// Install every spec, fanning out one thread per tool. Results come
    /// back in request order; the first failure wins.
    pub fn install(&self, specs: &[ToolSpec]) -> Result<Vec<InstalledTool>> {
        let results: Vec<Result<InstalledTool>> = std::thread::scope(|scope| {
            let handles: Vec<_> = specs
                .iter()
                .map(|spec| scope.spawn(move || self.installer.install(spec)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("install thread"))
                .collect()
        });
        results.into_iter().collect()
    }

    /// Path of an installed binary's shim.
    pub fn which(&self, name: &str) -> Result<NormalizedPath> {
        let direct = self.installer.bin_dir().join(name);
        if direct.is_file() {
            return Ok(direct);
        }
        let exe = self.installer.bin_dir().join(&format!("{name}.exe"));
        if exe.is_file() {
            return Ok(exe);
        }
        Err(Error::NotInstalled {
            name: name.to_string(),
        })
    }

    /// The PATH fragment containing the shims.
    pub fn path_prepend(&self) -> String {
        self.tools_dir.join("bin").as_str().to_string()
    }

    pub fn list(&self) -> Result<Vec<InstalledTool>> {
        self.installer.list()
    }

    /// Pin and activate `tool@version`: shims re-point and the nearest
    /// `.tool-versions` records the choice.
    pub fn set_active(&self, start_dir: &std::path::Path, spec: &ToolSpec, version: &str) -> Result<InstalledTool> {
        let installed = self.installer.set_active(spec, version)?;
        toolversions::pin(start_dir, &self.tool_versions_file, spec, version)?;
        Ok(installed)
    }

    pub fn uninstall(&self, owner: &str, repo: &str) -> Result<()> {
        self.installer.uninstall(owner, repo)
    }

    /// Specs from the nearest `.tool-versions` below `start_dir`.
    pub fn file_specs(&self, start_dir: &std::path::Path) -> Result<Vec<ToolSpec>> {
        Ok(
            toolversions::load_nearest(start_dir, &self.tool_versions_file)?
                .map(|f| f.specs)
                .unwrap_or_default(),
        )
    }
}

/// Merge component-level `dependencies.tools` constraints over file-level
/// entries. An override of an existing tool replaces its constraint in
/// place; new tools append.
pub fn merge_specs(file_specs: Vec<ToolSpec>, overrides: Vec<ToolSpec>) -> Vec<ToolSpec> {
    let mut merged = file_specs;
    for over in overrides {
        match merged
            .iter_mut()
            .find(|s| s.owner == over.owner && s.repo == over.repo)
        {
            Some(existing) => existing.constraint = over.constraint,
            None => merged.push(over),
        }
    }
    merged
}

//! Tool package registries
//!
//! Registries are consulted in strictly decreasing `priority`, ties broken
//! by declaration order. Two kinds exist: `aqua` (an index YAML file or a
//! `{source}/{owner}/{repo}/registry.yaml` directory layout, auto-detected
//! by the `.yaml`/`.yml` suffix) and `inline` (packages embedded in
//! `atmos.yaml`).

use crate::download;
use crate::spec::ToolSpec;
use crate::{Error, Result};
use atmos_config::{RegistryConfig, RegistryKind, RetryConfig};
use atmos_fs::NormalizedPath;
use indexmap::IndexMap;
use serde::Deserialize;

/// How a package's asset is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageKind {
    GithubRelease,
    Http,
}

/// One named binary inside an asset.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageFile {
    pub name: String,
    /// Path inside the extracted archive; the bare asset when absent.
    #[serde(default)]
    pub src: Option<String>,
}

/// A package definition resolved from a registry.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolPackage {
    #[serde(rename = "type")]
    pub kind: PackageKind,
    pub repo_owner: String,
    pub repo_name: String,
    /// `http` kind: the full URL template.
    #[serde(default)]
    pub url: Option<String>,
    /// `github_release` kind: the asset-name template.
    #[serde(default)]
    pub asset: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub files: Vec<PackageFile>,
    #[serde(default)]
    pub replacements: IndexMap<String, String>,
    /// Versions the registry advertises, newest or oldest first - order
    /// does not matter, selection picks the highest match.
    #[serde(default)]
    pub versions: Vec<String>,
    #[serde(default)]
    pub version_constraint: Option<String>,
    /// `"{version}-{os}-{arch}"` -> `sha256:<hex>` entries.
    #[serde(default)]
    pub checksums: IndexMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RegistryIndex {
    #[serde(default)]
    packages: Vec<ToolPackage>,
}

/// The priority-ordered registry chain.
pub struct RegistryChain {
    /// Sorted by decreasing priority, declaration order within ties.
    registries: Vec<RegistryConfig>,
    project_root: NormalizedPath,
}

impl RegistryChain {
    pub fn new(registries: &[RegistryConfig], project_root: NormalizedPath) -> Self {
        let mut ordered: Vec<RegistryConfig> = registries.to_vec();
        // Stable sort keeps declaration order for equal priorities
        ordered.sort_by_key(|r| std::cmp::Reverse(r.priority));
        Self {
            registries: ordered,
            project_root,
        }
    }

    /// Find the first package definition for a spec, with the registry
    /// name and retry policy it came from.
    pub fn resolve(&self, spec: &ToolSpec) -> Result<(ToolPackage, String, RetryConfig)> {
        let mut tried = Vec::new();
        for registry in &self.registries {
            tried.push(registry.name.clone());
            match self.lookup(registry, spec) {
                Ok(Some(package)) => {
                    tracing::debug!(
                        registry = %registry.name,
                        tool = %spec.slug(),
                        "package resolved"
                    );
                    let retry = registry.retry.clone().unwrap_or_default();
                    return Ok((package, registry.name.clone(), retry));
                }
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(registry = %registry.name, "registry lookup failed: {e}");
                }
            }
        }
        Err(Error::ToolNotFound {
            owner: spec.owner.clone(),
            repo: spec.repo.clone(),
            tried,
        })
    }

    fn lookup(&self, registry: &RegistryConfig, spec: &ToolSpec) -> Result<Option<ToolPackage>> {
        match registry.kind {
            RegistryKind::Inline => self.lookup_inline(registry, spec),
            RegistryKind::Aqua => self.lookup_aqua(registry, spec),
        }
    }

    fn lookup_inline(
        &self,
        registry: &RegistryConfig,
        spec: &ToolSpec,
    ) -> Result<Option<ToolPackage>> {
        let index: RegistryIndex = serde_yaml::from_value(registry.source.clone())
            .map_err(|e| Error::RegistryLoad {
                name: registry.name.clone(),
                message: e.to_string(),
            })?;
        Ok(find_package(index.packages, spec))
    }

    fn lookup_aqua(
        &self,
        registry: &RegistryConfig,
        spec: &ToolSpec,
    ) -> Result<Option<ToolPackage>> {
        let source = registry
            .source
            .as_str()
            .ok_or_else(|| Error::RegistryLoad {
                name: registry.name.clone(),
                message: "aqua registries require a string `source`".to_string(),
            })?;

        // A .yaml/.yml source is a single index; anything else is the
        // directory layout {source}/{owner}/{repo}/registry.yaml
        let is_index = source.ends_with(".yaml") || source.ends_with(".yml");
        let content = if is_index {
            self.read_source(registry, source)?
        } else {
            let per_tool = format!("{source}/{}/{}/registry.yaml", spec.owner, spec.repo);
            match self.read_source(registry, &per_tool) {
                Ok(content) => content,
                // A missing per-tool file just means "not in this registry"
                Err(_) => return Ok(None),
            }
        };

        let index: RegistryIndex =
            serde_yaml::from_str(&content).map_err(|e| Error::RegistryLoad {
                name: registry.name.clone(),
                message: e.to_string(),
            })?;
        Ok(find_package(index.packages, spec))
    }

    fn read_source(&self, registry: &RegistryConfig, source: &str) -> Result<String> {
        if source.starts_with("http://") || source.starts_with("https://") {
            let retry = registry.retry.clone().unwrap_or_default();
            return download::fetch_text(source, &retry);
        }
        let path = NormalizedPath::new(source);
        let full = if path.is_absolute() {
            path
        } else {
            self.project_root.join(source)
        };
        Ok(atmos_fs::io::read_text(&full)?)
    }
}

fn find_package(packages: Vec<ToolPackage>, spec: &ToolSpec) -> Option<ToolPackage> {
    packages
        .into_iter()
        .find(|p| p.repo_owner == spec.owner && p.repo_name == spec.repo)
}

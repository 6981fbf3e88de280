//! Host platform tuple
//!
//! Tool assets are addressed by `{OS, Arch}`; registries may remap the
//! canonical names (`amd64` -> `x86_64`) through a `replacements` table.

use crate::{Error, Result};
use indexmap::IndexMap;

/// The canonical platform tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    /// The host platform. Fails on OS/arch combinations no registry
    /// addresses.
    pub fn host() -> Result<Self> {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            "linux" => "linux",
            "windows" => "windows",
            other => {
                return Err(Error::PlatformUnsupported {
                    os: other.to_string(),
                    arch: std::env::consts::ARCH.to_string(),
                });
            }
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            other => {
                return Err(Error::PlatformUnsupported {
                    os: os.to_string(),
                    arch: other.to_string(),
                });
            }
        };
        Ok(Self {
            os: os.to_string(),
            arch: arch.to_string(),
        })
    }

    /// `linux-amd64`, the directory segment of the install layout.
    pub fn dir_name(&self) -> String {
        format!("{}-{}", self.os, self.arch)
    }

    /// The tuple with a registry's replacements applied.
    pub fn replaced(&self, replacements: &IndexMap<String, String>) -> Self {
        let replace = |value: &str| {
            replacements
                .get(value)
                .cloned()
                .unwrap_or_else(|| value.to_string())
        };
        Self {
            os: replace(&self.os),
            arch: replace(&self.arch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn host_resolves_on_supported_platforms() {
        let platform = Platform::host().unwrap();
        assert!(["darwin", "linux", "windows"].contains(&platform.os.as_str()));
        assert!(["amd64", "arm64", "386"].contains(&platform.arch.as_str()));
    }

    #[test]
    fn replacements_remap_canonical_names() {
        let platform = Platform {
            os: "linux".into(),
            arch: "amd64".into(),
        };
        let mut replacements = IndexMap::new();
        replacements.insert("amd64".to_string(), "x86_64".to_string());
        let replaced = platform.replaced(&replacements);
        assert_eq!(replaced.arch, "x86_64");
        assert_eq!(replaced.os, "linux");
    }

    #[test]
    fn dir_name_joins_with_dash() {
        let platform = Platform {
            os: "windows".into(),
            arch: "amd64".into(),
        };
        assert_eq!(platform.dir_name(), "windows-amd64");
    }
}

//! Asset URL construction
//!
//! Package templates use the variables `{OS, Arch, Version, RepoOwner,
//! RepoName, Format}` in Go-template spelling (`{{.OS}}`). On Windows, a
//! rendered URL with neither a recognized archive extension nor any file
//! extension gets `.exe` appended.

use crate::platform::Platform;
use crate::registry::{PackageKind, ToolPackage};
use crate::{Error, Result};

/// Archive extensions the extractor understands, longest first so
/// `.tar.gz` wins over `.gz`.
pub const ARCHIVE_EXTENSIONS: &[&str] = &[".tar.gz", ".tar.xz", ".tar.bz2", ".tgz", ".zip"];

/// Render a package template against the platform and version.
pub fn render_template(
    template: &str,
    package: &ToolPackage,
    platform: &Platform,
    version: &str,
) -> String {
    template
        .replace("{{.OS}}", &platform.os)
        .replace("{{.Arch}}", &platform.arch)
        .replace("{{.Version}}", version)
        .replace("{{.RepoOwner}}", &package.repo_owner)
        .replace("{{.RepoName}}", &package.repo_name)
        .replace("{{.Format}}", package.format.as_deref().unwrap_or(""))
}

/// Build the final download URL for a package at a version, applying the
/// Windows `.exe` rule for bare binaries.
pub fn download_url(
    package: &ToolPackage,
    platform: &Platform,
    version: &str,
    windows: bool,
) -> Result<String> {
    let replaced = platform.replaced(&package.replacements);
    let mut url = match package.kind {
        PackageKind::Http => {
            let template = package.url.as_deref().ok_or_else(|| Error::RegistryLoad {
                name: package.repo_name.clone(),
                message: "http packages require a `url` template".to_string(),
            })?;
            render_template(template, package, &replaced, version)
        }
        PackageKind::GithubRelease => {
            let asset = package
                .asset
                .as_deref()
                .ok_or_else(|| Error::RegistryLoad {
                    name: package.repo_name.clone(),
                    message: "github_release packages require an `asset` template".to_string(),
                })?;
            format!(
                "https://github.com/{}/{}/releases/download/{}/{}",
                package.repo_owner,
                package.repo_name,
                version,
                render_template(asset, package, &replaced, version)
            )
        }
    };

    if windows && !has_archive_extension(&url) && !has_any_extension(&url) {
        url.push_str(".exe");
    }
    Ok(url)
}

/// Whether the URL path ends in a recognized archive extension.
pub fn has_archive_extension(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    ARCHIVE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

fn has_any_extension(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last_segment = path.rsplit('/').next().unwrap_or(path);
    last_segment.contains('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    fn http_package(url: &str) -> ToolPackage {
        serde_yaml::from_str(&format!(
            "type: http\nrepo_owner: kubernetes\nrepo_name: kubectl\nurl: \"{url}\"\n"
        ))
        .unwrap()
    }

    fn linux() -> Platform {
        Platform {
            os: "linux".into(),
            arch: "amd64".into(),
        }
    }

    fn windows() -> Platform {
        Platform {
            os: "windows".into(),
            arch: "amd64".into(),
        }
    }

    #[test]
    fn http_template_renders_all_variables() {
        let package = http_package("https://dl.k8s.io/{{.Version}}/bin/{{.OS}}/{{.Arch}}/kubectl");
        let url = download_url(&package, &linux(), "1.31.4", false).unwrap();
        assert_eq!(url, "https://dl.k8s.io/1.31.4/bin/linux/amd64/kubectl");
    }

    #[test]
    fn windows_bare_binary_gets_exe() {
        let package = http_package("https://dl.k8s.io/{{.Version}}/bin/{{.OS}}/{{.Arch}}/kubectl");
        let url = download_url(&package, &windows(), "1.31.4", true).unwrap();
        assert_eq!(url, "https://dl.k8s.io/1.31.4/bin/windows/amd64/kubectl.exe");
    }

    #[test]
    fn windows_archive_is_left_alone() {
        let package =
            http_package("https://example.com/tool_{{.Version}}_{{.OS}}_{{.Arch}}.tar.gz");
        let url = download_url(&package, &windows(), "1.0.0", true).unwrap();
        assert!(url.ends_with(".tar.gz"));
    }

    #[test]
    fn windows_dotted_name_is_left_alone() {
        let package = http_package("https://example.com/{{.Version}}/tool.bin");
        let url = download_url(&package, &windows(), "1.0.0", true).unwrap();
        assert!(url.ends_with("tool.bin"));
    }

    #[test]
    fn github_release_urls_follow_the_layout() {
        let package: ToolPackage = serde_yaml::from_str(
            r#"
type: github_release
repo_owner: opentofu
repo_name: opentofu
asset: "tofu_{{.Version}}_{{.OS}}_{{.Arch}}.zip"
"#,
        )
        .unwrap();
        let url = download_url(&package, &linux(), "v1.8.0", false).unwrap();
        assert_eq!(
            url,
            "https://github.com/opentofu/opentofu/releases/download/v1.8.0/tofu_v1.8.0_linux_amd64.zip"
        );
    }

    #[test]
    fn replacements_apply_before_rendering() {
        let mut package =
            http_package("https://example.com/{{.Version}}/{{.OS}}/{{.Arch}}/tool.tar.gz");
        package.replacements = IndexMap::from([("amd64".to_string(), "x86_64".to_string())]);
        let url = download_url(&package, &linux(), "1.0.0", false).unwrap();
        assert!(url.contains("/x86_64/"), "{url}");
    }

    #[test]
    fn archive_extension_detection_handles_query_strings() {
        assert!(has_archive_extension("https://x/y.tar.gz?token=abc"));
        assert!(has_archive_extension("https://x/y.tgz"));
        assert!(!has_archive_extension("https://x/kubectl"));
    }
}

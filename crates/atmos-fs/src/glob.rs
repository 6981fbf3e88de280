//! Include/exclude glob sets over manifest trees
//!
//! The stack indexer selects candidate manifests with `included_paths`
//! minus `excluded_paths`, and import specs expand single glob patterns.
//! Both go through compiled [`globset`] matchers; directory walking is
//! depth-first with results sorted so enumeration order never depends on
//! the filesystem.

use crate::{Error, NormalizedPath, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

/// A compiled include/exclude matcher rooted at a base directory.
#[derive(Debug)]
pub struct GlobMatcher {
    base: NormalizedPath,
    included: GlobSet,
    excluded: GlobSet,
}

fn compile(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| Error::GlobPattern {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| Error::GlobPattern {
        pattern: patterns.join(", "),
        message: e.to_string(),
    })
}

impl GlobMatcher {
    /// Compile include and exclude pattern sets.
    ///
    /// An empty include set matches everything; excludes always win.
    pub fn new(
        base: NormalizedPath,
        included_paths: &[String],
        excluded_paths: &[String],
    ) -> Result<Self> {
        Ok(Self {
            base,
            included: compile(included_paths)?,
            excluded: compile(excluded_paths)?,
        })
    }

    /// Whether a base-relative path is selected.
    pub fn matches(&self, relative: &str) -> bool {
        if self.excluded.is_match(relative) {
            return false;
        }
        self.included.is_empty() || self.included.is_match(relative)
    }

    /// Enumerate all selected files under the base, sorted by path.
    pub fn walk(&self) -> Result<Vec<NormalizedPath>> {
        let mut found = Vec::new();
        for entry in WalkDir::new(self.base.to_native()).follow_links(false) {
            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .map(|p| p.to_path_buf())
                    .unwrap_or_else(|| self.base.to_native());
                Error::io(path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = NormalizedPath::new(entry.path());
            let Some(relative) = path.relative_to(&self.base) else {
                continue;
            };
            if self.matches(relative) {
                found.push(path);
            }
        }
        found.sort();
        Ok(found)
    }
}

/// Expand a single glob pattern relative to a base directory.
///
/// Returns matching files sorted by path; an empty result is not an error
/// here - the import resolver decides whether zero matches is fatal.
pub fn expand(base: &NormalizedPath, pattern: &str) -> Result<Vec<NormalizedPath>> {
    let glob = Glob::new(pattern).map_err(|e| Error::GlobPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;
    let matcher = glob.compile_matcher();

    let mut found = Vec::new();
    for entry in WalkDir::new(base.to_native()).follow_links(false) {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = NormalizedPath::new(entry.path());
        let Some(relative) = path.relative_to(base) else {
            continue;
        };
        if matcher.is_match(relative) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, rel: &str) {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    }

    #[test]
    fn double_star_spans_directories() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "orgs/acme/dev.yaml");
        touch(&dir, "orgs/acme/plat/prod.yaml");
        touch(&dir, "README.md");

        let matcher = GlobMatcher::new(
            NormalizedPath::new(dir.path()),
            &["orgs/**/*.yaml".to_string()],
            &[],
        )
        .unwrap();

        let files = matcher.walk().unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.relative_to(&NormalizedPath::new(dir.path())).unwrap())
            .collect();
        assert_eq!(names, vec!["orgs/acme/dev.yaml", "orgs/acme/plat/prod.yaml"]);
    }

    #[test]
    fn excludes_win_over_includes() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "catalog/vpc.yaml");
        touch(&dir, "catalog/_defaults.yaml");

        let matcher = GlobMatcher::new(
            NormalizedPath::new(dir.path()),
            &["**/*.yaml".to_string()],
            &["**/_*.yaml".to_string()],
        )
        .unwrap();

        let files = matcher.walk().unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].as_str().ends_with("catalog/vpc.yaml"));
    }

    #[test]
    fn empty_include_set_matches_everything() {
        let matcher =
            GlobMatcher::new(NormalizedPath::new("/tmp"), &[], &["**/skip.yaml".to_string()])
                .unwrap();
        assert!(matcher.matches("any/file.yaml"));
        assert!(!matcher.matches("any/skip.yaml"));
    }

    #[test]
    fn expand_returns_sorted_matches() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "mixins/region/us-east-2.yaml");
        touch(&dir, "mixins/region/us-west-2.yaml");

        let matches = expand(
            &NormalizedPath::new(dir.path()),
            "mixins/region/*.yaml",
        )
        .unwrap();
        assert_eq!(matches.len(), 2);
        assert!(matches[0].as_str() < matches[1].as_str());
    }

    #[test]
    fn expand_zero_matches_is_empty_not_error() {
        let dir = TempDir::new().unwrap();
        let matches = expand(&NormalizedPath::new(dir.path()), "nothing/*.yaml").unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = expand(&NormalizedPath::new("/tmp"), "bad[pattern").unwrap_err();
        assert!(matches!(err, Error::GlobPattern { .. }));
    }
}

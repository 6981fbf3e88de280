//! Tool specs and version constraints
//!
//! Requests arrive as `owner/repo@constraint`. The constraint grammar:
//! exact (`1.2.3`), caret (`^1.2.0` - any minor/patch under the same
//! major), tilde (`~> 4.40.0` - any patch under the same minor),
//! `latest`, or an opaque registry-format expression tried as a semver
//! requirement.

use crate::{Error, Result};
use semver::Version;
use std::fmt;

/// A requested tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    pub owner: String,
    pub repo: String,
    pub constraint: VersionConstraint,
}

impl ToolSpec {
    /// Parse `owner/repo[@constraint]`; no constraint means `latest`.
    pub fn parse(spec: &str) -> Result<Self> {
        let (name, constraint) = match spec.split_once('@') {
            Some((name, constraint)) => (name, VersionConstraint::parse(constraint)),
            None => (spec, VersionConstraint::Latest),
        };
        let (owner, repo) = name.split_once('/').ok_or_else(|| Error::InvalidSpec {
            spec: spec.to_string(),
        })?;
        if owner.is_empty() || repo.is_empty() {
            return Err(Error::InvalidSpec {
                spec: spec.to_string(),
            });
        }
        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            constraint,
        })
    }

    /// `owner/repo`
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl fmt::Display for ToolSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.constraint)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    Exact(String),
    /// `^x.y.z`: same major, at least x.y.z.
    Caret(Version),
    /// `~> x.y.z`: same major.minor, at least x.y.z.
    Tilde(Version),
    Latest,
    /// Registry-format-specific expression, matched as a semver
    /// requirement when possible.
    Expr(String),
}

impl VersionConstraint {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw == "latest" {
            return Self::Latest;
        }
        if let Some(rest) = raw.strip_prefix('^') {
            if let Ok(version) = Version::parse(rest.trim()) {
                return Self::Caret(version);
            }
        }
        if let Some(rest) = raw.strip_prefix("~>") {
            if let Ok(version) = Version::parse(rest.trim()) {
                return Self::Tilde(version);
            }
        }
        if parse_version(raw).is_some() {
            return Self::Exact(raw.to_string());
        }
        Self::Expr(raw.to_string())
    }

    /// Whether a concrete version satisfies this constraint.
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Self::Latest => true,
            Self::Exact(exact) => {
                candidate == exact
                    || matches!(
                        (parse_version(candidate), parse_version(exact)),
                        (Some(a), Some(b)) if a == b
                    )
            }
            Self::Caret(min) => parse_version(candidate)
                .is_some_and(|v| v.major == min.major && v >= *min),
            Self::Tilde(min) => parse_version(candidate).is_some_and(|v| {
                v.major == min.major && v.minor == min.minor && v >= *min
            }),
            Self::Expr(expr) => match semver::VersionReq::parse(expr) {
                Ok(req) => parse_version(candidate).is_some_and(|v| req.matches(&v)),
                Err(_) => candidate == expr,
            },
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "{v}"),
            Self::Caret(v) => write!(f, "^{v}"),
            Self::Tilde(v) => write!(f, "~> {v}"),
            Self::Latest => write!(f, "latest"),
            Self::Expr(e) => write!(f, "{e}"),
        }
    }
}

/// Parse a version, tolerating a leading `v`.
pub fn parse_version(raw: &str) -> Option<Version> {
    Version::parse(raw.trim().trim_start_matches('v')).ok()
}

/// Pick the highest candidate satisfying the constraint.
pub fn select_version<'a>(
    constraint: &VersionConstraint,
    candidates: &'a [String],
) -> Option<&'a str> {
    candidates
        .iter()
        .filter(|c| constraint.matches(c))
        .max_by(|a, b| match (parse_version(a), parse_version(b)) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => a.cmp(b),
        })
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn spec_parses_owner_repo_and_constraint() {
        let spec = ToolSpec::parse("kubernetes/kubectl@1.31.4").unwrap();
        assert_eq!(spec.owner, "kubernetes");
        assert_eq!(spec.repo, "kubectl");
        assert_eq!(spec.constraint, VersionConstraint::Exact("1.31.4".into()));
    }

    #[test]
    fn spec_without_constraint_is_latest() {
        let spec = ToolSpec::parse("hashicorp/terraform").unwrap();
        assert_eq!(spec.constraint, VersionConstraint::Latest);
    }

    #[test]
    fn bad_specs_are_rejected() {
        assert!(ToolSpec::parse("kubectl").is_err());
        assert!(ToolSpec::parse("/kubectl").is_err());
        assert!(ToolSpec::parse("kubernetes/").is_err());
    }

    #[rstest]
    #[case("^1.2.0", "1.2.5", true)]
    #[case("^1.2.0", "1.9.0", true)]
    #[case("^1.2.0", "2.0.0", false)]
    #[case("^1.2.0", "1.1.9", false)]
    fn caret_allows_minor_and_patch_under_same_major(
        #[case] constraint: &str,
        #[case] candidate: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(
            VersionConstraint::parse(constraint).matches(candidate),
            expected
        );
    }

    #[rstest]
    #[case("~> 4.40.0", "4.40.7", true)]
    #[case("~> 4.40.0", "4.41.0", false)]
    #[case("~> 4.40.0", "5.0.0", false)]
    #[case("~> 4.40.2", "4.40.1", false)]
    fn tilde_allows_patch_under_same_minor(
        #[case] constraint: &str,
        #[case] candidate: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(
            VersionConstraint::parse(constraint).matches(candidate),
            expected
        );
    }

    #[test]
    fn exact_tolerates_v_prefix() {
        let constraint = VersionConstraint::parse("1.31.4");
        assert!(constraint.matches("v1.31.4"));
        assert!(!constraint.matches("1.31.5"));
    }

    #[test]
    fn opaque_expressions_fall_back_to_semver_req() {
        let constraint = VersionConstraint::parse(">=1.2, <1.5");
        assert!(constraint.matches("1.4.0"));
        assert!(!constraint.matches("1.5.0"));
    }

    #[test]
    fn select_version_picks_highest_match() {
        let candidates = vec![
            "1.2.0".to_string(),
            "1.4.2".to_string(),
            "2.0.0".to_string(),
        ];
        let constraint = VersionConstraint::parse("^1.2.0");
        assert_eq!(select_version(&constraint, &candidates), Some("1.4.2"));
    }

    #[test]
    fn select_version_latest_takes_maximum() {
        let candidates = vec!["1.9.0".to_string(), "1.10.0".to_string()];
        assert_eq!(
            select_version(&VersionConstraint::Latest, &candidates),
            Some("1.10.0")
        );
    }
}

//! Normalized path handling for cross-platform manifest identity
//!
//! Stack manifests are identified by their absolute source path. Identity
//! comparison must not depend on the host's separator, so paths are stored
//! with forward slashes and converted to the native form only at I/O
//! boundaries.

use std::path::{Path, PathBuf};

/// A path normalized to forward slashes.
///
/// Used as manifest identity throughout the stack resolver: two imports of
/// the same file always compare equal regardless of how the path was
/// spelled at the import site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct NormalizedPath {
    inner: String,
}

impl NormalizedPath {
    /// Create a new `NormalizedPath` from any path-like input.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path_str = path.as_ref().to_string_lossy();
        Self {
            inner: path_str.replace('\\', "/"),
        }
    }

    /// Canonicalize against the filesystem, without UNC prefixes on Windows.
    ///
    /// Manifest identity uses the canonical form so that `a/../b/c.yaml`
    /// and `b/c.yaml` resolve to the same node in the import DAG.
    pub fn canonicalize(&self) -> crate::Result<Self> {
        let native = self.to_native();
        let canonical =
            dunce::canonicalize(&native).map_err(|e| crate::Error::io(&native, e))?;
        Ok(Self::new(canonical))
    }

    /// Get the internal normalized string representation.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Convert to a platform-native `PathBuf` for I/O operations.
    pub fn to_native(&self) -> PathBuf {
        PathBuf::from(&self.inner)
    }

    /// Join this path with a segment.
    pub fn join(&self, segment: &str) -> Self {
        let segment = segment.replace('\\', "/");
        let joined = if self.inner.ends_with('/') {
            format!("{}{}", self.inner, segment)
        } else {
            format!("{}/{}", self.inner, segment)
        };
        Self { inner: joined }
    }

    /// Get the parent directory.
    pub fn parent(&self) -> Option<Self> {
        let trimmed = self.inner.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(idx) if idx > 0 => Some(Self {
                inner: trimmed[..idx].to_string(),
            }),
            Some(0) => Some(Self {
                inner: "/".to_string(),
            }),
            _ => None,
        }
    }

    /// Get the file name component.
    pub fn file_name(&self) -> Option<&str> {
        let trimmed = self.inner.trim_end_matches('/');
        trimmed.rsplit('/').next()
    }

    /// Strip a base prefix, yielding the manifest's display path.
    ///
    /// Diagnostics and `sources` trails show paths relative to
    /// `stacks.base_path` rather than absolute paths.
    pub fn relative_to(&self, base: &NormalizedPath) -> Option<&str> {
        let rest = self.inner.strip_prefix(base.as_str())?;
        Some(rest.trim_start_matches('/'))
    }

    /// Whether the path is absolute (unix root or windows drive/UNC).
    pub fn is_absolute(&self) -> bool {
        self.inner.starts_with('/')
            || self.inner.starts_with("//")
            || self
                .inner
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() && self.inner[1..].starts_with(":/"))
    }

    /// Check if this path exists on the filesystem.
    pub fn exists(&self) -> bool {
        self.to_native().exists()
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.to_native().is_dir()
    }

    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        self.to_native().is_file()
    }

    /// Get the extension if present.
    pub fn extension(&self) -> Option<&str> {
        self.file_name().and_then(|name| {
            let idx = name.rfind('.')?;
            if idx == 0 { None } else { Some(&name[idx + 1..]) }
        })
    }
}

impl AsRef<Path> for NormalizedPath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.inner)
    }
}

impl std::fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<&str> for NormalizedPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NormalizedPath {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<PathBuf> for NormalizedPath {
    fn from(p: PathBuf) -> Self {
        Self::new(p)
    }
}

impl From<&Path> for NormalizedPath {
    fn from(p: &Path) -> Self {
        Self::new(p)
    }
}

//! Error types for the toolchain installer

use std::path::PathBuf;

/// Result type for atmos-toolchain operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid tool spec `{spec}`: expected `owner/repo[@constraint]`")]
    InvalidSpec { spec: String },

    #[error("no registry provides `{owner}/{repo}` (tried: {})", tried.join(", "))]
    ToolNotFound {
        owner: String,
        repo: String,
        tried: Vec<String>,
    },

    #[error("no version of `{owner}/{repo}` satisfies `{constraint}`")]
    VersionUnsatisfiable {
        owner: String,
        repo: String,
        constraint: String,
    },

    #[error("asset download failed for {url}: HTTP {status}")]
    AssetUnavailable { url: String, status: u16 },

    #[error("download of {url} failed: {message}")]
    DownloadFailed { url: String, message: String },

    #[error("archive extraction failed: {message}")]
    ExtractFailed { message: String },

    #[error("unsupported platform: {os}/{arch}")]
    PlatformUnsupported { os: String, arch: String },

    #[error("checksum mismatch for {url}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("registry `{name}` failed to load: {message}")]
    RegistryLoad { name: String, message: String },

    #[error("tool `{name}` is not installed")]
    NotInstalled { name: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Fs(#[from] atmos_fs::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

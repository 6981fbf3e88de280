//! Error types for atmos-config

use std::path::PathBuf;

/// Result type for atmos-config operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading the process configuration
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no atmos.yaml found (searched from {start_dir} upward, user and system config dirs)")]
    ConfigNotFound { start_dir: PathBuf },

    #[error("failed to parse {path}:{line}: {message}")]
    ConfigParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("configuration schema validation failed:\n{}", errors.join("\n"))]
    ConfigSchema { errors: Vec<String> },

    #[error("--chdir was applied more than once")]
    ChdirAlreadyApplied,

    #[error("--chdir target is not a directory: {path}")]
    ChdirInvalid { path: PathBuf },

    #[error(transparent)]
    Fs(#[from] atmos_fs::Error),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

//! Error types for atmos-validate

use std::path::PathBuf;

/// Result type for atmos-validate operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid policy `{name}`: {message}")]
    PolicySpec { name: String, message: String },

    #[error("failed to load schema {path}: {message}")]
    SchemaLoad { path: PathBuf, message: String },

    #[error("schema for policy `{name}` does not compile: {message}")]
    SchemaCompile { name: String, message: String },

    #[error("opa evaluation failed for policy `{name}`: {message}")]
    OpaRun { name: String, message: String },

    #[error("policy `{name}` timed out after {seconds}s")]
    PolicyTimeout { name: String, seconds: u64 },

    #[error(transparent)]
    Fs(#[from] atmos_fs::Error),
}

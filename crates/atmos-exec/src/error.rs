//! Error types for the execution dispatcher

use std::path::PathBuf;

/// Result type for atmos-exec operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "component `{component}` is abstract (metadata.type: abstract) and cannot be provisioned"
    )]
    AbstractComponent { component: String },

    #[error("command `{command}` not found on PATH or in the toolchain")]
    CommandNotFound { command: String },

    #[error("component directory does not exist: {path}")]
    ComponentDirMissing { path: PathBuf },

    #[error("`{command}` exited with status {code}")]
    Subprocess { command: String, code: i32 },

    #[error("failed to write backend file {path}: {message}")]
    BackendWrite { path: PathBuf, message: String },

    #[error("failed to write varfile {path}: {message}")]
    VarfileWrite { path: PathBuf, message: String },

    #[error("workspace `{workspace}` selection failed: {message}")]
    WorkspaceSelect { workspace: String, message: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// The process exit code this error maps to.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Subprocess { code, .. } => *code,
            Self::Cancelled => 130,
            _ => 1,
        }
    }
}

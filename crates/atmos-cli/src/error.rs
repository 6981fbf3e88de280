//! CLI error type and exit-code mapping

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] atmos_config::Error),

    #[error(transparent)]
    Stack(#[from] atmos_stack::Error),

    #[error(transparent)]
    Exec(#[from] atmos_exec::Error),

    #[error(transparent)]
    Toolchain(#[from] atmos_toolchain::Error),

    #[error(transparent)]
    Validate(#[from] atmos_validate::Error),

    #[error("validation failed:\n{}", messages.join("\n"))]
    ValidationFailed { messages: Vec<String> },

    #[error("{0}")]
    User(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn user(message: impl Into<String>) -> Self {
        Self::User(message.into())
    }

    /// Exit codes: 0 success, 2 validation failed, a spawned tool's own
    /// code when it failed, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ValidationFailed { .. } => 2,
            Self::Exec(e) => e.exit_code(),
            _ => 1,
        }
    }
}

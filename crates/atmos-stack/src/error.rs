//! Error types for the stack resolver

use std::path::PathBuf;

/// Result type for atmos-stack operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to parse manifest {path}:{line}: {message}")]
    ManifestParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("import `{path}` in {importer} matched no manifests")]
    ImportUnresolved { path: String, importer: String },

    #[error("import cycle detected: {}", chain.join(" -> "))]
    ImportCycle { chain: Vec<String> },

    #[error("inheritance cycle detected for component `{component}`: {}", chain.join(" -> "))]
    InheritanceCycle {
        component: String,
        chain: Vec<String>,
    },

    #[error("no manifests resolve to stack `{stack}`")]
    StackNotFound { stack: String },

    #[error("component `{component}` not found in stack `{stack}`")]
    ComponentNotFound { component: String, stack: String },

    #[error("materialization failed for `{component}` in stack `{stack}`: {message}")]
    Materialize {
        component: String,
        stack: String,
        message: String,
    },

    #[error("invalid arguments for `!{tag}`: {message}")]
    YamlFuncArg { tag: String, message: String },

    #[error("`!exec` command failed with status {code}: {command}\n{stderr}")]
    YamlFuncExec {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("remote state unavailable for component `{component}`: {message}")]
    YamlFuncRemoteState { component: String, message: String },

    #[error("`!terraform.output` target `{component}` not found in stack `{stack}`")]
    YamlFuncComponentNotFound { component: String, stack: String },

    #[error("store `{name}` lookup failed: {message}")]
    Store { name: String, message: String },

    #[error(transparent)]
    Template(#[from] atmos_template::Error),

    #[error(transparent)]
    Fs(#[from] atmos_fs::Error),
}

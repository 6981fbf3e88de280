//! Process-wide configuration loading for Atmos
//!
//! Locates `atmos.yaml`, overlays `.atmos.d/` fragments, applies `ATMOS_*`
//! environment overrides and command-line flag overrides, validates the
//! result against the embedded schema, and freezes it. Subsystems receive
//! the merged [`AtmosConfig`] by explicit injection; there is no ambient
//! global lookup.
//!
//! `--chdir` is applied exactly once, before any other resolution; nothing
//! else in the workspace calls `std::env::set_current_dir`.

pub mod error;
pub mod loader;
pub mod schema;

mod env;
mod merge;
mod workdir;

pub use error::{Error, Result};
pub use loader::{ConfigLoader, ConfigOverrides};
pub use schema::{
    AtmosConfig, AuthSettings, CommandsConfig, ComponentTypeConfig, ComponentsConfig,
    CustomCommand, IdentityConfig, ListMergeStrategy, LogsConfig, RegistryConfig, RegistryKind,
    RetryConfig, SchemaPathConfig, SchemasConfig, SettingsConfig, StacksConfig, StoreConfig,
    StoreKind, TemplateSettings, TemplatesConfig, ToolchainConfig, ValidationDefaults,
    WorkflowsConfig,
};
pub use workdir::apply_chdir;

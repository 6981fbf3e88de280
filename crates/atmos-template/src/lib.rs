//! Template engine for Atmos stack manifests
//!
//! One Tera instance, autoescape off, with three registered function
//! families: the engine's own template syntax, string/collection filters
//! (`to_yaml`, `to_json`, …), and environment/datasource functions
//! (`env`, `file`). The Atmos functions `atmos_component` and
//! `atmos_store` cross back into the stack resolver through the
//! [`ComponentFetcher`] and [`StoreReader`] seams, wired by the CLI -
//! this crate never depends on the resolver.
//!
//! Template calls that would require executing infrastructure (reading a
//! terraform output) are not template functions at all; they stay in the
//! manifest as tagged YAML nodes and are evaluated after merging.

mod filters;
mod functions;

pub mod engine;
pub mod error;

pub use engine::{stack_context, TemplateEngine};
pub use error::{Error, Result};
pub use tera::Context;

use std::sync::Arc;

/// Nested component lookup for `atmos_component`.
///
/// Implemented by the component materializer; returns the component's
/// fully materialized configuration as JSON.
pub trait ComponentFetcher: Send + Sync {
    fn fetch(&self, component: &str, stack: &str) -> std::result::Result<serde_json::Value, String>;
}

/// Named key-value store lookup for `atmos_store`.
pub trait StoreReader: Send + Sync {
    fn read(&self, store: &str, key: &str) -> std::result::Result<serde_json::Value, String>;
}

/// Shared handle types used when wiring the seams.
pub type SharedComponentFetcher = Arc<dyn ComponentFetcher>;
pub type SharedStoreReader = Arc<dyn StoreReader>;

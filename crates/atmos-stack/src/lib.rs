//! Stack resolver for Atmos
//!
//! Turns a hierarchical, deeply imported set of YAML stack manifests into
//! the fully materialized configuration for a `(component, stack)` pair:
//!
//! - **indexing**: enumerate manifests and derive stack identities
//! - **imports**: depth-first DAG expansion with per-site context
//! - **templating**: render expressions before structural merging
//! - **merging**: deterministic deep merge with list strategies and
//!   null-unset semantics
//! - **inheritance**: MRO-style linearization of `metadata.inherits`
//! - **functions**: lazy evaluation of `!include`, `!env`, `!exec`,
//!   `!template`, `!terraform.output`, `!terraform.state` with
//!   auth-context propagation
//!
//! The entry point is [`Materializer`]; everything else supports it.

pub mod component;
pub mod error;
pub mod funcs;
pub mod import;
pub mod index;
pub mod inherit;
pub mod manifest;
pub mod materialize;
pub mod merge;
pub mod node;
pub mod stores;

pub use component::{ComponentConfig, ComponentType, Metadata};
pub use error::{Error, Result};
pub use funcs::{OutputReader, RemoteStateReader};
pub use import::{ImportResolver, ResolvedImport};
pub use index::StackIndexer;
pub use manifest::{ImportSpec, Manifest};
pub use materialize::{MaterializeOptions, Materializer};
pub use merge::{SourceEntry, SourcesTrail};
pub use node::Node;
pub use stores::StoreRegistry;

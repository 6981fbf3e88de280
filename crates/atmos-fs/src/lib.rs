//! Filesystem primitives for Atmos
//!
//! Normalized cross-platform paths, atomic locked writes, SHA-256
//! fingerprints, and compiled include/exclude glob sets. Everything above
//! this crate goes through these primitives at I/O boundaries.

pub mod checksum;
pub mod error;
pub mod glob;
pub mod io;
pub mod lock;
pub mod path;

pub use checksum::{content_checksum, file_checksum, Fingerprint};
pub use error::{Error, Result};
pub use glob::GlobMatcher;
pub use io::write_atomic;
pub use lock::FileLock;
pub use path::NormalizedPath;

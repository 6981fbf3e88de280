//! SHA-256 checksums and cache fingerprints
//!
//! One canonical checksum format (`sha256:<hex>`) is used for tool archive
//! verification, and a builder-style [`Fingerprint`] keys the materializer
//! and YAML-function caches by the content of everything that went into a
//! computation.

use sha2::{Digest, Sha256};
use std::path::Path;

/// Prefix for all checksums produced by this module
const PREFIX: &str = "sha256:";

/// Compute the SHA-256 checksum of in-memory content.
///
/// Returns a string in the canonical format `"sha256:<hex>"`.
pub fn content_checksum(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{}{:x}", PREFIX, hasher.finalize())
}

/// Compute the SHA-256 checksum of a file's contents.
pub fn file_checksum(path: &Path) -> std::io::Result<String> {
    let content = std::fs::read(path)?;
    Ok(content_checksum(&content))
}

/// An order-sensitive accumulator producing a stable hex digest.
///
/// Cache keys are built by feeding each input part in a fixed order; parts
/// are length-prefixed so `("ab", "c")` and `("a", "bc")` never collide.
#[derive(Debug, Clone, Default)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one part into the fingerprint.
    pub fn add(&mut self, part: impl AsRef<[u8]>) -> &mut Self {
        let bytes = part.as_ref();
        self.hasher.update((bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
        self
    }

    /// Finish, producing the hex digest.
    pub fn finish(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}

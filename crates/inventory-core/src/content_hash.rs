//! Content hashes for attachment bodies.
//!
//! Recorded on every `ImageRef` as advisory metadata. Nothing in this crate
//! deduplicates on it.

use sha2::{Digest, Sha256};

/// SHA-256 of a blob body, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(String);

impl ContentHash {
    /// Compute hash from content bytes.
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

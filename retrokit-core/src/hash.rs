//! SHA-256 identities for molecules, products, registries and reports.
//!
//! [`ContentHasher`] length-prefixes every field, so `["ab", "c"]` and
//! `["a", "bc"]` never collide. Identical inputs always give identical hex
//! digests, which is what the byte-for-byte reproducibility checks compare.

use sha2::{Digest, Sha256};

/// Incremental digest over a sequence of typed fields.
#[derive(Debug, Clone, Default)]
pub struct ContentHasher {
    inner: Sha256,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one variable-length field.
    pub fn field(&mut self, bytes: impl AsRef<[u8]>) -> &mut Self {
        let bytes = bytes.as_ref();
        self.inner.update((bytes.len() as u64).to_le_bytes());
        self.inner.update(bytes);
        self
    }

    /// Append one fixed-width integer field.
    pub fn number(&mut self, value: u64) -> &mut Self {
        self.inner.update(value.to_le_bytes());
        self
    }

    /// Lowercase hex digest.
    pub fn finish(self) -> String {
        hex::encode(self.inner.finalize())
    }
}

/// Digest of one serialized document, e.g. a report's JSON bytes.
pub fn sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Digest of several length-prefixed fields.
pub fn sha256_parts<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> String {
    let mut hasher = ContentHasher::new();
    for part in parts {
        hasher.field(part);
    }
    hasher.finish()
}

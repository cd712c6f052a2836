//! Template fingerprinting.
//!
//! A fingerprint is a SHA-256 digest of the canonical serialization of a
//! template document. Object keys are serialized in sorted order, so two
//! documents that only differ in key order share a fingerprint.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Hasher for computing template fingerprints.
#[derive(Debug, Default)]
pub struct TemplateHasher;

impl TemplateHasher {
    /// Creates a new template hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the fingerprint of a template document.
    #[must_use]
    pub fn fingerprint(&self, document: &Value) -> String {
        let mut hasher = Sha256::new();
        Self::feed(&mut hasher, document);
        hex::encode(hasher.finalize())
    }

    /// Feeds a value into the hasher in canonical order.
    ///
    /// Every value is prefixed by a one-byte kind tag so that, for instance,
    /// the string `"1"` and the number `1` hash differently.
    fn feed(hasher: &mut Sha256, value: &Value) {
        match value {
            Value::Null => hasher.update([0u8]),
            Value::Bool(b) => hasher.update([1u8, u8::from(*b)]),
            Value::Number(n) => {
                hasher.update([2u8]);
                hasher.update(n.to_string().as_bytes());
            }
            Value::String(s) => {
                hasher.update([3u8]);
                hasher.update((s.len() as u64).to_be_bytes());
                hasher.update(s.as_bytes());
            }
            Value::Array(items) => {
                hasher.update([4u8]);
                hasher.update((items.len() as u64).to_be_bytes());
                for item in items {
                    Self::feed(hasher, item);
                }
            }
            Value::Object(map) => {
                hasher.update([5u8]);
                hasher.update((map.len() as u64).to_be_bytes());
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort_unstable();
                for key in keys {
                    hasher.update((key.len() as u64).to_be_bytes());
                    hasher.update(key.as_bytes());
                    Self::feed(hasher, &map[key.as_str()]);
                }
            }
        }
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }
}

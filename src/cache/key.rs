//! Cache key derivation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Bytes of the SHA-256 digest kept in the key (128 bits).
const DIGEST_BYTES: usize = 16;
/// Longest model segment kept in a key, so file names stay short.
const MAX_MODEL_SEGMENT: usize = 64;

/// Stable, filesystem-safe identifier of a cached response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wrap an existing key string. No validation: backends that touch the
    /// filesystem check [`is_filesystem_safe`](Self::is_filesystem_safe) themselves.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Only `[A-Za-z0-9_-]`, non-empty.
    pub fn is_filesystem_safe(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Turns a `(prompt, model id)` pair into a [`CacheKey`].
///
/// The key is `<sanitized model>_<32 hex chars>`. The hex part is the first
/// 128 bits of SHA-256 over the model id and the prompt, so two models whose
/// sanitized names collide (`gpt-4` and `gpt_4`) still get distinct keys.
#[derive(Debug, Clone, Default)]
pub struct KeyDeriver {
    namespace: Option<String>,
}

impl KeyDeriver {
    pub fn new() -> Self {
        Self { namespace: None }
    }

    /// Separate key spaces for different tools sharing one cache directory.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn derive(&self, prompt: &str, model_id: &str) -> CacheKey {
        let mut hasher = Sha256::new();
        if let Some(ref ns) = self.namespace {
            hasher.update(ns.as_bytes());
            hasher.update([0u8]);
        }
        hasher.update(model_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(prompt.as_bytes());
        let digest = hasher.finalize();
        let hash: String = digest[..DIGEST_BYTES]
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        CacheKey(format!("{}_{}", sanitize_model(model_id), hash))
    }
}

fn sanitize_model(model_id: &str) -> String {
    let safe: String = model_id
        .chars()
        .take(MAX_MODEL_SEGMENT)
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if safe.is_empty() {
        "default".to_string()
    } else {
        safe
    }
}

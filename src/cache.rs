//! Memoization of comparison results across repeated runs in one session.
//!
//! Entries are keyed by the SHA-256 digests of both raw inputs together with
//! the full [`ComparisonConfig`], so changing a file or any setting yields a
//! different key. The cache is a plain value owned by its caller.

use std::collections::HashMap;

use anyhow::Result;
use log::debug;
use sha2::{Digest, Sha256};

use crate::{config::ComparisonConfig, session::ComparisonOutput};

/// Lowercase hex SHA-256 of `bytes`.
pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub previous_digest: String,
    pub current_digest: String,
    pub config: ComparisonConfig,
    /// Parse settings applied to the raw bytes.
    pub format: String,
}

impl CacheKey {
    pub fn new(previous: &[u8], current: &[u8], config: &ComparisonConfig) -> Self {
        Self {
            previous_digest: digest_bytes(previous),
            current_digest: digest_bytes(current),
            config: config.clone(),
            format: String::new(),
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    fn mentions(&self, digest: &str) -> bool {
        self.previous_digest == digest || self.current_digest == digest
    }
}

#[derive(Debug, Default)]
pub struct ReconcileCache {
    entries: HashMap<CacheKey, ComparisonOutput>,
    hits: usize,
    misses: usize,
}

impl ReconcileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored output for `key`, running `compute` on a miss.
    /// Failed computations are not stored.
    pub fn get_or_compute<F>(&mut self, key: CacheKey, compute: F) -> Result<&mut ComparisonOutput>
    where
        F: FnOnce() -> Result<ComparisonOutput>,
    {
        if self.entries.contains_key(&key) {
            self.hits += 1;
            debug!("Comparison cache hit ({} entries)", self.entries.len());
        } else {
            self.misses += 1;
            let output = compute()?;
            self.entries.insert(key.clone(), output);
        }
        self.entries
            .get_mut(&key)
            .ok_or_else(|| anyhow::anyhow!("Comparison cache lost an entry"))
    }

    pub fn get(&self, key: &CacheKey) -> Option<&ComparisonOutput> {
        self.entries.get(key)
    }

    /// Evicts every entry computed from an input with this digest.
    pub fn invalidate_input(&mut self, digest: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.mentions(digest));
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!("Evicted {evicted} cached comparison(s) for input {digest}");
        }
        evicted
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}

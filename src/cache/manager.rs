//! Best-effort response cache.

use super::backend::{CacheBackend, CacheEntry, DiskCache, NullCache};
use super::key::CacheKey;
use crate::config::CacheSettings;
use crate::Result;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Payloads larger than this are not stored.
    pub max_entry_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entry_bytes: 16 * 1024 * 1024,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_max_entry_bytes(mut self, bytes: usize) -> Self {
        self.max_entry_bytes = bytes;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    errors: AtomicU64,
}

impl AtomicStats {
    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Key → raw response text store that never fails its caller.
///
/// Reads that hit an unreadable or corrupted store return `None`; writes that
/// fail return `false`. Both log a warning. The cache is an optimization:
/// callers proceed without it.
pub struct ResponseCache {
    config: CacheConfig,
    backend: Box<dyn CacheBackend>,
    stats: AtomicStats,
}

impl ResponseCache {
    pub fn new(config: CacheConfig, backend: Box<dyn CacheBackend>) -> Self {
        Self {
            config,
            backend,
            stats: AtomicStats::default(),
        }
    }

    /// On-disk cache under `dir` with default settings.
    pub fn disk(dir: impl Into<PathBuf>) -> Self {
        Self::new(CacheConfig::default(), Box::new(DiskCache::new(dir)))
    }

    pub fn disabled() -> Self {
        Self::new(CacheConfig::default().with_enabled(false), Box::new(NullCache::new()))
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        let config = CacheConfig::new()
            .with_enabled(settings.enabled)
            .with_max_entry_bytes(settings.max_entry_bytes);
        Self::new(config, Box::new(DiskCache::new(settings.dir.clone())))
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        self.entry(key).await.map(|e| e.payload)
    }

    /// Like [`get`](Self::get) but includes the store timestamp.
    pub async fn entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        if !self.config.enabled {
            return None;
        }
        match self.backend.get(key).await {
            Ok(Some(entry)) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = key.as_str(), backend = self.backend.name(), "cache hit");
                Some(entry)
            }
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                warn!(
                    key = key.as_str(),
                    backend = self.backend.name(),
                    error = %e,
                    "cache read failed; treating as miss"
                );
                None
            }
        }
    }

    pub async fn set(&self, key: &CacheKey, payload: &str) -> bool {
        if !self.config.enabled {
            return false;
        }
        if payload.len() > self.config.max_entry_bytes {
            warn!(
                key = key.as_str(),
                bytes = payload.len(),
                limit = self.config.max_entry_bytes,
                "payload too large to cache"
            );
            return false;
        }
        match self.backend.set(key, payload).await {
            Ok(()) => {
                self.stats.sets.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                warn!(
                    key = key.as_str(),
                    backend = self.backend.name(),
                    error = %e,
                    "cache write failed; continuing without cache"
                );
                false
            }
        }
    }

    pub async fn delete(&self, key: &CacheKey) -> bool {
        match self.backend.delete(key).await {
            Ok(removed) => removed,
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                warn!(key = key.as_str(), error = %e, "cache delete failed");
                false
            }
        }
    }

    /// Remove all persisted entries. Works even when the cache is disabled,
    /// since it is an explicit user action.
    pub async fn clear(&self) -> Result<usize> {
        let removed = self.backend.clear().await?;
        debug!(removed, backend = self.backend.name(), "cache cleared");
        Ok(removed)
    }

    pub async fn len(&self) -> usize {
        self.backend.len().await.unwrap_or_else(|e| {
            warn!(error = %e, "cannot count cache entries");
            0
        })
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{KeyDeriver, MemoryCache};

    #[tokio::test]
    async fn round_trips_edge_payloads() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = ResponseCache::disk(tmp.path());
        let d = KeyDeriver::new();

        let big = "Σ lorem ipsum dolor sit amet\n".repeat(120_000);
        let payloads = ["", "Question: 2+2?\nCorrect Answer: B", "质数是什么？ 🚀", big.as_str()];
        for (i, payload) in payloads.iter().enumerate() {
            let key = d.derive(&format!("prompt {}", i), "llama-3.3-70b");
            assert!(cache.set(&key, payload).await);
            assert_eq!(cache.get(&key).await.as_deref(), Some(*payload));
        }
        assert_eq!(cache.len().await, payloads.len());
    }

    #[tokio::test]
    async fn disabled_cache_is_a_no_op() {
        let cache = ResponseCache::new(
            CacheConfig::new().with_enabled(false),
            Box::new(MemoryCache::new(8)),
        );
        let key = CacheKey::from("k");
        assert!(!cache.set(&key, "v").await);
        assert!(cache.get(&key).await.is_none());
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[tokio::test]
    async fn oversized_payloads_are_skipped() {
        let cache = ResponseCache::new(
            CacheConfig::new().with_max_entry_bytes(4),
            Box::new(MemoryCache::new(8)),
        );
        assert!(!cache.set(&"k".into(), "12345").await);
        assert!(cache.set(&"k".into(), "1234").await);
    }

    #[tokio::test]
    async fn unreadable_store_degrades_to_miss() {
        let tmp = tempfile::tempdir().unwrap();
        // A regular file where the cache directory should be.
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "not a dir").unwrap();
        let cache = ResponseCache::disk(&blocker);
        let key = CacheKey::from("k");

        assert!(!cache.set(&key, "v").await);
        assert!(cache.get(&key).await.is_none());
        assert_eq!(cache.stats().errors, 2);
    }

    #[tokio::test]
    async fn stats_track_hits_and_misses() {
        let cache = ResponseCache::new(CacheConfig::default(), Box::new(MemoryCache::new(8)));
        let key = CacheKey::from("k");
        assert!(cache.get(&key).await.is_none());
        cache.set(&key, "v").await;
        assert!(cache.get(&key).await.is_some());

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.sets), (1, 1, 1));
        assert!((stats.hit_ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn clear_reports_removed_count() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = ResponseCache::disk(tmp.path());
        cache.set(&"a".into(), "1").await;
        cache.set(&"b".into(), "2").await;
        assert_eq!(cache.clear().await.unwrap(), 2);
        assert!(cache.get(&"a".into()).await.is_none());
    }
}

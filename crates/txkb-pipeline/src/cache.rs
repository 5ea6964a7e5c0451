//! Caching layer for entity resolution
//!
//! The same surface forms recur across windows, candidates, and documents,
//! and a merge re-resolves every relation endpoint. Caching both hits and
//! misses keeps each distinct name to one remote lookup per TTL.
//!
//! Uses the moka crate for thread-safe, async-compatible caching with TTL
//! support.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};

use txkb_core::{EntityRef, EntityResolver, ResolverConfig, Result};

// ============================================================================
// Cached Resolver
// ============================================================================

/// Caching wrapper around any [`EntityResolver`].
///
/// Errors are passed through and never cached.
#[derive(Clone)]
pub struct CachedResolver {
    inner: Arc<dyn EntityResolver>,
    cache: Cache<String, Option<EntityRef>>,
    stats: Arc<CacheStats>,
}

impl CachedResolver {
    pub fn new(inner: Arc<dyn EntityResolver>, capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();

        Self {
            inner,
            cache,
            stats: Arc::new(CacheStats::new("resolver")),
        }
    }

    /// Create from config
    pub fn from_config(inner: Arc<dyn EntityResolver>, config: &ResolverConfig) -> Self {
        Self::new(
            inner,
            config.cache_capacity,
            Duration::from_secs(config.cache_ttl_secs),
        )
    }

    /// Get cache statistics
    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    /// Get current cache size
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Clear all cached lookups
    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        self.stats.reset();
    }
}

#[async_trait::async_trait]
impl EntityResolver for CachedResolver {
    async fn resolve(&self, name: &str) -> Result<Option<EntityRef>> {
        if let Some(cached) = self.cache.get(name).await {
            self.stats.record_hit();
            return Ok(cached);
        }
        self.stats.record_miss();

        match self.inner.resolve(name).await {
            Ok(resolved) => {
                self.cache.insert(name.to_string(), resolved.clone()).await;
                self.stats.record_write();
                Ok(resolved)
            }
            Err(e) => {
                self.stats.record_error();
                Err(e)
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

// ============================================================================
// Cache Statistics
// ============================================================================

/// Statistics for cache performance monitoring
#[derive(Debug)]
pub struct CacheStats {
    name: String,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    /// Lookups that failed and were not cached
    errors: AtomicU64,
}

impl CacheStats {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Get total requests (hits + misses)
    pub fn total_requests(&self) -> u64 {
        self.hits() + self.misses()
    }

    /// Calculate hit rate (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }

    /// Get a summary report
    pub fn report(&self) -> CacheStatsReport {
        CacheStatsReport {
            name: self.name.clone(),
            hits: self.hits(),
            misses: self.misses(),
            writes: self.writes(),
            errors: self.errors(),
            total_requests: self.total_requests(),
            hit_rate: self.hit_rate(),
        }
    }
}

/// Serializable cache statistics report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatsReport {
    pub name: String,
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub errors: u64,
    pub total_requests: u64,
    /// Hit rate (0.0 - 1.0)
    pub hit_rate: f64,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use txkb_core::KbError;

    /// Resolves "Paris" only; fails on "flaky"
    #[derive(Default)]
    struct CountingResolver {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl EntityResolver for CountingResolver {
        async fn resolve(&self, name: &str) -> Result<Option<EntityRef>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match name {
                "Paris" => Ok(Some(EntityRef::new(
                    "Paris",
                    "https://en.wikipedia.org/wiki/Paris",
                    "Capital of France",
                ))),
                "flaky" => Err(KbError::Resolver("timeout".to_string())),
                _ => Ok(None),
            }
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn cached(inner: Arc<CountingResolver>) -> CachedResolver {
        CachedResolver::new(inner, 100, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_hits_are_cached() {
        let inner = Arc::new(CountingResolver::default());
        let resolver = cached(inner.clone());

        let first = resolver.resolve("Paris").await.unwrap();
        let second = resolver.resolve("Paris").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.stats().hits(), 1);
        assert_eq!(resolver.stats().misses(), 1);
        assert_eq!(resolver.stats().writes(), 1);
    }

    #[tokio::test]
    async fn test_misses_are_cached() {
        let inner = Arc::new(CountingResolver::default());
        let resolver = cached(inner.clone());

        assert!(resolver.resolve("Atlantis").await.unwrap().is_none());
        assert!(resolver.resolve("Atlantis").await.unwrap().is_none());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let inner = Arc::new(CountingResolver::default());
        let resolver = cached(inner.clone());

        assert!(resolver.resolve("flaky").await.is_err());
        assert!(resolver.resolve("flaky").await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.stats().errors(), 2);
        assert_eq!(resolver.stats().writes(), 0);
    }

    #[tokio::test]
    async fn test_clear_resets_stats() {
        let inner = Arc::new(CountingResolver::default());
        let resolver = cached(inner.clone());

        resolver.resolve("Paris").await.unwrap();
        resolver.clear().await;

        assert_eq!(resolver.entry_count(), 0);
        assert_eq!(resolver.stats().total_requests(), 0);
        resolver.resolve("Paris").await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stats_report() {
        let stats = CacheStats::new("resolver");
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();

        let report = stats.report();
        assert_eq!(report.name, "resolver");
        assert_eq!(report.total_requests, 4);
        assert!((report.hit_rate - 0.75).abs() < f64::EPSILON);
    }
}

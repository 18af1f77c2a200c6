//! Price snapshot caching with TTL support.

use std::sync::Arc;

use async_trait::async_trait;
use bridgeledger_common::Price;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::error::PricingResult;
use crate::provider::{PriceSnapshot, PriceSource};

/// Cached snapshot entry.
#[derive(Debug, Clone)]
struct CacheEntry {
    snapshot: PriceSnapshot,
    cached_at: DateTime<Utc>,
    ttl: Duration,
}

impl CacheEntry {
    fn new(snapshot: PriceSnapshot, ttl: Duration) -> Self {
        Self {
            snapshot,
            cached_at: Utc::now(),
            ttl,
        }
    }

    fn is_valid(&self) -> bool {
        Utc::now().signed_duration_since(self.cached_at) < self.ttl
    }
}

/// Configuration for the price cache.
#[derive(Debug, Clone)]
pub struct PriceCacheConfig {
    /// How long a snapshot stays fresh.
    pub ttl: Duration,
    /// Whether caching is enabled at all.
    pub enabled: bool,
}

impl Default for PriceCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::zero(),
            enabled: false,
        }
    }
}

impl PriceCacheConfig {
    /// Enabled cache with the given TTL in milliseconds; 0 disables it.
    pub fn from_ttl_ms(ttl_ms: i64) -> Self {
        Self {
            ttl: Duration::milliseconds(ttl_ms.max(0)),
            enabled: ttl_ms > 0,
        }
    }
}

/// Thread-safe snapshot cache keyed by source name.
pub struct PriceCache {
    cache: DashMap<String, CacheEntry>,
    config: PriceCacheConfig,
}

impl PriceCache {
    pub fn new(config: PriceCacheConfig) -> Self {
        Self {
            cache: DashMap::new(),
            config,
        }
    }

    /// Get a snapshot from cache if still fresh.
    pub fn get(&self, key: &str) -> Option<PriceSnapshot> {
        if !self.config.enabled {
            return None;
        }

        if let Some(entry) = self.cache.get(key) {
            if entry.is_valid() {
                debug!(source = key, "Price cache hit");
                return Some(entry.snapshot);
            }
            debug!(source = key, "Price cache entry expired");
            drop(entry);
            self.cache.remove(key);
        }

        None
    }

    /// Insert a snapshot.
    pub fn insert(&self, key: &str, snapshot: PriceSnapshot) {
        if !self.config.enabled {
            return;
        }
        self.cache
            .insert(key.to_string(), CacheEntry::new(snapshot, self.config.ttl));
    }

    /// Drop every cached snapshot.
    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Evict expired entries.
    pub fn evict_expired(&self) {
        self.cache.retain(|_, entry| entry.is_valid());
    }
}

/// Decorates a price source with a [`PriceCache`], so consecutive reads
/// inside the TTL observe the same snapshot.
pub struct CachedPriceSource {
    inner: Arc<dyn PriceSource>,
    cache: PriceCache,
}

impl CachedPriceSource {
    pub fn new(inner: Arc<dyn PriceSource>, config: PriceCacheConfig) -> Self {
        Self {
            inner,
            cache: PriceCache::new(config),
        }
    }

    /// Access the underlying cache.
    pub fn cache(&self) -> &PriceCache {
        &self.cache
    }
}

#[async_trait]
impl PriceSource for CachedPriceSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn source_price_usd(&self) -> PricingResult<Price> {
        Ok(self.snapshot().await?.source)
    }

    async fn target_price_usd(&self) -> PricingResult<Price> {
        Ok(self.snapshot().await?.target)
    }

    async fn snapshot(&self) -> PricingResult<PriceSnapshot> {
        let key = self.inner.name();
        if let Some(cached) = self.cache.get(key) {
            return Ok(cached);
        }

        let snapshot = self.inner.snapshot().await?;
        self.cache.insert(key, snapshot);
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SimulatedPriceSource;
    use std::thread::sleep;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn test_cache_hit() {
        let inner = Arc::new(SimulatedPriceSource::default());
        let cached = CachedPriceSource::new(inner.clone(), PriceCacheConfig::from_ttl_ms(60_000));

        let first = cached.snapshot().await.unwrap();
        inner.set_source_price(Price::new(1));
        let second = cached.snapshot().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(inner.fetch_count(), 1);
        assert_eq!(cached.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_cache_disabled() {
        let inner = Arc::new(SimulatedPriceSource::default());
        let cached = CachedPriceSource::new(inner.clone(), PriceCacheConfig::default());

        cached.snapshot().await.unwrap();
        cached.snapshot().await.unwrap();

        assert_eq!(inner.fetch_count(), 2);
        assert!(cached.cache().is_empty());
    }

    #[test]
    fn test_cache_expiry() {
        let cache = PriceCache::new(PriceCacheConfig::from_ttl_ms(50));
        let snapshot = PriceSnapshot::new(Price::new(62_000_000), Price::new(4_500_000));

        cache.insert("SIMULATED", snapshot);
        assert!(cache.get("SIMULATED").is_some());

        sleep(StdDuration::from_millis(60));

        assert!(cache.get("SIMULATED").is_none());
    }

    #[test]
    fn test_cache_clear() {
        let cache = PriceCache::new(PriceCacheConfig::from_ttl_ms(1_000));
        cache.insert("A", PriceSnapshot::new(Price::new(1), Price::new(2)));
        cache.insert("B", PriceSnapshot::new(Price::new(3), Price::new(4)));

        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}

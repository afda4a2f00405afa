//! Process-wide registry of model caches.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;

use super::clock::{Clock, SystemClock};
use super::data_cache::{CacheState, DataCache};
use crate::catalog::ModelComposition;

/// Shared handle to one model's cache. Holding the lock serializes every
/// operation on that model.
pub type CacheHandle = Arc<Mutex<DataCache>>;

/// Cache statistics.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    /// Calculate hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }
}

/// Owns one [`DataCache`] per model name.
#[derive(Debug)]
pub struct CacheCoordinator {
    clock: Arc<dyn Clock>,
    caches: DashMap<String, CacheHandle>,
    stats: CacheStats,
}

impl Default for CacheCoordinator {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl CacheCoordinator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            caches: DashMap::new(),
            stats: CacheStats::default(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Cache of a model, created absent on first use.
    pub fn handle(&self, composition: &ModelComposition) -> CacheHandle {
        if let Some(existing) = self.caches.get(composition.model()) {
            return existing.clone();
        }
        self.caches
            .entry(composition.model().to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(
                    DataCache::new(
                        composition.primary_key().name.clone(),
                        composition.cache().expiration,
                    )
                    .with_newest_first(composition.date_created().is_some()),
                ))
            })
            .clone()
    }

    /// Lock a model's cache and drop it first if it has expired.
    pub fn with_cache<R>(&self, composition: &ModelComposition, f: impl FnOnce(&mut DataCache) -> R) -> R {
        let handle = self.handle(composition);
        let mut cache = handle.lock();
        if cache.check_expired(self.now()) {
            self.stats.record_expiration();
            tracing::warn!(model = %composition.model(), "cache expired, reset");
        }
        f(&mut cache)
    }

    /// Current state of a model's cache, if it was ever used.
    pub fn state(&self, model: &str) -> Option<CacheState> {
        let handle = self.caches.get(model)?.clone();
        let state = handle.lock().state();
        Some(state)
    }

    /// Number of rows cached for a model.
    pub fn cached_rows(&self, model: &str) -> usize {
        match self.caches.get(model).map(|h| h.clone()) {
            Some(handle) => handle.lock().len(),
            None => 0,
        }
    }

    /// Reset one model's cache.
    pub fn reset(&self, model: &str) {
        if let Some(handle) = self.caches.get(model).map(|h| h.clone()) {
            handle.lock().reset();
            tracing::debug!(model, "cache reset");
        }
    }

    /// Reset every cache.
    pub fn reset_all(&self) {
        let handles: Vec<CacheHandle> = self.caches.iter().map(|e| e.value().clone()).collect();
        for handle in handles {
            handle.lock().reset();
        }
        tracing::debug!(caches = self.caches.len(), "all caches reset");
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::catalog::{KeyGeneration, ModelDescriptor, PrimitiveKind, PropertyDescriptor};
    use onedata_proto::Row;
    use std::time::Duration;

    fn blog() -> ModelComposition {
        let descriptor = ModelDescriptor::new("Blog")
            .with_table("Blog")
            .with_cache(Duration::from_secs(60))
            .with_property(
                PropertyDescriptor::new("Id", PrimitiveKind::Int32)
                    .primary_key(KeyGeneration::AutoIncrement),
            )
            .with_property(PropertyDescriptor::new("Name", PrimitiveKind::String));
        ModelComposition::build(&descriptor, "dbo").unwrap()
    }

    #[test]
    fn test_handle_is_shared_per_model() {
        let coordinator = CacheCoordinator::default();
        let composition = blog();
        let first = coordinator.handle(&composition);
        let second = coordinator.handle(&composition);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(coordinator.state("Blog"), Some(CacheState::Absent));
        assert_eq!(coordinator.state("Post"), None);
    }

    #[test]
    fn test_with_cache_expires_first() {
        let clock = Arc::new(ManualClock::default());
        let coordinator = CacheCoordinator::new(clock.clone());
        let composition = blog();

        coordinator.with_cache(&composition, |cache| {
            cache.fill(vec![Row::new().with("Id", 1)], clock.now())
        });
        assert_eq!(coordinator.cached_rows("Blog"), 1);

        clock.advance(Duration::from_secs(61));
        let state = coordinator.with_cache(&composition, |cache| cache.state());
        assert_eq!(state, CacheState::Absent);
        assert_eq!(coordinator.stats().expirations(), 1);
    }

    #[test]
    fn test_reset_all() {
        let coordinator = CacheCoordinator::default();
        let composition = blog();
        coordinator.with_cache(&composition, |cache| {
            cache.fill(vec![Row::new().with("Id", 1)], Utc::now())
        });
        coordinator.reset_all();
        assert_eq!(coordinator.state("Blog"), Some(CacheState::Absent));
    }
}

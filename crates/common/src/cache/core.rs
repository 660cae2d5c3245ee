//! TTL cache with lazy, read-time expiry
//!
//! Every entry carries its own TTL. Nothing sweeps the cache in the
//! background: an entry whose age has reached its TTL is reported absent by
//! [`TtlCache::get`] and removed at that moment.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use super::config::CacheConfig;
use super::stats::{CacheStats, MetricsCollector};
use crate::resilience::{Clock, SystemClock};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < self.ttl
    }
}

#[derive(Debug)]
struct CacheStorage<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    /// Insertion order, oldest first; used for size-bound eviction
    insertion_order: VecDeque<K>,
}

impl<K: Eq + Hash + Clone, V> CacheStorage<K, V> {
    fn new() -> Self {
        Self { entries: HashMap::new(), insertion_order: VecDeque::new() }
    }

    fn remove(&mut self, key: &K) -> Option<CacheEntry<V>> {
        self.insertion_order.retain(|k| k != key);
        self.entries.remove(key)
    }
}

/// Thread-safe cache whose entries expire individually.
///
/// # Example
/// ```
/// use std::time::Duration;
///
/// use courier_common::cache::{CacheConfig, TtlCache};
///
/// let cache: TtlCache<String, u32> = TtlCache::new(CacheConfig::ttl(Duration::from_secs(60)));
/// cache.insert("answer".to_string(), 42);
/// assert_eq!(cache.get(&"answer".to_string()), Some(42));
/// ```
pub struct TtlCache<K, V, C = SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    storage: RwLock<CacheStorage<K, V>>,
    config: CacheConfig,
    metrics: MetricsCollector,
    clock: C,
}

impl<K, V> TtlCache<K, V, SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a new cache using the system clock
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<K, V, C> TtlCache<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    /// Create a new cache with a custom clock (useful for testing)
    pub fn with_clock(config: CacheConfig, clock: C) -> Self {
        Self {
            storage: RwLock::new(CacheStorage::new()),
            config,
            metrics: MetricsCollector::default(),
            clock,
        }
    }

    /// Insert with the configured default TTL
    pub fn insert(&self, key: K, value: V) {
        self.insert_with_ttl(key, value, self.config.default_ttl);
    }

    /// Insert, replacing any previous entry for `key`
    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let mut storage = self.storage.write();

        if storage.entries.contains_key(&key) {
            storage.remove(&key);
        } else if let Some(max_size) = self.config.max_size {
            while storage.entries.len() >= max_size {
                let Some(oldest) = storage.insertion_order.pop_front() else {
                    break;
                };
                storage.entries.remove(&oldest);
                if self.config.track_metrics {
                    self.metrics.record_eviction();
                }
            }
        }

        let entry = CacheEntry { value, stored_at: self.clock.now(), ttl };
        storage.entries.insert(key.clone(), entry);
        storage.insertion_order.push_back(key);

        if self.config.track_metrics {
            self.metrics.record_insert();
        }
    }

    /// Get a live value, or `None` if absent or expired
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut storage = self.storage.write();

        let live = match storage.entries.get(key) {
            None => None,
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                storage.remove(key);
                if self.config.track_metrics {
                    self.metrics.record_expiration();
                }
                None
            }
        };

        if self.config.track_metrics {
            match live {
                Some(_) => self.metrics.record_hit(),
                None => self.metrics.record_miss(),
            }
        }
        live
    }

    /// Remove a value regardless of its age
    pub fn remove(&self, key: &K) -> Option<V> {
        self.storage.write().remove(key).map(|e| e.value)
    }

    /// Drop every entry; returns how many were stored
    pub fn clear(&self) -> usize {
        let mut storage = self.storage.write();
        let removed = storage.entries.len();
        storage.entries.clear();
        storage.insertion_order.clear();
        removed
    }

    /// Number of stored entries, including expired ones not yet read
    pub fn len(&self) -> usize {
        self.storage.read().entries.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot(self.len(), self.config.max_size)
    }
}

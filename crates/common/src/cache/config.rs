//! Cache configuration

use std::time::Duration;

/// Configuration for [`TtlCache`](super::TtlCache)
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL applied by [`insert`](super::TtlCache::insert) when the caller
    /// does not pass one explicitly
    pub default_ttl: Duration,

    /// Maximum number of entries (None = unlimited). When full, the oldest
    /// insertion is evicted first.
    pub max_size: Option<usize>,

    /// Whether to collect hit/miss/expiration counters
    pub track_metrics: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { default_ttl: Duration::from_secs(300), max_size: None, track_metrics: true }
    }
}

impl CacheConfig {
    /// Unbounded cache with the given default TTL
    pub fn ttl(default_ttl: Duration) -> Self {
        Self { default_ttl, ..Self::default() }
    }

    /// Cap the number of entries
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// Enable or disable metrics collection
    pub fn with_metrics(mut self, track: bool) -> Self {
        self.track_metrics = track;
        self
    }
}

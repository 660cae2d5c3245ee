//! Response cache for read-only requests
//!
//! Maps a [`RequestFingerprint`] to the `datum` of a successful response.
//! Entries expire lazily at read time; nothing sweeps in the background.

use std::sync::Arc;
use std::time::Duration;

use courier_common::cache::{CacheConfig, CacheStats, TtlCache};
use courier_common::resilience::Clock;
use courier_domain::RequestFingerprint;
use serde_json::Value;
use tracing::{debug, info};

/// TTL store of successful GET payloads
pub struct ResponseCache {
    entries: TtlCache<RequestFingerprint, Value, Arc<dyn Clock>>,
    default_ttl: Duration,
}

impl ResponseCache {
    /// Cache reading time from `clock`; `max_entries` bounds its size
    pub fn with_clock(default_ttl: Duration, max_entries: Option<usize>, clock: Arc<dyn Clock>) -> Self {
        let mut config = CacheConfig::ttl(default_ttl);
        if let Some(max) = max_entries {
            config = config.with_max_size(max);
        }
        Self { entries: TtlCache::with_clock(config, clock), default_ttl }
    }

    /// Live payload for `fingerprint`; expired entries read as absent
    pub fn get(&self, fingerprint: &RequestFingerprint) -> Option<Value> {
        let hit = self.entries.get(fingerprint);
        debug!(fingerprint = %fingerprint, hit = hit.is_some(), "response cache lookup");
        hit
    }

    /// Store `payload`, replacing any previous entry
    pub fn set(&self, fingerprint: RequestFingerprint, payload: Value, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        debug!(fingerprint = %fingerprint, ttl_ms, "caching response");
        self.entries.insert_with_ttl(fingerprint, payload, ttl);
    }

    /// Drop every entry; returns how many were stored
    pub fn clear(&self) -> usize {
        let removed = self.entries.clear();
        info!(removed, "response cache cleared");
        removed
    }

    /// Stored entries, expired ones included until read
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hit, miss and expiration counters
    pub fn stats(&self) -> CacheStats {
        self.entries.stats()
    }
}

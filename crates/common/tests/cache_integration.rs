//! Integration tests for the TTL cache
//!
//! Uses the mock clock so expiry is deterministic.

#![cfg(feature = "runtime")]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use courier_common::cache::{CacheConfig, TtlCache};
use courier_common::resilience::MockClock;

/// Validates per-entry TTLs against a shared default.
///
/// # Test Steps
/// 1. Insert one entry with the default TTL (10s) and one with 2s
/// 2. Advance 3s: the short entry is gone, the default one is live
/// 3. Advance past 10s: both are gone and expirations were counted
#[test]
fn test_per_entry_ttl_expiry() {
    let clock = MockClock::new();
    let cache: TtlCache<String, u32, MockClock> =
        TtlCache::with_clock(CacheConfig::ttl(Duration::from_secs(10)), clock.clone());

    cache.insert("long".to_string(), 1);
    cache.insert_with_ttl("short".to_string(), 2, Duration::from_secs(2));

    clock.advance(Duration::from_secs(3));
    assert_eq!(cache.get(&"short".to_string()), None);
    assert_eq!(cache.get(&"long".to_string()), Some(1));

    clock.advance(Duration::from_secs(8));
    assert_eq!(cache.get(&"long".to_string()), None);

    let stats = cache.stats();
    assert_eq!(stats.expirations, 2);
    assert_eq!(stats.hits, 1);
    assert!(cache.is_empty());
}

/// Validates that the size bound evicts the oldest insertion.
#[test]
fn test_bounded_cache_evicts_oldest() {
    let cache: TtlCache<u32, u32> =
        TtlCache::new(CacheConfig::ttl(Duration::from_secs(60)).with_max_size(2));

    cache.insert(1, 10);
    cache.insert(2, 20);
    cache.insert(3, 30);

    assert_eq!(cache.get(&1), None);
    assert_eq!(cache.get(&3), Some(30));
    assert_eq!(cache.stats().evictions, 1);
}

/// Validates concurrent readers and writers on a shared cache.
#[test]
fn test_concurrent_access_from_threads() {
    let cache: Arc<TtlCache<u32, u32>> =
        Arc::new(TtlCache::new(CacheConfig::ttl(Duration::from_secs(60))));

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..50 {
                    cache.insert(t * 100 + i, i);
                    let _ = cache.get(&(t * 100 + i));
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().expect("writer thread");
    }

    assert_eq!(cache.len(), 200);
    assert_eq!(cache.stats().hits, 200);
    assert_eq!(cache.clear(), 200);
}

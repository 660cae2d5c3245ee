//! Per-entry TTL cache
//!
//! # Features
//!
//! - **Thread-safe**: interior `RwLock`, share with `Arc`
//! - **Lazy expiry**: entries are checked against their own TTL when read;
//!   there is no background sweeper
//! - **Optional size bound**: oldest insertion evicted first
//! - **Metrics**: hit/miss/insert/eviction/expiration counters
//! - **Testable**: clock abstraction for deterministic time-based tests
//!
//! # Example
//! ```
//! use std::time::Duration;
//!
//! use courier_common::cache::{CacheConfig, TtlCache};
//!
//! let cache: TtlCache<String, Vec<u8>> =
//!     TtlCache::new(CacheConfig::ttl(Duration::from_secs(300)).with_max_size(1_000));
//! cache.insert_with_ttl("session".to_string(), vec![1, 2, 3], Duration::from_secs(30));
//! ```

mod config;
mod core;
mod stats;

pub use config::CacheConfig;
pub use self::core::TtlCache;
pub use stats::CacheStats;

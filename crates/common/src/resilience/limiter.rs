//! Non-blocking concurrency ceiling with RAII permits
//!
//! A [`ConcurrencyLimit`] admits at most `max` holders at a time. Unlike a
//! bulkhead it never queues: [`ConcurrencyLimit::try_acquire`] either returns
//! a [`Permit`] immediately or refuses. The slot is returned when the permit
//! is dropped, so every exit path (including panics and cancelled futures)
//! releases exactly once.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

#[derive(Debug)]
struct LimitState {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    admitted: AtomicU64,
    rejected: AtomicU64,
}

/// Snapshot of limiter counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitMetrics {
    /// Permits currently held
    pub in_flight: usize,
    /// Highest `in_flight` value observed
    pub peak: usize,
    /// Configured ceiling
    pub max: usize,
    /// Total permits handed out
    pub admitted: u64,
    /// Total acquisitions refused at capacity
    pub rejected: u64,
}

/// Shared counter bounded by a fixed ceiling.
///
/// Cloning yields another handle to the same counter.
#[derive(Clone)]
pub struct ConcurrencyLimit {
    name: &'static str,
    max: usize,
    state: Arc<LimitState>,
}

impl ConcurrencyLimit {
    /// Create a limiter admitting at most `max` concurrent holders.
    pub fn new(name: &'static str, max: usize) -> Self {
        Self {
            name,
            max,
            state: Arc::new(LimitState {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                admitted: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
            }),
        }
    }

    /// Try to take a slot without waiting.
    ///
    /// Returns `None` when `max` permits are already held.
    pub fn try_acquire(&self) -> Option<Permit> {
        loop {
            let current = self.state.in_flight.load(Ordering::Acquire);
            if current >= self.max {
                self.state.rejected.fetch_add(1, Ordering::Relaxed);
                debug!(limit = self.name, in_flight = current, max = self.max, "limit reached");
                return None;
            }
            match self.state.in_flight.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.state.peak.fetch_max(current + 1, Ordering::AcqRel);
                    self.state.admitted.fetch_add(1, Ordering::Relaxed);
                    return Some(Permit { state: Arc::clone(&self.state) });
                }
                Err(_) => continue,
            }
        }
    }

    /// Number of permits currently held
    pub fn in_flight(&self) -> usize {
        self.state.in_flight.load(Ordering::Acquire)
    }

    /// Configured ceiling
    pub fn max(&self) -> usize {
        self.max
    }

    /// Current counters
    pub fn metrics(&self) -> LimitMetrics {
        LimitMetrics {
            in_flight: self.in_flight(),
            peak: self.state.peak.load(Ordering::Acquire),
            max: self.max,
            admitted: self.state.admitted.load(Ordering::Relaxed),
            rejected: self.state.rejected.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for ConcurrencyLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrencyLimit")
            .field("name", &self.name)
            .field("max", &self.max)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// Slot in a [`ConcurrencyLimit`]; released on drop.
#[must_use = "dropping the permit releases the slot immediately"]
#[derive(Debug)]
pub struct Permit {
    state: Arc<LimitState>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.state.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_beyond_ceiling() {
        let limit = ConcurrencyLimit::new("test", 2);

        let first = limit.try_acquire();
        let second = limit.try_acquire();
        let third = limit.try_acquire();

        assert!(first.is_some());
        assert!(second.is_some());
        assert!(third.is_none());
        assert_eq!(limit.in_flight(), 2);
        assert_eq!(limit.metrics().rejected, 1);
    }

    #[test]
    fn drop_returns_slot_exactly_once() {
        let limit = ConcurrencyLimit::new("test", 1);

        {
            let _permit = limit.try_acquire().expect("slot available");
            assert_eq!(limit.in_flight(), 1);
        }

        assert_eq!(limit.in_flight(), 0);
        assert!(limit.try_acquire().is_some());
        assert_eq!(limit.in_flight(), 0);
    }

    #[test]
    fn tracks_peak_and_admissions() {
        let limit = ConcurrencyLimit::new("test", 3);
        let held: Vec<_> = (0..3).filter_map(|_| limit.try_acquire()).collect();
        drop(held);

        let metrics = limit.metrics();
        assert_eq!(metrics.peak, 3);
        assert_eq!(metrics.admitted, 3);
        assert_eq!(metrics.in_flight, 0);
    }

    #[test]
    fn zero_ceiling_admits_nothing() {
        let limit = ConcurrencyLimit::new("test", 0);
        assert!(limit.try_acquire().is_none());
    }

    #[tokio::test]
    async fn permit_released_when_future_is_dropped() {
        let limit = ConcurrencyLimit::new("test", 1);
        let task_limit = limit.clone();

        let handle = tokio::spawn(async move {
            let _permit = task_limit.try_acquire();
            std::future::pending::<()>().await;
        });
        tokio::task::yield_now().await;
        handle.abort();
        let _ = handle.await;

        assert_eq!(limit.in_flight(), 0);
    }
}

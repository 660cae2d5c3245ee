//! Retry admission and backoff
//!
//! A failed attempt is retried only when it is retry-eligible (no response
//! or 5xx), the request still has budget, and the client-wide count of
//! retries in flight is below its ceiling. Each admitted retry holds a
//! [`Permit`] until the request it belongs to finishes.

use std::time::Duration;

use courier_common::error::ErrorClassification;
use courier_common::resilience::{ConcurrencyLimit, LimitMetrics, Permit};
use courier_domain::RequestDescriptor;
use tracing::{debug, warn};

use super::errors::ApiError;

/// Decides whether and when a failed request runs again
#[derive(Debug, Clone)]
pub struct RetryScheduler {
    in_flight: ConcurrencyLimit,
    default_delay: Duration,
}

impl RetryScheduler {
    /// `default_delay` is the first backoff for requests that set none.
    pub fn new(max_concurrent_retries: usize, default_delay: Duration) -> Self {
        Self { in_flight: ConcurrencyLimit::new("retries", max_concurrent_retries), default_delay }
    }

    /// Whether this failure class may be retried at all
    pub fn should_retry(error: &ApiError) -> bool {
        error.is_retryable()
    }

    /// Admit a retry of `descriptor` after `error`, or refuse.
    ///
    /// Refusal means the failure is final. On admission the client-wide
    /// counter is already incremented.
    pub fn admit(&self, descriptor: &RequestDescriptor, error: &ApiError) -> Option<ScheduledRetry> {
        if !Self::should_retry(error) {
            return None;
        }
        if descriptor.options.retry_budget == 0 {
            debug!(path = %descriptor.path, "retry budget exhausted");
            return None;
        }
        let Some(permit) = self.in_flight.try_acquire() else {
            warn!(
                path = %descriptor.path,
                max = self.in_flight.max(),
                "retry refused, too many retries in flight"
            );
            return None;
        };

        let delay = descriptor.options.retry_delay.unwrap_or(self.default_delay);
        let mut next = descriptor.derive_retry();
        next.options.retry_delay = Some(delay.saturating_mul(2));

        Some(ScheduledRetry { delay, descriptor: next, permit })
    }

    /// Retries currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.in_flight.in_flight()
    }

    /// Admitted, rejected and peak counters
    pub fn metrics(&self) -> LimitMetrics {
        self.in_flight.metrics()
    }
}

/// An admitted retry: wait `delay`, then dispatch `descriptor`
#[derive(Debug)]
pub struct ScheduledRetry {
    delay: Duration,
    descriptor: RequestDescriptor,
    permit: Permit,
}

impl ScheduledRetry {
    /// Backoff before the next attempt
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Next attempt's descriptor (budget decremented, delay doubled)
    pub fn descriptor(&self) -> &RequestDescriptor {
        &self.descriptor
    }

    /// Sleep for the backoff delay
    pub async fn wait(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    /// Next descriptor plus the slot to hold until the request finishes
    pub fn into_parts(self) -> (RequestDescriptor, Permit) {
        (self.descriptor, self.permit)
    }
}

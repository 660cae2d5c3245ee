//! Async testing utilities

use std::future::Future;
use std::time::Duration;

/// Wait for a future to complete with a timeout, returning a Result
pub async fn timeout_ok<F, T>(duration: Duration, fut: F) -> Result<T, tokio::time::error::Elapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, fut).await
}

/// Yield to the scheduler `rounds` times so spawned tasks on a
/// current-thread runtime reach their next suspension point.
pub async fn yield_many(rounds: usize) {
    for _ in 0..rounds {
        tokio::task::yield_now().await;
    }
}

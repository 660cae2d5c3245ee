//! Resilience primitives shared by the client core
//!
//! - [`Clock`]: time source abstraction with a controllable [`MockClock`]
//! - [`ConcurrencyLimit`]: non-queueing ceiling on concurrent work, handing
//!   out RAII [`Permit`]s so release cannot be skipped on any exit path

pub mod clock;
pub mod limiter;

pub use clock::{Clock, MockClock, SystemClock};
pub use limiter::{ConcurrencyLimit, LimitMetrics, Permit};

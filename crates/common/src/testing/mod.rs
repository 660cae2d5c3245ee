//! Testing utilities
//!
//! - **[`async_utils`]**: timeouts and scheduler helpers for async tests
//! - [`MockClock`] re-exported for time-controlled tests
//!
//! ```rust
//! use courier_common::testing::MockClock;
//!
//! let clock = MockClock::new();
//! clock.advance(std::time::Duration::from_secs(5));
//! ```

pub mod async_utils;

pub use async_utils::{timeout_ok, yield_many};

pub use crate::resilience::{Clock, MockClock, SystemClock};

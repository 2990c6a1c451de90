//! # tick-limit
//!
//! `tick-limit` provides a lock-free token bucket driven by virtual time.
//!
//! ## Core Philosophy
//!
//! Most rate limiters rely on a `Mutex` to protect internal state, which creates a bottleneck
//! under high thread contention. `tick-limit` keeps the entire bucket state in a single atomic
//! word and commits every debit with one Compare-And-Swap (CAS), retrying from a fresh snapshot
//! when another thread wins the race.
//!
//! ## Key Concepts
//!
//! * **Lock-Free**: No `Mutex` or `RwLock` in the hot path.
//! * **Lazy Evaluation**: Tokens are derived at the moment of the request from the last
//!   "empty" instant, eliminating the need for background worker threads or timers.
//! * **Virtual Time**: The caller supplies `now` as integer ticks. The primitive never reads
//!   a clock, which makes it deterministic and testable. [`ClockedBucket`] adds a real clock.
//! * **Admission Policy**: An [`Admission`] implementation decides how much of a request is
//!   granted: [`AllOrNothing`] by default, [`Partial`] or any closure otherwise.
//!
//! ## Example
//!
//! ```rust
//! use std::num::NonZeroU64;
//!
//! use tick_limit::Rate;
//! use tick_limit::TokenBucket;
//!
//! let rate = Rate::per_tick(NonZeroU64::new(5).unwrap());
//! let bucket = TokenBucket::new(rate, NonZeroU64::new(100).unwrap()).unwrap();
//!
//! // Buckets start empty: after 2 ticks there are 10 tokens.
//! assert_eq!(bucket.debit(10, 2), 10);
//! assert_eq!(bucket.debit(10, 2), 0);
//! assert_eq!(bucket.debit(10, 4), 10);
//! ```

use std::fmt::Debug;
use std::ops::ControlFlow;
use std::time::Duration;

mod admission;
mod clocked;
mod config;
mod error;
mod rate;
mod token_bucket;


pub use admission::Admission;
pub use admission::AllOrNothing;
pub use admission::Partial;
pub use clocked::ClockedBucket;
pub use config::BucketConfig;
pub use error::ConfigError;
pub use error::DebitError;
pub use rate::Rate;
pub use token_bucket::TokenBucket;

/// Reasons why a request might be rejected by a strategy.
#[derive(Debug, PartialEq)]
pub enum Reason {
    Overloaded { retry_after: Duration },
}

/// A clock-driven limiter that admits one request at a time.
///
/// Strategies must be `Send` and `Sync` to allow sharing across thread boundaries
/// via `Arc`.
pub trait Strategy: Debug {
    /// Attempts to process a single request.
    ///
    /// This method is non-blocking and uses atomic operations to update
    /// internal state.
    ///
    /// # Errors
    ///
    /// Returns `Reason` if the rate limit has been reached.
    fn process(&self) -> ControlFlow<Reason>;
}

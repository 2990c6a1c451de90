//! # Tower Tick
//!
//! `tower-tick` puts a [`tick_limit::Strategy`], typically a
//! [`tick_limit::ClockedBucket`], in front of a [Tower](https://github.com/tower-rs/tower)
//! service.
//!
//! The middleware never waits for capacity. When the strategy refuses a permit,
//! `poll_ready` fails at once with [`TickError::RateLimited`], carrying the strategy's
//! hint of when to retry. Retrying, queueing or shedding are left to the caller.
//!
//! ## Feature Flags
//!
//! - `axum`: Enables `IntoResponse` for [`TickError`], turning a rejection into
//!   `429 Too Many Requests` with a `Retry-After` header.

mod error;
mod layer;
mod service;

#[cfg(test)]
mod tests;

pub use error::TickError;
pub use layer::RateLimitLayer;
pub use service::RateLimitService;

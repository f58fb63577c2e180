//! Call throttling for external collaborators.
//!
//! - [`RateLimiter`]: sliding-window admission gate, one per session.
//! - [`RetryPolicy`]: exponential backoff for retryable failures.
//! - [`with_timeout`]: per-call deadline that surfaces a non-retryable timeout.

mod rate_limiter;
mod retry;

pub use rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimiter, SlidingWindow};
pub use retry::{parse_retry_after, with_timeout, RetryConfig, RetryPolicy, Retryable};

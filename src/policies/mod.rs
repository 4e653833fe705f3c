//! Retry delay policies.
//!
//! Used by the retry decorator to decide **how long** to wait between attempts.
//!
//! ## Contents
//! - [`BackoffPolicy`] how delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization to keep concurrent retries from lining up
//!
//! ## Quick wiring
//! ```text
//! RetryConfig { max_attempts, backoff: BackoffPolicy, on_fail }
//!      └─► decorators::retry uses backoff.next(attempt) between failed attempts
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → constant 100ms (factor=1.0), max=30s, jitter=None.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;

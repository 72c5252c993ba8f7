//! Rate limiting primitives.
//!
//! This module provides the building blocks for rate limiting:
//! - [`RateLimiter`]: The core trait for rate limiting logic.
//! - [`Permit`]: RAII guard that releases its permit exactly once when dropped.
//! - [`Decision`]: The result of a non-blocking check (Allowed/Denied).
//!
//! # Strategies
//!
//! - [`FixedWindowLimiter`]: at most `capacity` grants per window; the pool refills on the
//!   window boundary whether or not callers release. This is the default for the client.
//! - [`ConcurrencyLimiter`]: at most `capacity` permits held at once; `release` hands the
//!   permit back. No timer is involved.
//!
//! Both hand out permits first-come-first-served and park blocked callers on a condvar.

use crate::cancel::CancelToken;
use crate::error::RateLimitError;
use std::fmt;
use std::time::Duration;

pub(crate) mod pool;
pub mod strategies;
pub use strategies::{ConcurrencyLimiter, FixedWindowLimiter, RateLimiterBuilder, Strategy};

/// The decision returned by a non-blocking acquire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The request is allowed to proceed.
    Allowed {
        /// Number of permits remaining after this acquisition.
        remaining: u32,
    },
    /// The request is denied.
    Denied {
        /// How long until the pool is expected to refill. Zero when only a release can help.
        wait: Duration,
        /// Reason for denial (e.g., "window_exhausted", "concurrency_limit").
        reason: &'static str,
    },
}

impl Decision {
    /// Helper to check if allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

/// Core interface for rate limiting logic.
///
/// Every successful `acquire`/`acquire_with` (or allowed `try_acquire`) must be paired with
/// one `release`. Prefer [`Permit::acquire`], which does the pairing for you.
pub trait RateLimiter: Send + Sync + fmt::Debug {
    /// Block until a permit is granted, or until the wait is cancelled or times out.
    ///
    /// On error the caller holds no permit and the pool is unchanged.
    fn acquire_with(&self, cancel: Option<&CancelToken>) -> Result<(), RateLimitError>;

    /// Block until a permit is granted.
    fn acquire(&self) -> Result<(), RateLimitError> {
        self.acquire_with(None)
    }

    /// Take a permit without blocking.
    fn try_acquire(&self) -> Decision;

    /// End the hold of one permit.
    fn release(&self);

    /// Configured pool size.
    fn capacity(&self) -> u32;

    /// Permits that can be granted right now.
    fn available(&self) -> u32;

    /// Permits acquired and not yet released.
    fn in_flight(&self) -> u32;

    /// Callers currently parked in `acquire`.
    fn waiting(&self) -> usize;
}

/// A held permit. Dropping it releases the permit.
#[must_use = "dropping the permit releases it immediately"]
pub struct Permit<'a> {
    limiter: &'a dyn RateLimiter,
}

impl<'a> Permit<'a> {
    /// Acquire one permit from `limiter`, blocking as `RateLimiter::acquire_with` does.
    pub fn acquire(
        limiter: &'a dyn RateLimiter,
        cancel: Option<&CancelToken>,
    ) -> Result<Self, RateLimitError> {
        limiter.acquire_with(cancel)?;
        Ok(Self { limiter })
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.limiter.release();
    }
}

impl fmt::Debug for Permit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permit").field("limiter", &self.limiter).finish()
    }
}

use crate::cancel::CancelToken;
use crate::clock::{Clock, MonotonicClock};
use crate::error::RateLimitError;
use crate::rate_limit::pool::{duration_millis, PermitPool, Replenish};
use crate::rate_limit::{Decision, RateLimiter};
use crate::telemetry::{NullSink, TelemetrySink};
use std::sync::Arc;
use std::time::Duration;

/// Which limiter [`RateLimiterBuilder::build`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// At most `capacity` grants per window of the given length.
    FixedWindow(Duration),
    /// At most `capacity` permits held at once.
    Concurrency,
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::FixedWindow(Duration::from_secs(1))
    }
}

/// Builder shared by the limiter strategies.
#[derive(Debug, Clone)]
pub struct RateLimiterBuilder {
    capacity: u32,
    strategy: Strategy,
    max_wait: Option<Duration>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn TelemetrySink>,
}

impl RateLimiterBuilder {
    /// Start from `capacity` permits, a one-second fixed window and no wait bound.
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            strategy: Strategy::default(),
            max_wait: None,
            clock: Arc::new(MonotonicClock::default()),
            sink: Arc::new(NullSink),
        }
    }

    /// Set the pool size. Must be > 0.
    pub fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Shorthand for `strategy(Strategy::FixedWindow(window))`.
    pub fn window(self, window: Duration) -> Self {
        self.strategy(Strategy::FixedWindow(window))
    }

    /// Give up with `Timeout` after waiting this long. Must be > 0.
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    pub fn with_clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = sink;
        self
    }

    /// Build the configured limiter, validating inputs.
    pub fn build(self) -> Result<Arc<dyn RateLimiter>, RateLimitError> {
        let limiter: Arc<dyn RateLimiter> = match self.strategy {
            Strategy::FixedWindow(_) => Arc::new(self.build_fixed_window()?),
            Strategy::Concurrency => Arc::new(self.build_concurrency()?),
        };
        Ok(limiter)
    }

    /// Build a [`FixedWindowLimiter`]. Fails if the builder holds a concurrency strategy.
    ///
    /// A window with a partial millisecond is rounded up to the next whole millisecond.
    pub fn build_fixed_window(self) -> Result<FixedWindowLimiter, RateLimitError> {
        let window = match self.strategy {
            Strategy::FixedWindow(window) => window,
            Strategy::Concurrency => {
                return Err(RateLimitError::invalid(
                    "fixed-window limiter requested from a concurrency builder",
                ))
            }
        };
        if window < Duration::from_millis(1) {
            return Err(RateLimitError::invalid(format!(
                "window must be at least 1ms (got {window:?})"
            )));
        }
        let pool = self.pool(Replenish::Window { millis: duration_millis(window) })?;
        Ok(FixedWindowLimiter { pool, window })
    }

    /// Build a [`ConcurrencyLimiter`], ignoring any window.
    pub fn build_concurrency(self) -> Result<ConcurrencyLimiter, RateLimitError> {
        Ok(ConcurrencyLimiter { pool: self.pool(Replenish::OnRelease)? })
    }

    fn pool(self, replenish: Replenish) -> Result<Arc<PermitPool>, RateLimitError> {
        let pool = PermitPool::new(self.capacity, replenish, self.max_wait, self.clock, self.sink)?;
        tracing::debug!(capacity = self.capacity, ?replenish, max_wait = ?self.max_wait, "rate limiter ready");
        Ok(Arc::new(pool))
    }
}

/// Admits at most `capacity` requests per fixed window.
///
/// The pool refills to capacity when a window ends. `release` only ends the hold; it does
/// not return the permit, so bursts are bounded per window rather than by concurrency.
#[derive(Debug, Clone)]
pub struct FixedWindowLimiter {
    pool: Arc<PermitPool>,
    window: Duration,
}

impl FixedWindowLimiter {
    /// `capacity` grants per `window`. Fails if either is zero or the window is under 1ms.
    pub fn new(capacity: u32, window: Duration) -> Result<Self, RateLimitError> {
        RateLimiterBuilder::new(capacity).window(window).build_fixed_window()
    }

    pub fn builder(capacity: u32) -> RateLimiterBuilder {
        RateLimiterBuilder::new(capacity)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.pool.max_wait()
    }
}

/// Admits at most `capacity` concurrently held permits.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    pool: Arc<PermitPool>,
}

impl ConcurrencyLimiter {
    pub fn new(capacity: u32) -> Result<Self, RateLimitError> {
        RateLimiterBuilder::new(capacity).strategy(Strategy::Concurrency).build_concurrency()
    }

    pub fn builder(capacity: u32) -> RateLimiterBuilder {
        RateLimiterBuilder::new(capacity).strategy(Strategy::Concurrency)
    }

    pub fn max_wait(&self) -> Option<Duration> {
        self.pool.max_wait()
    }
}

macro_rules! delegate_to_pool {
    ($ty:ty) => {
        impl RateLimiter for $ty {
            fn acquire_with(&self, cancel: Option<&CancelToken>) -> Result<(), RateLimitError> {
                self.pool.acquire(cancel).map(|_| ())
            }

            fn try_acquire(&self) -> Decision {
                self.pool.try_acquire()
            }

            fn release(&self) {
                self.pool.release()
            }

            fn capacity(&self) -> u32 {
                self.pool.capacity()
            }

            fn available(&self) -> u32 {
                self.pool.available()
            }

            fn in_flight(&self) -> u32 {
                self.pool.in_flight()
            }

            fn waiting(&self) -> usize {
                self.pool.waiting()
            }
        }
    };
}

delegate_to_pool!(FixedWindowLimiter);
delegate_to_pool!(ConcurrencyLimiter);

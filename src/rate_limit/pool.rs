//! Mutex-guarded permit pool shared by the limiter strategies.
//!
//! Waiters take a ticket and park on a condvar; only the ticket at the head of the queue may
//! take a permit, which gives first-come-first-served grants. Timeouts and cancellation
//! remove the ticket without touching the permit counts.

use crate::cancel::{CancelToken, Wake};
use crate::clock::Clock;
use crate::error::RateLimitError;
use crate::rate_limit::Decision;
use crate::telemetry::{PolicyEvent, RateLimitEvent, TelemetrySink};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Parked waiters re-check the clock at least this often.
const MAX_PARK: Duration = Duration::from_millis(100);

/// How spent permits come back to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Replenish {
    /// Refill to capacity at every window boundary; `release` does not refund.
    Window { millis: u64 },
    /// Each `release` refunds one permit; no timer.
    OnRelease,
}

#[derive(Debug)]
struct PoolState {
    available: u32,
    in_flight: u32,
    window_started_at: u64,
    queue: VecDeque<u64>,
    next_ticket: u64,
}

impl PoolState {
    fn leave_queue(&mut self, ticket: u64) {
        self.queue.retain(|t| *t != ticket);
    }
}

#[derive(Debug)]
pub(crate) struct PermitPool {
    capacity: u32,
    replenish: Replenish,
    max_wait: Option<Duration>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn TelemetrySink>,
    state: Mutex<PoolState>,
    wakeup: Condvar,
}

impl PermitPool {
    pub(crate) fn new(
        capacity: u32,
        replenish: Replenish,
        max_wait: Option<Duration>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn TelemetrySink>,
    ) -> Result<Self, RateLimitError> {
        if capacity == 0 {
            return Err(RateLimitError::invalid("capacity must be > 0 (got 0)"));
        }
        if let Replenish::Window { millis: 0 } = replenish {
            return Err(RateLimitError::invalid("window must be at least 1ms"));
        }
        if max_wait == Some(Duration::ZERO) {
            return Err(RateLimitError::invalid("max_wait must be > 0 when set"));
        }

        let window_started_at = clock.now_millis();
        Ok(Self {
            capacity,
            replenish,
            max_wait,
            clock,
            sink,
            state: Mutex::new(PoolState {
                available: capacity,
                in_flight: 0,
                window_started_at,
                queue: VecDeque::new(),
                next_ticket: 0,
            }),
            wakeup: Condvar::new(),
        })
    }

    pub(crate) fn capacity(&self) -> u32 {
        self.capacity
    }

    pub(crate) fn max_wait(&self) -> Option<Duration> {
        self.max_wait
    }

    pub(crate) fn available(&self) -> u32 {
        let mut state = self.lock();
        let refilled = self.refill(&mut state, self.clock.now_millis());
        let available = state.available;
        drop(state);
        if refilled {
            self.emit_replenished();
        }
        available
    }

    pub(crate) fn in_flight(&self) -> u32 {
        self.lock().in_flight
    }

    pub(crate) fn waiting(&self) -> usize {
        self.lock().queue.len()
    }

    /// Block until this caller's ticket reaches the head of the queue and a permit is free.
    pub(crate) fn acquire(
        self: &Arc<Self>,
        cancel: Option<&CancelToken>,
    ) -> Result<u32, RateLimitError> {
        if let Some(token) = cancel {
            let this: Arc<dyn Wake> = self.clone();
            token.register(Arc::downgrade(&this));
        }

        let mut state = self.lock();
        let started = self.clock.now_millis();
        let deadline = self.max_wait.map(|w| started.saturating_add(duration_millis(w)));

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.queue.push_back(ticket);

        loop {
            let now = self.clock.now_millis();
            if self.refill(&mut state, now) {
                drop(state);
                self.emit_replenished();
                state = self.lock();
                continue;
            }
            let waited = Duration::from_millis(now.saturating_sub(started));

            if cancel.is_some_and(CancelToken::is_cancelled) {
                state.leave_queue(ticket);
                drop(state);
                self.wakeup.notify_all();
                tracing::debug!(ticket, ?waited, "permit wait interrupted");
                self.emit(RateLimitEvent::Interrupted { waited });
                return Err(RateLimitError::Interrupted { waited });
            }

            if state.queue.front() == Some(&ticket) && state.available > 0 {
                state.queue.pop_front();
                state.available -= 1;
                state.in_flight += 1;
                let remaining = state.available;
                let has_waiters = !state.queue.is_empty();
                drop(state);
                if has_waiters {
                    self.wakeup.notify_all();
                }
                self.emit(RateLimitEvent::Acquired { remaining, waited });
                return Ok(remaining);
            }

            let mut park = MAX_PARK;
            if let Some(deadline) = deadline {
                if now >= deadline {
                    state.leave_queue(ticket);
                    drop(state);
                    self.wakeup.notify_all();
                    // `deadline` is only set when `max_wait` is.
                    let max_wait = self.max_wait.unwrap_or_default();
                    tracing::warn!(ticket, ?waited, ?max_wait, "permit wait timed out");
                    self.emit(RateLimitEvent::TimedOut { waited });
                    return Err(RateLimitError::Timeout { waited, max_wait });
                }
                park = park.min(Duration::from_millis(deadline - now));
            }
            if let Some(refill_in) = self.next_refill_in(&state, now) {
                park = park.min(refill_in);
            }

            state = self
                .wakeup
                .wait_timeout(state, park.max(Duration::from_millis(1)))
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Take a permit only if one is free and nobody is queued ahead.
    pub(crate) fn try_acquire(&self) -> Decision {
        let mut state = self.lock();
        let now = self.clock.now_millis();
        let refilled = self.refill(&mut state, now);

        if state.queue.is_empty() && state.available > 0 {
            state.available -= 1;
            state.in_flight += 1;
            let remaining = state.available;
            drop(state);
            if refilled {
                self.emit_replenished();
            }
            self.emit(RateLimitEvent::Acquired { remaining, waited: Duration::ZERO });
            return Decision::Allowed { remaining };
        }

        let (wait, reason) = match self.next_refill_in(&state, now) {
            Some(wait) if state.queue.is_empty() => (wait, "window_exhausted"),
            Some(wait) => (wait, "queued_waiters"),
            None if state.queue.is_empty() => (Duration::ZERO, "concurrency_limit"),
            None => (Duration::ZERO, "queued_waiters"),
        };
        drop(state);
        if refilled {
            self.emit_replenished();
        }
        self.emit(RateLimitEvent::Rejected { wait });
        Decision::Denied { wait, reason }
    }

    pub(crate) fn release(&self) {
        let mut state = self.lock();
        if state.in_flight == 0 {
            drop(state);
            tracing::warn!("release called with no permit held; ignoring");
            return;
        }
        state.in_flight -= 1;
        if self.replenish == Replenish::OnRelease {
            state.available = (state.available + 1).min(self.capacity);
        }
        let in_flight = state.in_flight;
        drop(state);
        self.wakeup.notify_all();
        self.emit(RateLimitEvent::Released { in_flight });
    }

    /// Roll the window forward if it has ended. Returns true when permits were restored;
    /// the caller emits `Replenished` once the lock is released.
    fn refill(&self, state: &mut PoolState, now: u64) -> bool {
        let Replenish::Window { millis } = self.replenish else {
            return false;
        };
        let elapsed = now.saturating_sub(state.window_started_at);
        if elapsed < millis {
            return false;
        }
        state.window_started_at += (elapsed / millis) * millis;
        if state.available == self.capacity {
            return false;
        }
        state.available = self.capacity;
        tracing::debug!(capacity = self.capacity, "window rolled over; pool refilled");
        true
    }

    fn next_refill_in(&self, state: &PoolState, now: u64) -> Option<Duration> {
        match self.replenish {
            Replenish::Window { millis } => {
                let ends_at = state.window_started_at.saturating_add(millis);
                Some(Duration::from_millis(ends_at.saturating_sub(now)))
            }
            Replenish::OnRelease => None,
        }
    }

    fn emit_replenished(&self) {
        self.emit(RateLimitEvent::Replenished { capacity: self.capacity });
    }

    fn emit(&self, event: RateLimitEvent) {
        self.sink.emit(PolicyEvent::RateLimit(event));
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Wake for PermitPool {
    fn wake(&self) {
        // Taking the lock orders this notify after any waiter's cancel check.
        let _state = self.lock();
        self.wakeup.notify_all();
    }
}

/// Whole milliseconds, rounded up so a partial millisecond never shortens a window.
pub(crate) fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

//! Cancellation for callers parked in a blocking permit wait.
//!
//! A [`CancelToken`] is cheap to clone; all clones observe the same flag. Limiters register
//! themselves as listeners while a caller holding the token is waiting, so `cancel()` wakes
//! the parked thread instead of leaving it asleep until its next timed re-check.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Something parked threads can be woken through.
pub(crate) trait Wake: Send + Sync {
    fn wake(&self);
}

struct CancelState {
    cancelled: AtomicBool,
    listeners: Mutex<Vec<Weak<dyn Wake>>>,
}

/// Shared cancellation flag.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<CancelState>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancelState {
                cancelled: AtomicBool::new(false),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Fire the token and wake every waiter parked on it. Idempotent.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let listeners: Vec<_> = {
            let mut guard = self.inner.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            guard.drain(..).collect()
        };
        for listener in listeners.iter().filter_map(Weak::upgrade) {
            listener.wake();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn register(&self, listener: Weak<dyn Wake>) {
        let mut guard = self.inner.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        guard.retain(|w| w.strong_count() > 0);
        if !guard.iter().any(|w| Weak::ptr_eq(w, &listener)) {
            guard.push(listener);
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken").field("cancelled", &self.is_cancelled()).finish()
    }
}

use serde_json::json;
use std::fmt;
use std::time::Duration;

/// Events emitted while gating and performing document submissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyEvent {
    /// Permit pool events
    RateLimit(RateLimitEvent),
    /// Outcome of one submit call
    Request(RequestOutcome),
}

/// Events emitted by rate limiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitEvent {
    /// A caller obtained a permit.
    Acquired {
        /// Permits left in the pool after this grant
        remaining: u32,
        /// Time spent queued before the grant
        waited: Duration,
    },
    /// A non-blocking acquire found no permit.
    Rejected {
        /// Time until a permit is expected, if known
        wait: Duration,
    },
    /// A caller gave its permit back.
    Released {
        /// Permits still held after this release
        in_flight: u32,
    },
    /// A new window began and the pool was refilled.
    Replenished {
        /// Pool size after the refill
        capacity: u32,
    },
    /// A waiter gave up after the configured maximum wait.
    TimedOut {
        /// Time spent queued
        waited: Duration,
    },
    /// A waiter was cancelled.
    Interrupted {
        /// Time spent queued
        waited: Duration,
    },
}

/// Request outcome events emitted by the document client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The endpoint answered and the body parsed.
    Success {
        /// HTTP status
        status: u16,
        /// Round-trip time, excluding the permit wait
        duration: Duration,
    },
    /// The call failed after a permit was obtained.
    Failure {
        /// Time taken before failure
        duration: Duration,
    },
}

impl fmt::Display for PolicyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyEvent::RateLimit(event) => write!(f, "RateLimit::{}", event),
            PolicyEvent::Request(event) => write!(f, "Request::{}", event),
        }
    }
}

impl fmt::Display for RateLimitEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitEvent::Acquired { remaining, waited } => {
                write!(f, "Acquired(remaining={}, waited={:?})", remaining, waited)
            }
            RateLimitEvent::Rejected { wait } => write!(f, "Rejected(wait={:?})", wait),
            RateLimitEvent::Released { in_flight } => write!(f, "Released(in_flight={})", in_flight),
            RateLimitEvent::Replenished { capacity } => {
                write!(f, "Replenished(capacity={})", capacity)
            }
            RateLimitEvent::TimedOut { waited } => write!(f, "TimedOut(waited={:?})", waited),
            RateLimitEvent::Interrupted { waited } => {
                write!(f, "Interrupted(waited={:?})", waited)
            }
        }
    }
}

impl fmt::Display for RequestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestOutcome::Success { status, duration } => {
                write!(f, "Success(status={}, duration={:?})", status, duration)
            }
            RequestOutcome::Failure { duration } => write!(f, "Failure(duration={:?})", duration),
        }
    }
}

#[inline]
fn clamp_u64(val: u128) -> u64 {
    val.min(u128::from(u64::MAX)) as u64
}

/// Convert a PolicyEvent into a JSON value for sinks.
pub fn event_to_json(event: &PolicyEvent) -> serde_json::Value {
    match event {
        PolicyEvent::RateLimit(r) => match r {
            RateLimitEvent::Acquired { remaining, waited } => json!({
                "kind": "permit_acquired",
                "remaining": *remaining,
                "waited_ms": clamp_u64(waited.as_millis()),
            }),
            RateLimitEvent::Rejected { wait } => json!({
                "kind": "permit_rejected",
                "wait_ms": clamp_u64(wait.as_millis()),
            }),
            RateLimitEvent::Released { in_flight } => {
                json!({ "kind": "permit_released", "in_flight": *in_flight })
            }
            RateLimitEvent::Replenished { capacity } => {
                json!({ "kind": "window_replenished", "capacity": *capacity })
            }
            RateLimitEvent::TimedOut { waited } => json!({
                "kind": "permit_timeout",
                "waited_ms": clamp_u64(waited.as_millis()),
            }),
            RateLimitEvent::Interrupted { waited } => json!({
                "kind": "permit_interrupted",
                "waited_ms": clamp_u64(waited.as_millis()),
            }),
        },
        PolicyEvent::Request(r) => match r {
            RequestOutcome::Success { status, duration } => json!({
                "kind": "request_success",
                "status": *status,
                "duration_ms": clamp_u64(duration.as_millis())
            }),
            RequestOutcome::Failure { duration } => json!({
                "kind": "request_failure",
                "duration_ms": clamp_u64(duration.as_millis())
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_policy_name() {
        let event = PolicyEvent::RateLimit(RateLimitEvent::Released { in_flight: 2 });
        assert_eq!(event.to_string(), "RateLimit::Released(in_flight=2)");

        let event = PolicyEvent::Request(RequestOutcome::Failure {
            duration: Duration::from_millis(3),
        });
        assert_eq!(event.to_string(), "Request::Failure(duration=3ms)");
    }

    #[test]
    fn acquired_json() {
        let v = event_to_json(&PolicyEvent::RateLimit(RateLimitEvent::Acquired {
            remaining: 4,
            waited: Duration::from_millis(120),
        }));
        assert_eq!(v["kind"], "permit_acquired");
        assert_eq!(v["remaining"], 4);
        assert_eq!(v["waited_ms"], 120);
    }

    #[test]
    fn replenished_json() {
        let v = event_to_json(&PolicyEvent::RateLimit(RateLimitEvent::Replenished {
            capacity: 10,
        }));
        assert_eq!(v["kind"], "window_replenished");
        assert_eq!(v["capacity"], 10);
    }

    #[test]
    fn request_success_json() {
        let v = event_to_json(&PolicyEvent::Request(RequestOutcome::Success {
            status: 201,
            duration: Duration::from_millis(42),
        }));
        assert_eq!(v["kind"], "request_success");
        assert_eq!(v["status"], 201);
        assert_eq!(v["duration_ms"], 42);
    }
}

//! Telemetry for the rate limiter and the document client.
//!
//! Limiters and the client emit structured [`PolicyEvent`]s into a [`TelemetrySink`].
//! Sinks are synchronous: emission happens on the caller's thread, so implementations must
//! be cheap and must never block on the limiter itself.
//!
//! - **Rate limit**: `Acquired`, `Rejected`, `Released`, `Replenished`, `TimedOut`,
//!   `Interrupted`
//! - **Request**: `Success`, `Failure`
//!
//! ```rust
//! use crpt_api::telemetry::{MemorySink, PolicyEvent, RequestOutcome, TelemetrySink};
//! use std::time::Duration;
//!
//! let sink = MemorySink::new();
//! sink.emit(PolicyEvent::Request(RequestOutcome::Success {
//!     status: 200,
//!     duration: Duration::from_millis(50),
//! }));
//! assert_eq!(sink.len(), 1);
//! ```

pub mod events;
pub mod sinks;

pub use events::{event_to_json, PolicyEvent, RateLimitEvent, RequestOutcome};
pub use sinks::{LogSink, MemorySink, NullSink, TelemetrySink};

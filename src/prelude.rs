//! Convenient re-exports for common crpt-api types.
pub use crate::{
    cancel::CancelToken,
    client::{CrptApi, CrptApiBuilder},
    error::{ApiError, RateLimitError},
    model::{Description, Document, Product},
    rate_limit::{ConcurrencyLimiter, FixedWindowLimiter, Permit, RateLimiter, Strategy},
    telemetry::{LogSink, MemorySink, NullSink, PolicyEvent, TelemetrySink},
};

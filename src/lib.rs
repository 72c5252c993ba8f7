#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # crpt-api
//!
//! Blocking client for the CRPT document-registration endpoint, gated by a client-side
//! rate limiter.
//!
//! ## Features
//!
//! - **Fixed-window rate limiting**: at most N requests per window, refilled on a timer
//! - **Concurrency limiting** as an opt-in alternative strategy
//! - **FIFO permit grants** with optional wait bound and cancellation
//! - **Guaranteed permit release** on every exit path via an RAII guard
//! - **Structured telemetry** through pluggable sinks and `tracing`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use crpt_api::{CrptApi, Document};
//! use std::time::Duration;
//!
//! let api = CrptApi::builder()
//!     .request_limit(10)
//!     .window(Duration::from_secs(1))
//!     .max_wait(Duration::from_secs(30))
//!     .build()?;
//!
//! let created = api.create_document(&Document::new().with_doc_id("doc-1"), "signature")?;
//! # Ok::<(), crpt_api::ApiError>(())
//! ```

pub mod cancel;
pub mod client;
pub mod clock;
pub mod error;
pub mod model;
pub mod prelude;
pub mod rate_limit;
pub mod telemetry;

// Re-exports
pub use cancel::CancelToken;
pub use client::{CrptApi, CrptApiBuilder, DEFAULT_ENDPOINT};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::{ApiError, RateLimitError};
pub use model::{Description, Document, Product, DEFAULT_DOC_TYPE};
pub use rate_limit::{
    ConcurrencyLimiter, Decision, FixedWindowLimiter, Permit, RateLimiter, RateLimiterBuilder,
    Strategy,
};

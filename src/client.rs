//! Blocking client for the document-creation endpoint.
//!
//! Semantics of one [`CrptApi::create_document`] call:
//! - The document is serialized before any permit is taken, so malformed input never
//!   consumes rate-limit budget.
//! - One permit is acquired (blocking, FIFO) and held for the whole HTTP exchange.
//! - The permit is released on every exit path, including remote, transport and parse errors.
//! - Nothing is retried.
//!
//! Example
//! ```rust,no_run
//! use crpt_api::{CrptApi, Document, Product};
//! use std::time::Duration;
//!
//! let api = CrptApi::new(Duration::from_secs(1), 10)?;
//! let document = Document::new()
//!     .with_doc_id("doc-1")
//!     .with_product(Product::new().with_tnved_code("6401"));
//! let created = api.create_document(&document, "signature")?;
//! println!("{:?}", created.doc_id);
//! # Ok::<(), crpt_api::ApiError>(())
//! ```

use crate::cancel::CancelToken;
use crate::error::ApiError;
use crate::model::Document;
use crate::rate_limit::{Permit, RateLimiter, RateLimiterBuilder, Strategy};
use crate::telemetry::{NullSink, PolicyEvent, RequestOutcome, TelemetrySink};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Production endpoint for document creation.
pub const DEFAULT_ENDPOINT: &str = "https://ismp.crpt.ru/api/v3/lk/documents/create";
/// Header carrying the caller's detached signature.
pub const SIGNATURE_HEADER: &str = "X-Signature";
/// Content type of the request body.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

const DEFAULT_REQUEST_LIMIT: u32 = 10;
const DEFAULT_WINDOW: Duration = Duration::from_secs(1);

/// Rate-limited client for the document-creation endpoint.
///
/// Clones share the limiter, so a clone handed to another thread draws from the same pool.
#[derive(Clone, Debug)]
pub struct CrptApi {
    endpoint: Url,
    http: HttpClient,
    limiter: Arc<dyn RateLimiter>,
    sink: Arc<dyn TelemetrySink>,
}

impl CrptApi {
    /// Allow `request_limit` calls per `window` against the production endpoint.
    pub fn new(window: Duration, request_limit: u32) -> Result<Self, ApiError> {
        Self::builder().window(window).request_limit(request_limit).build()
    }

    /// Construct a new builder with defaults.
    pub fn builder() -> CrptApiBuilder {
        CrptApiBuilder::new()
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// The limiter gating this client.
    pub fn limiter(&self) -> &dyn RateLimiter {
        self.limiter.as_ref()
    }

    /// Register `document`, signed with `signature`, and return the server's view of it.
    pub fn create_document(
        &self,
        document: &Document,
        signature: &str,
    ) -> Result<Document, ApiError> {
        self.submit(document, signature, None)
    }

    /// Like [`create_document`](Self::create_document), but the permit wait can be
    /// interrupted through `cancel`.
    pub fn create_document_with_cancel(
        &self,
        document: &Document,
        signature: &str,
        cancel: &CancelToken,
    ) -> Result<Document, ApiError> {
        self.submit(document, signature, Some(cancel))
    }

    fn submit(
        &self,
        document: &Document,
        signature: &str,
        cancel: Option<&CancelToken>,
    ) -> Result<Document, ApiError> {
        let payload = serde_json::to_vec(document)?;

        let _permit = Permit::acquire(self.limiter.as_ref(), cancel)?;
        let started = Instant::now();
        let result = self.post(payload, signature);
        let duration = started.elapsed();

        match &result {
            Ok((status, created)) => {
                tracing::debug!(%status, doc_id = ?created.doc_id, ?duration, "document created");
                self.sink.emit(PolicyEvent::Request(RequestOutcome::Success {
                    status: status.as_u16(),
                    duration,
                }));
            }
            Err(err) => {
                tracing::warn!(error = %err, ?duration, "document creation failed");
                self.sink.emit(PolicyEvent::Request(RequestOutcome::Failure { duration }));
            }
        }

        result.map(|(_, created)| created)
    }

    fn post(&self, payload: Vec<u8>, signature: &str) -> Result<(StatusCode, Document), ApiError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(SIGNATURE_HEADER, signature)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(payload)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text() {
                Ok(body) => body,
                Err(err) => {
                    tracing::warn!(%status, error = %err, "could not read error response body");
                    String::new()
                }
            };
            return Err(ApiError::Remote { status: status.as_u16(), body });
        }

        let body = response.text()?;
        if body.trim().is_empty() {
            return Err(ApiError::EmptyResponse { status: status.as_u16() });
        }

        Ok((status, serde_json::from_str(&body)?))
    }
}

/// Builder for [`CrptApi`].
#[derive(Debug)]
pub struct CrptApiBuilder {
    endpoint: String,
    request_limit: u32,
    strategy: Strategy,
    max_wait: Option<Duration>,
    request_timeout: Option<Duration>,
    http: Option<HttpClient>,
    limiter: Option<Arc<dyn RateLimiter>>,
    sink: Arc<dyn TelemetrySink>,
}

impl CrptApiBuilder {
    /// Production endpoint, 10 requests per one-second window, no wait bound.
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_limit: DEFAULT_REQUEST_LIMIT,
            strategy: Strategy::FixedWindow(DEFAULT_WINDOW),
            max_wait: None,
            request_timeout: None,
            http: None,
            limiter: None,
            sink: Arc::new(NullSink),
        }
    }

    /// Override the endpoint URL (validated at `build`).
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Permits per window (or concurrent permits for `Strategy::Concurrency`). Must be > 0.
    pub fn request_limit(mut self, limit: u32) -> Self {
        self.request_limit = limit;
        self
    }

    /// Length of the rate-limit window. Must be at least 1ms.
    pub fn window(mut self, window: Duration) -> Self {
        self.strategy = Strategy::FixedWindow(window);
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Fail with `Timeout` instead of waiting longer than this for a permit.
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    /// Whole-request timeout for the default HTTP client.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Provide a preconfigured HTTP client; `request_timeout` is then ignored.
    pub fn http_client(mut self, client: HttpClient) -> Self {
        self.http = Some(client);
        self
    }

    /// Use an existing limiter, e.g. one shared with other clients. Limiter settings on this
    /// builder are then ignored.
    pub fn limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Sink for limiter and request events.
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = sink;
        self
    }

    /// Build the client, validating inputs.
    pub fn build(self) -> Result<CrptApi, ApiError> {
        let endpoint = Url::parse(&self.endpoint)?;

        let limiter = match self.limiter {
            Some(limiter) => limiter,
            None => {
                let mut builder = RateLimiterBuilder::new(self.request_limit)
                    .strategy(self.strategy)
                    .with_sink(self.sink.clone());
                if let Some(max_wait) = self.max_wait {
                    builder = builder.max_wait(max_wait);
                }
                builder.build()?
            }
        };

        let http = match self.http {
            Some(http) => http,
            None => {
                let mut builder = HttpClient::builder();
                if let Some(timeout) = self.request_timeout {
                    builder = builder.timeout(timeout);
                }
                builder.build()?
            }
        };

        tracing::debug!(%endpoint, capacity = limiter.capacity(), "crpt client ready");
        Ok(CrptApi { endpoint, http, limiter, sink: self.sink })
    }
}

impl Default for CrptApiBuilder {
    fn default() -> Self {
        Self::new()
    }
}

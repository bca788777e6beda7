//! Transport abstraction
//!
//! The engine never constructs requests against the wire itself; it hands a
//! fully-described [`PreparedRequest`] to a [`Transport`]. The stock
//! implementation wraps reqwest with optional token-bucket pacing. Tests
//! inject their own transports.

use async_trait::async_trait;
use std::time::Duration;

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::error::{Error, Result};
use crate::request::{RequestBody, RequestOptions};
use crate::types::{HttpPage, Method};

/// One fully-described outgoing request
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Query params, headers and body
    pub options: RequestOptions,
}

impl PreparedRequest {
    /// Create a prepared request
    pub fn new(method: Method, url: impl Into<String>, options: RequestOptions) -> Self {
        Self {
            method,
            url: url.into(),
            options,
        }
    }
}

/// Sends prepared requests and returns fully-read pages.
///
/// Transport-level failures (connect, timeout, TLS) are errors; any
/// received response — whatever its status — is a page for the classifier.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and read the whole response
    async fn send(&self, request: &PreparedRequest) -> Result<HttpPage>;
}

// ============================================================================
// HTTP transport
// ============================================================================

/// Configuration for the reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Per-request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Token-bucket pacing, `None` to disable
    pub rate_limit: Option<RateLimiterConfig>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("rill-cdk/{}", env!("CARGO_PKG_VERSION")),
            rate_limit: None,
        }
    }
}

/// reqwest-backed transport with optional request pacing
pub struct HttpTransport {
    client: reqwest::Client,
    rate_limiter: Option<RateLimiter>,
}

impl HttpTransport {
    /// Create a transport with default configuration
    pub fn new() -> Self {
        Self::with_config(HttpTransportConfig::default())
    }

    /// Create a transport with custom configuration
    pub fn with_config(config: HttpTransportConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .expect("Failed to build HTTP client");

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Self {
            client,
            rate_limiter,
        }
    }

    /// Whether pacing is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &PreparedRequest) -> Result<HttpPage> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.wait().await;
        }

        let url = url::Url::parse(&request.url).map_err(Error::InvalidUrl)?;
        let mut req = self.client.request(request.method.into(), url);

        for (key, value) in &request.options.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        if !request.options.params.is_empty() {
            req = req.query(&request.options.params);
        }

        match &request.options.body {
            Some(RequestBody::Json(body)) => req = req.json(body),
            Some(RequestBody::Form(form)) => req = req.form(form),
            None => {}
        }

        let response = req.send().await.map_err(Error::Http)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let text = response.text().await.map_err(Error::Http)?;

        Ok(HttpPage::new(status, headers, text))
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

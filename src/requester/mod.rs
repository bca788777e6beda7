//! Paginated requesting
//!
//! The [`PaginatedRequester`] drives the request → classify → extract →
//! next-token cycle for one stream slice and exposes it as a lazy record
//! stream: each page's records yield before the next page is fetched, and
//! pages are never materialized beyond the one in hand.

mod rate_limit;
mod transport;

pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use transport::{HttpTransport, HttpTransportConfig, PreparedRequest, Transport};

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::auth::{Authenticator, NoAuth};
use crate::error::{Error, Result};
use crate::extract::{FieldPathExtractor, RecordExtractor};
use crate::handler::{DefaultErrorHandler, FailureType, Outcome, ResponseAction};
use crate::interpolate::{self, Context};
use crate::pagination::{NextPage, NoPaginator, PaginationState, Paginator};
use crate::partition::StreamSlice;
use crate::types::{HttpPage, Method, Record};

// ============================================================================
// Retry policy
// ============================================================================

/// Retry ceilings and the default backoff curve.
///
/// Crossing either ceiling converts a pending retry into a terminal
/// failure.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum retry attempts per request
    pub max_retries: u32,
    /// Maximum wall-clock time across one request's retry loop
    pub max_elapsed: Option<Duration>,
    /// Initial delay for the default exponential backoff
    pub initial_backoff: Duration,
    /// Cap for the default exponential backoff
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_elapsed: None,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// The fallback delay applied when no backoff strategy answered
    pub fn default_backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        std::cmp::min(self.initial_backoff.saturating_mul(factor), self.max_backoff)
    }
}

// ============================================================================
// Paginated requester
// ============================================================================

/// Orchestrates requests, classification, extraction and pagination for
/// one stream.
pub struct PaginatedRequester {
    stream_name: String,
    method: Method,
    url_base: String,
    path: String,
    transport: Arc<dyn Transport>,
    authenticator: Arc<dyn Authenticator>,
    options: crate::request::RequestOptionsProvider,
    extractor: Arc<dyn RecordExtractor>,
    paginator: Arc<dyn Paginator>,
    handler: DefaultErrorHandler,
    retry: RetryPolicy,
}

impl PaginatedRequester {
    /// Create a requester for a stream. Both `url_base` and `path` may be
    /// templates.
    pub fn new(
        stream_name: impl Into<String>,
        url_base: impl Into<String>,
        path: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            stream_name: stream_name.into(),
            method: Method::GET,
            url_base: url_base.into(),
            path: path.into(),
            transport,
            authenticator: Arc::new(NoAuth),
            options: crate::request::RequestOptionsProvider::new(),
            extractor: Arc::new(FieldPathExtractor::new()),
            paginator: Arc::new(NoPaginator),
            handler: DefaultErrorHandler::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// Set the HTTP method
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set the authenticator
    #[must_use]
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// Set the request options provider
    #[must_use]
    pub fn with_options(mut self, options: crate::request::RequestOptionsProvider) -> Self {
        self.options = options;
        self
    }

    /// Set the record extractor
    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn RecordExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Set the paginator
    #[must_use]
    pub fn with_paginator(mut self, paginator: Arc<dyn Paginator>) -> Self {
        self.paginator = paginator;
        self
    }

    /// Set the error handler
    #[must_use]
    pub fn with_handler(mut self, handler: DefaultErrorHandler) -> Self {
        self.handler = handler;
        self
    }

    /// Set the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The stream this requester feeds
    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    /// Lazily stream every record in the slice's scope.
    ///
    /// Pages are fetched one at a time; each page's records yield before
    /// the next request goes out. The stream is restartable only by
    /// calling this method again.
    pub fn records(
        &self,
        config: Value,
        stream_state: Value,
        slice: StreamSlice,
    ) -> BoxStream<'_, Result<Record>> {
        let state = PageLoopState {
            next: None,
            pagination: PaginationState::new(),
            started: false,
        };

        stream::try_unfold(
            (state, config, stream_state, slice),
            move |(mut state, config, stream_state, slice)| async move {
                if state.started && state.next.is_none() {
                    return Ok::<_, Error>(None);
                }

                let records = self
                    .run_one_page(&mut state, &config, &stream_state, &slice)
                    .await?;
                let records: Vec<Record> = records
                    .into_iter()
                    .map(|data| Record::new(data, self.stream_name.clone(), slice.clone()))
                    .collect();

                Ok(Some((records, (state, config, stream_state, slice))))
            },
        )
        .map_ok(|records| stream::iter(records.into_iter().map(Ok)))
        .try_flatten()
        .boxed()
    }

    /// Fetch and process one page, updating the loop state
    async fn run_one_page(
        &self,
        state: &mut PageLoopState,
        config: &Value,
        stream_state: &Value,
        slice: &StreamSlice,
    ) -> Result<Vec<Value>> {
        let mut ctx = Context::with_config(config.clone());
        ctx.set_stream_state(stream_state.clone());
        ctx.set_stream_slice(slice.to_value());
        if let Some(next) = &state.next {
            ctx.set_next_page_token(next.to_value());
        }

        let mut options = self.options.request_options(&ctx)?;
        // Auth wins a conflict with whatever the provider built.
        options.merge_over(
            self.authenticator.auth_params(),
            self.authenticator.auth_headers(),
        );

        let url = match &state.next {
            Some(NextPage::Url(url)) => url.clone(),
            _ => {
                let base = interpolate::eval_string(&self.url_base, &ctx)?;
                let path = interpolate::eval_string(&self.path, &ctx)?;
                join_url(&base, &path)
            }
        };

        match &state.next {
            None => self.paginator.initial_options(&state.pagination, &mut options),
            Some(NextPage::Token(token)) => match self.paginator.token_slot() {
                Some(slot) => slot.apply(token, &mut options),
                None => {
                    warn!(
                        stream = %self.stream_name,
                        "Paginator produced a token but declares no injection slot; stopping"
                    );
                    state.started = true;
                    state.next = None;
                    return Ok(Vec::new());
                }
            },
            Some(NextPage::Url(_)) => {}
        }

        state.started = true;
        let request = PreparedRequest::new(self.method, url, options);

        let Some(page) = self.send_with_retry(&request, config).await? else {
            // Classified IGNORE: an empty page, and pagination ends here.
            state.next = None;
            return Ok(Vec::new());
        };

        // An absent body short-circuits to exhaustion before extraction;
        // some APIs omit the final page's pagination metadata entirely.
        if page.is_empty_body() {
            debug!(stream = %self.stream_name, "Empty response body; treating as exhaustion");
            state.next = None;
            return Ok(Vec::new());
        }

        let records = self.extractor.extract(&page)?;
        state.next = self
            .paginator
            .next_page(&page, records.len(), &mut state.pagination);

        Ok(records)
    }

    /// Send one request, retrying transient outcomes within the policy's
    /// ceilings. `Ok(None)` is an IGNORE classification.
    async fn send_with_retry(
        &self,
        request: &PreparedRequest,
        config: &Value,
    ) -> Result<Option<HttpPage>> {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            let outcome = self.transport.send(request).await;
            let resolution = match &outcome {
                Ok(page) => self.handler.interpret(Outcome::Response(page), config),
                Err(err) => self.handler.interpret(Outcome::Exception(err), config),
            };

            match resolution.action {
                ResponseAction::Success => {
                    return match outcome {
                        Ok(page) => Ok(Some(page)),
                        // A filter cannot turn a transport failure into a page.
                        Err(err) => Err(err),
                    };
                }
                ResponseAction::Ignore => {
                    info!(
                        stream = %self.stream_name,
                        "Ignoring response for '{}': {}",
                        request.url,
                        resolution.error_message.as_deref().unwrap_or("matched ignore rule")
                    );
                    return Ok(None);
                }
                ResponseAction::Fail => {
                    let failure_type =
                        resolution.failure_type.unwrap_or(FailureType::SystemError);
                    let message = resolution
                        .error_message
                        .unwrap_or_else(|| format!("request to '{}' failed", request.url));
                    return Err(Error::failure(
                        failure_type,
                        format!("stream '{}': {message}", self.stream_name),
                    ));
                }
                ResponseAction::Retry => {
                    let message = resolution
                        .error_message
                        .clone()
                        .unwrap_or_else(|| format!("request to '{}' must be retried", request.url));

                    if attempt >= self.retry.max_retries {
                        return Err(Error::MaxRetriesExceeded {
                            max_retries: self.retry.max_retries,
                            message,
                        });
                    }
                    if let Some(max_elapsed) = self.retry.max_elapsed {
                        if started.elapsed() >= max_elapsed {
                            return Err(Error::MaxElapsedExceeded {
                                max_elapsed_secs: max_elapsed.as_secs(),
                                message,
                            });
                        }
                    }

                    let strategy_backoff = match &outcome {
                        Ok(page) => self.handler.backoff_time(Outcome::Response(page), attempt),
                        Err(err) => self.handler.backoff_time(Outcome::Exception(err), attempt),
                    };
                    let backoff = resolution
                        .retry_in
                        .or(strategy_backoff)
                        .unwrap_or_else(|| self.retry.default_backoff(attempt));

                    warn!(
                        stream = %self.stream_name,
                        "Attempt {}/{} failed ({message}); retrying in {:?}",
                        attempt + 1,
                        self.retry.max_retries + 1,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl std::fmt::Debug for PaginatedRequester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginatedRequester")
            .field("stream_name", &self.stream_name)
            .field("method", &self.method)
            .field("url_base", &self.url_base)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Loop state carried between pages
struct PageLoopState {
    next: Option<NextPage>,
    pagination: PaginationState,
    started: bool,
}

/// Join a base URL and path, passing absolute paths through untouched
fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    if base.is_empty() {
        return path.to_string();
    }
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    }
}

//! Declarative stream definitions
//!
//! A [`StreamDefinition`] is the serde-deserializable description of one
//! stream: requester, extractor, paginator, error handling, partitioning,
//! cursor, and auth. Every polymorphic component is a closed tagged union
//! resolved exactly once, at construction time, into the concrete engine
//! component it names.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{ApiKeyAuth, Authenticator, BasicAuth, BearerAuth};
use crate::datetime::BoundedDatetime;
use crate::engine::SyncEngine;
use crate::error::{Error, Result};
use crate::extract::{FieldPathExtractor, JsonlExtractor, RecordExtractor};
use crate::handler::{
    BackoffStrategy, ConstantBackoff, DefaultErrorHandler, ExponentialBackoff, FailureType,
    ResponseAction, ResponseFilter, WaitTimeFromHeader,
};
use crate::interpolate::{self, Context};
use crate::pagination::{
    CursorPaginator, LinkHeaderPaginator, NextUrlPaginator, NoPaginator, OffsetPaginator,
    PageNumberPaginator, Paginator,
};
use crate::partition::{
    DatetimeRouter, ListPartitionRouter, PartitionRouter, SinglePartitionRouter, SubstreamRouter,
};
use crate::requester::{PaginatedRequester, RetryPolicy, Transport};
use crate::state::{DatetimeCursor, StateManager};
use crate::types::{Method, OptionStringExt};

// ============================================================================
// Stream definition
// ============================================================================

/// Declarative description of one stream
#[derive(Debug, Clone, Deserialize)]
pub struct StreamDefinition {
    /// Stream name
    pub name: String,
    /// Base URL (template)
    pub url_base: String,
    /// Request path (template)
    #[serde(default)]
    pub path: String,
    /// HTTP method
    #[serde(default)]
    pub method: Method,
    /// Query parameter templates
    #[serde(default)]
    pub params: HashMap<String, String>,
    /// Header templates
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// JSON body template
    #[serde(default)]
    pub body_json: Option<Value>,
    /// Form body templates
    #[serde(default)]
    pub body_form: Option<HashMap<String, String>>,
    /// Record extractor
    #[serde(default)]
    pub extractor: ExtractorDef,
    /// Pagination strategy
    #[serde(default)]
    pub paginator: PaginatorDef,
    /// Partitioning strategy
    #[serde(default)]
    pub partitioning: PartitionDef,
    /// Response filters and backoff strategies
    #[serde(default)]
    pub error_handler: ErrorHandlerDef,
    /// Incremental cursor
    #[serde(default)]
    pub cursor: Option<CursorDef>,
    /// Authentication
    #[serde(default)]
    pub auth: Option<AuthDef>,
    /// Retry ceilings
    #[serde(default)]
    pub retry: RetryDef,
}

impl StreamDefinition {
    /// Parse a definition from YAML
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Parse a definition from a JSON value
    pub fn from_json_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Resolve this definition into a requester
    pub fn build_requester(
        &self,
        transport: Arc<dyn Transport>,
        config: &Value,
    ) -> Result<PaginatedRequester> {
        let mut options = crate::request::RequestOptionsProvider::new()
            .with_params(self.params.clone())
            .with_headers(self.headers.clone());
        if let Some(form) = &self.body_form {
            options = options.with_body_form(form.clone())?;
        }
        if let Some(body) = &self.body_json {
            options = options.with_body_json(body.clone())?;
        }

        let mut requester =
            PaginatedRequester::new(&self.name, &self.url_base, &self.path, transport)
                .with_method(self.method)
                .with_options(options)
                .with_extractor(self.extractor.build())
                .with_paginator(self.paginator.build())
                .with_handler(self.error_handler.build())
                .with_retry(self.retry.build());

        if let Some(auth) = &self.auth {
            requester = requester.with_authenticator(auth.build(config)?);
        }

        Ok(requester)
    }

    /// Resolve the whole definition into a sync engine.
    ///
    /// The partition router resolves against the current checkpoint, so
    /// date windows start where the previous sync left off. Substream
    /// partitioning needs the parent stream's records materialized first.
    pub async fn build_engine(
        &self,
        transport: Arc<dyn Transport>,
        state: StateManager,
        config: &Value,
        parent_records: Option<Vec<Value>>,
    ) -> Result<SyncEngine> {
        let requester = Arc::new(self.build_requester(transport, config)?);

        let mut ctx = Context::with_config(config.clone());
        ctx.set_stream_state(state.stream_value(&self.name).await);
        let router = self.partitioning.build(&ctx, parent_records)?;

        let mut engine = SyncEngine::new(requester, router, state);
        if let Some(cursor) = &self.cursor {
            engine = engine.with_cursor(cursor.build());
        }
        Ok(engine)
    }
}

// ============================================================================
// Extractor
// ============================================================================

/// Record extractor definition
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtractorDef {
    /// The whole body is the record set
    #[default]
    Root,
    /// Records live at a path in the body
    FieldPath {
        /// Dot path or JSONPath to the records
        path: String,
    },
    /// One JSON object per line
    Jsonl,
}

impl ExtractorDef {
    /// Resolve into an extractor
    pub fn build(&self) -> Arc<dyn RecordExtractor> {
        match self {
            ExtractorDef::Root => Arc::new(FieldPathExtractor::new()),
            ExtractorDef::FieldPath { path } => Arc::new(FieldPathExtractor::with_path(path)),
            ExtractorDef::Jsonl => Arc::new(JsonlExtractor::new()),
        }
    }
}

// ============================================================================
// Paginator
// ============================================================================

fn default_rel() -> String {
    "next".to_string()
}

/// Pagination strategy definition
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginatorDef {
    /// Single page
    #[default]
    None,
    /// Cursor extracted from the response body
    Cursor {
        /// Query parameter receiving the cursor
        cursor_param: String,
        /// Path to the cursor in the response
        cursor_path: String,
    },
    /// Offset and limit parameters
    Offset {
        /// Query parameter receiving the offset
        offset_param: String,
        /// Query parameter for the page size
        limit_param: String,
        /// Records per page
        limit: u64,
    },
    /// Page number parameter
    PageNumber {
        /// Query parameter receiving the page number
        page_param: String,
        /// First page number
        #[serde(default)]
        start_page: u64,
        /// Optional page size parameter
        #[serde(default)]
        page_size_param: Option<String>,
        /// Page size value
        #[serde(default)]
        page_size: Option<u64>,
    },
    /// RFC 5988 Link header
    LinkHeader {
        /// Rel value to follow
        #[serde(default = "default_rel")]
        rel: String,
    },
    /// Next URL in the response body
    NextUrl {
        /// Path to the URL in the response
        path: String,
    },
}

impl PaginatorDef {
    /// Resolve into a paginator
    pub fn build(&self) -> Arc<dyn Paginator> {
        match self {
            PaginatorDef::None => Arc::new(NoPaginator),
            PaginatorDef::Cursor {
                cursor_param,
                cursor_path,
            } => Arc::new(CursorPaginator::new(cursor_param, cursor_path)),
            PaginatorDef::Offset {
                offset_param,
                limit_param,
                limit,
            } => Arc::new(OffsetPaginator::new(offset_param, limit_param, *limit)),
            PaginatorDef::PageNumber {
                page_param,
                start_page,
                page_size_param,
                page_size,
            } => {
                let mut paginator = PageNumberPaginator::new(page_param, *start_page);
                if let (Some(param), Some(size)) = (page_size_param, page_size) {
                    paginator = paginator.with_page_size(param, *size);
                }
                Arc::new(paginator)
            }
            PaginatorDef::LinkHeader { rel } => Arc::new(LinkHeaderPaginator::new(rel)),
            PaginatorDef::NextUrl { path } => Arc::new(NextUrlPaginator::new(path)),
        }
    }
}

// ============================================================================
// Partitioning
// ============================================================================

/// Partitioning strategy definition
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PartitionDef {
    /// One slice for the whole stream
    #[default]
    Single,
    /// One slice per listed value
    List {
        /// The values
        values: Vec<String>,
        /// Slice field carrying the value
        partition_field: String,
    },
    /// One slice per datetime window
    Datetime {
        /// Window sequence start (template)
        start: String,
        /// Lower bound for the start (template), e.g. the state cursor
        #[serde(default)]
        min_start: Option<String>,
        /// Window sequence end (template)
        #[serde(default = "default_end")]
        end: String,
        /// Window width, e.g. "1d"
        #[serde(default = "default_step")]
        step: String,
        /// Datetime format for rendered bounds
        #[serde(default = "default_datetime_format")]
        format: String,
        /// Slice field for the window start
        #[serde(default = "default_start_field")]
        start_field: String,
        /// Slice field for the window end
        #[serde(default = "default_end_field")]
        end_field: String,
    },
    /// One slice per parent record
    Substream {
        /// Key extracted from parent records (dotted path)
        parent_key: String,
        /// Slice field carrying the key
        partition_field: String,
    },
}

fn default_end() -> String {
    "{{ now_utc() }}".to_string()
}

fn default_step() -> String {
    "1d".to_string()
}

fn default_datetime_format() -> String {
    "%Y-%m-%d".to_string()
}

fn default_start_field() -> String {
    "start".to_string()
}

fn default_end_field() -> String {
    "end".to_string()
}

impl PartitionDef {
    /// Resolve into a router. Substream partitioning requires the parent
    /// stream's records, materialized exactly once by the caller.
    pub fn build(
        &self,
        ctx: &Context,
        parent_records: Option<Vec<Value>>,
    ) -> Result<Arc<dyn PartitionRouter>> {
        match self {
            PartitionDef::Single => Ok(Arc::new(SinglePartitionRouter)),
            PartitionDef::List {
                values,
                partition_field,
            } => Ok(Arc::new(ListPartitionRouter::new(
                values.clone(),
                partition_field,
            ))),
            PartitionDef::Datetime {
                start,
                min_start,
                end,
                step,
                format,
                start_field,
                end_field,
            } => {
                let mut start_bound = BoundedDatetime::new(start);
                if let Some(min) = min_start {
                    start_bound = start_bound.with_min(min);
                }
                // The end never runs past "now" rendered in the same format.
                let end_bound = BoundedDatetime::new(end);
                let router = DatetimeRouter::from_bounds(
                    &start_bound,
                    &end_bound,
                    step,
                    format,
                    start_field,
                    end_field,
                    ctx,
                )?;
                Ok(Arc::new(router))
            }
            PartitionDef::Substream {
                parent_key,
                partition_field,
            } => {
                let records = parent_records.ok_or_else(|| {
                    Error::component(
                        "partitioning",
                        "substream partitioning requires materialized parent records",
                    )
                })?;
                Ok(Arc::new(SubstreamRouter::new(
                    records,
                    parent_key,
                    partition_field,
                )))
            }
        }
    }
}

// ============================================================================
// Error handling
// ============================================================================

/// Error handler definition: ordered filters plus backoff strategies
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorHandlerDef {
    /// Response filters, first match wins
    #[serde(default)]
    pub filters: Vec<FilterDef>,
    /// Backoff strategies, first non-null duration wins
    #[serde(default)]
    pub backoff: Vec<BackoffDef>,
}

impl ErrorHandlerDef {
    /// Resolve into a handler
    pub fn build(&self) -> DefaultErrorHandler {
        let mut handler = DefaultErrorHandler::new();
        for filter in &self.filters {
            handler = handler.with_filter(filter.build());
        }
        for backoff in &self.backoff {
            handler = handler.with_backoff(backoff.build());
        }
        handler
    }
}

/// One response filter definition
#[derive(Debug, Clone, Deserialize)]
pub struct FilterDef {
    /// Action when the filter matches
    pub action: ResponseAction,
    /// Status codes to match
    #[serde(default)]
    pub http_codes: Vec<u16>,
    /// Boolean predicate template over `response` / `headers`
    #[serde(default)]
    pub predicate: Option<String>,
    /// Substring matched against the parsed error message
    #[serde(default)]
    pub error_message_contains: Option<String>,
    /// Operator-facing message template
    #[serde(default)]
    pub error_message: Option<String>,
    /// Failure attribution override
    #[serde(default)]
    pub failure_type: Option<FailureType>,
}

impl FilterDef {
    /// Resolve into a filter
    pub fn build(&self) -> ResponseFilter {
        let mut filter =
            ResponseFilter::new(self.action).with_http_codes(self.http_codes.iter().copied());
        if let Some(predicate) = &self.predicate {
            filter = filter.with_predicate(predicate);
        }
        if let Some(needle) = &self.error_message_contains {
            filter = filter.with_error_message_contains(needle);
        }
        if let Some(message) = &self.error_message {
            filter = filter.with_error_message(message);
        }
        if let Some(failure_type) = self.failure_type {
            filter = filter.with_failure_type(failure_type);
        }
        filter
    }
}

/// One backoff strategy definition
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackoffDef {
    /// Fixed delay
    Constant {
        /// Delay in seconds
        seconds: f64,
    },
    /// Exponentially growing delay
    Exponential {
        /// Initial delay in milliseconds
        #[serde(default = "default_initial_ms")]
        initial_ms: u64,
        /// Delay cap in seconds
        #[serde(default = "default_max_secs")]
        max_secs: u64,
    },
    /// Delay read from a response header
    WaitTimeFromHeader {
        /// Header carrying the wait in seconds
        header: String,
    },
}

fn default_initial_ms() -> u64 {
    500
}

fn default_max_secs() -> u64 {
    60
}

impl BackoffDef {
    /// Resolve into a strategy
    pub fn build(&self) -> Box<dyn BackoffStrategy> {
        match self {
            BackoffDef::Constant { seconds } => {
                Box::new(ConstantBackoff::new(Duration::from_secs_f64(*seconds)))
            }
            BackoffDef::Exponential {
                initial_ms,
                max_secs,
            } => Box::new(ExponentialBackoff::new(
                Duration::from_millis(*initial_ms),
                Duration::from_secs(*max_secs),
            )),
            BackoffDef::WaitTimeFromHeader { header } => {
                Box::new(WaitTimeFromHeader::new(header))
            }
        }
    }
}

// ============================================================================
// Cursor
// ============================================================================

/// Incremental cursor definition
#[derive(Debug, Clone, Deserialize)]
pub struct CursorDef {
    /// Record attribute (dotted path) carrying the cursor value
    pub cursor_field: String,
    /// Datetime format of the cursor values
    #[serde(default)]
    pub format: Option<String>,
    /// Sync start template
    #[serde(default)]
    pub start: Option<String>,
}

impl CursorDef {
    /// Resolve into a cursor. The start is clamped by the checkpointed
    /// cursor, so a resumed sync never re-opens covered ground.
    pub fn build(&self) -> DatetimeCursor {
        let mut cursor = DatetimeCursor::new(&self.cursor_field);
        if let Some(format) = &self.format {
            cursor = cursor.with_format(format);
        }
        if let Some(start) = &self.start {
            let bound = BoundedDatetime::new(start)
                .with_min(format!("{{{{ stream_state.{} }}}}", self.cursor_field));
            cursor = cursor.with_start(bound);
        }
        cursor
    }
}

// ============================================================================
// Auth
// ============================================================================

/// Authentication definition. Value templates resolve against the
/// connector config at construction time.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthDef {
    /// API key in a header or query parameter
    ApiKey {
        /// Header or parameter name
        name: String,
        /// Key value (template)
        value: String,
        /// Send as query parameter instead of header
        #[serde(default)]
        in_query: bool,
    },
    /// Bearer token
    Bearer {
        /// Token value (template)
        token: String,
    },
    /// HTTP basic
    Basic {
        /// Username (template)
        username: String,
        /// Password (template)
        #[serde(default)]
        password: Option<String>,
    },
}

impl AuthDef {
    /// Resolve into an authenticator
    pub fn build(&self, config: &Value) -> Result<Arc<dyn Authenticator>> {
        let ctx = Context::with_config(config.clone());
        match self {
            AuthDef::ApiKey {
                name,
                value,
                in_query,
            } => {
                let value = interpolate::eval_string(value, &ctx)?;
                Ok(if *in_query {
                    Arc::new(ApiKeyAuth::query_param(name, value))
                } else {
                    Arc::new(ApiKeyAuth::header(name, value))
                })
            }
            AuthDef::Bearer { token } => {
                let token = interpolate::eval_string(token, &ctx)?;
                Ok(Arc::new(BearerAuth::new(token)))
            }
            AuthDef::Basic { username, password } => {
                let username = interpolate::eval_string(username, &ctx)?;
                // A password template over an absent config key renders
                // empty; treat that as no password.
                let password = match password {
                    Some(p) => interpolate::eval_string(p, &ctx)?.none_if_empty(),
                    None => None,
                };
                Ok(Arc::new(BasicAuth::new(username, password)))
            }
        }
    }
}

// ============================================================================
// Retry
// ============================================================================

/// Retry ceilings definition
#[derive(Debug, Clone, Deserialize)]
pub struct RetryDef {
    /// Maximum retry attempts per request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Wall-clock ceiling across one request's retries, in seconds
    #[serde(default)]
    pub max_elapsed_secs: Option<u64>,
    /// Initial delay of the default exponential backoff, in milliseconds
    #[serde(default = "default_backoff_initial_ms")]
    pub initial_backoff_ms: u64,
    /// Cap of the default exponential backoff, in seconds
    #[serde(default = "default_backoff_max_secs")]
    pub max_backoff_secs: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_initial_ms() -> u64 {
    100
}

fn default_backoff_max_secs() -> u64 {
    60
}

impl Default for RetryDef {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            max_elapsed_secs: None,
            initial_backoff_ms: default_backoff_initial_ms(),
            max_backoff_secs: default_backoff_max_secs(),
        }
    }
}

impl RetryDef {
    /// Resolve into a retry policy
    pub fn build(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            max_elapsed: self.max_elapsed_secs.map(Duration::from_secs),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_secs(self.max_backoff_secs),
        }
    }
}

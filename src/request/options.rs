//! Request options and their provider

use serde_json::Value;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::interpolate::{self, Context};

// ============================================================================
// Request options
// ============================================================================

/// Body of an outgoing request
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// JSON-encoded body
    Json(Value),
    /// URL-encoded form body
    Form(HashMap<String, String>),
}

/// Assembled options for one outgoing request.
///
/// Unset options are empty mappings, never a null sentinel, so callers
/// don't have to null-check.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    /// Query parameters
    pub params: HashMap<String, String>,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Request body, if any
    pub body: Option<RequestBody>,
}

impl RequestOptions {
    /// Create empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a query parameter
    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    /// Set a header
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(key.into(), value.into());
    }

    /// Merge another set of options in, the other side winning on conflict.
    ///
    /// Used to let an authenticator override whatever the provider built.
    pub fn merge_over(&mut self, params: HashMap<String, String>, headers: HashMap<String, String>) {
        self.params.extend(params);
        self.headers.extend(headers);
    }
}

// ============================================================================
// Injection slots
// ============================================================================

/// Where a computed value (e.g. a pagination token) lands in the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOptionSlot {
    /// A query parameter with the given name
    QueryParam(String),
    /// A header with the given name
    Header(String),
    /// A top-level field of a JSON body
    BodyJson(String),
    /// A field of a form body
    BodyForm(String),
}

impl RequestOptionSlot {
    /// Inject `value` into the slot, creating the body if needed
    pub fn apply(&self, value: &str, options: &mut RequestOptions) {
        match self {
            RequestOptionSlot::QueryParam(name) => {
                options.params.insert(name.clone(), value.to_string());
            }
            RequestOptionSlot::Header(name) => {
                options.headers.insert(name.clone(), value.to_string());
            }
            RequestOptionSlot::BodyJson(field) => {
                let body = match options.body.take() {
                    Some(RequestBody::Json(v)) => v,
                    _ => Value::Object(serde_json::Map::new()),
                };
                let mut map = match body {
                    Value::Object(map) => map,
                    other => {
                        let mut map = serde_json::Map::new();
                        map.insert("value".to_string(), other);
                        map
                    }
                };
                map.insert(field.clone(), Value::String(value.to_string()));
                options.body = Some(RequestBody::Json(Value::Object(map)));
            }
            RequestOptionSlot::BodyForm(field) => {
                let mut form = match options.body.take() {
                    Some(RequestBody::Form(f)) => f,
                    _ => HashMap::new(),
                };
                form.insert(field.clone(), value.to_string());
                options.body = Some(RequestBody::Form(form));
            }
        }
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Evaluates the four configured option mappings for each request.
///
/// At most one of the body forms may be configured; setting both is a
/// construction-time error.
#[derive(Debug, Clone, Default)]
pub struct RequestOptionsProvider {
    params: HashMap<String, String>,
    headers: HashMap<String, String>,
    body_form: Option<HashMap<String, String>>,
    body_json: Option<Value>,
}

impl RequestOptionsProvider {
    /// Create a provider with no configured options
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the query parameter templates
    #[must_use]
    pub fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    /// Configure the header templates
    #[must_use]
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Configure a form body. Errors if a JSON body is already configured.
    pub fn with_body_form(mut self, form: HashMap<String, String>) -> Result<Self> {
        if self.body_json.is_some() {
            return Err(Error::component(
                "request options",
                "both body_form and body_json are configured; pick one",
            ));
        }
        self.body_form = Some(form);
        Ok(self)
    }

    /// Configure a JSON body. Errors if a form body is already configured.
    pub fn with_body_json(mut self, body: Value) -> Result<Self> {
        if self.body_form.is_some() {
            return Err(Error::component(
                "request options",
                "both body_form and body_json are configured; pick one",
            ));
        }
        self.body_json = Some(body);
        Ok(self)
    }

    /// Evaluate every configured mapping against the context.
    ///
    /// Param and header values that interpolate to the empty string are
    /// omitted, so a template referencing absent state simply drops out.
    pub fn request_options(&self, ctx: &Context) -> Result<RequestOptions> {
        let mut options = RequestOptions::new();

        for (key, template) in &self.params {
            let rendered = interpolate::eval_string(template, ctx)?;
            if !rendered.is_empty() {
                options.params.insert(key.clone(), rendered);
            }
        }

        for (key, template) in &self.headers {
            let rendered = interpolate::eval_string(template, ctx)?;
            if !rendered.is_empty() {
                options.headers.insert(key.clone(), rendered);
            }
        }

        if let Some(form) = &self.body_form {
            let mut rendered_form = HashMap::new();
            for (key, template) in form {
                let rendered = interpolate::eval_string(template, ctx)?;
                if !rendered.is_empty() {
                    rendered_form.insert(key.clone(), rendered);
                }
            }
            options.body = Some(RequestBody::Form(rendered_form));
        } else if let Some(body) = &self.body_json {
            options.body = Some(RequestBody::Json(interpolate::render_value(body, ctx)?));
        }

        Ok(options)
    }
}

//! Error types for the Rill CDK
//!
//! This module defines the error hierarchy for the entire engine.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

use crate::handler::FailureType;

/// The main error type for the Rill CDK
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid {component} definition: {message}")]
    Component { component: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Interpolation Errors
    // ============================================================================
    #[error("Template error: {message}")]
    Template { message: String },

    #[error("Evaluated value has type {actual}, expected one of {expected}")]
    TypeCheck { expected: String, actual: String },

    // ============================================================================
    // Datetime Errors
    // ============================================================================
    #[error("Datetime error: {message}")]
    Datetime { message: String },

    // ============================================================================
    // Transport / Retry Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Max retries ({max_retries}) exceeded: {message}")]
    MaxRetriesExceeded { max_retries: u32, message: String },

    #[error("Retry budget of {max_elapsed_secs}s exhausted: {message}")]
    MaxElapsedExceeded {
        max_elapsed_secs: u64,
        message: String,
    },

    /// A request attempt was classified as a terminal failure.
    #[error("{failure_type}: {message}")]
    Failure {
        failure_type: FailureType,
        message: String,
    },

    // ============================================================================
    // Data Processing Errors
    // ============================================================================
    #[error("JSONPath error: {message}")]
    JsonPath { message: String },

    #[error("Failed to extract records from path '{path}': {message}")]
    RecordExtraction { path: String, message: String },

    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    // ============================================================================
    // State Errors
    // ============================================================================
    #[error("State error: {message}")]
    State { message: String },

    #[error("Checkpoint failed: {message}")]
    Checkpoint { message: String },

    // ============================================================================
    // Sync Errors
    // ============================================================================
    #[error("Partition error for stream '{stream}': {message}")]
    Partition { stream: String, message: String },

    #[error("Coordinator error: {message}")]
    Coordinator { message: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create a component construction error
    pub fn component(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a template error
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    /// Create a datetime error
    pub fn datetime(message: impl Into<String>) -> Self {
        Self::Datetime {
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a terminal failure with the given classification
    pub fn failure(failure_type: FailureType, message: impl Into<String>) -> Self {
        Self::Failure {
            failure_type,
            message: message.into(),
        }
    }

    /// Create a JSONPath error
    pub fn json_path(message: impl Into<String>) -> Self {
        Self::JsonPath {
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Create a partition error
    pub fn partition(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Partition {
            stream: stream.into(),
            message: message.into(),
        }
    }

    /// Create a coordinator error
    pub fn coordinator(message: impl Into<String>) -> Self {
        Self::Coordinator {
            message: message.into(),
        }
    }

    /// Check if this error represents a transient condition
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(_) | Error::Transport { .. } => true,
            Error::Failure { failure_type, .. } => {
                matches!(failure_type, FailureType::TransientError)
            }
            _ => false,
        }
    }
}

/// Result type alias for the Rill CDK
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

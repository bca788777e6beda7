//! # Rill Connector Development Kit
//!
//! A declarative execution engine for building HTTP data source connectors.
//! Describe a stream — requester, paginator, extractor, error handling,
//! partitioning, cursor — and the engine drives a correct, retryable,
//! resumable extraction of paginated API data into a record stream with
//! checkpointed state.
//!
//! ## Features
//!
//! - **Declarative streams**: describe an API in YAML, resolve once into
//!   concrete components
//! - **Smart pagination**: cursor, offset, page number, link header,
//!   next-URL strategies
//! - **Layered error handling**: user-declared response filters over a
//!   conservative default classification, with pluggable backoff
//! - **Incremental sync**: monotonic cursors and resumable checkpoints
//! - **Concurrent partitions**: bounded parallel slice execution with
//!   first-failure propagation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rill_cdk::config::StreamDefinition;
//! use rill_cdk::requester::HttpTransport;
//! use rill_cdk::state::StateManager;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> rill_cdk::Result<()> {
//!     let def = StreamDefinition::from_yaml(include_str!("charges.yaml"))?;
//!     let config = serde_json::json!({ "api_key": "sk_test_..." });
//!
//!     let engine = def
//!         .build_engine(
//!             Arc::new(HttpTransport::new()),
//!             StateManager::in_memory(),
//!             &config,
//!             None,
//!         )
//!         .await?;
//!
//!     let report = engine.sync(&config).await?;
//!     println!("{} records", report.stats.records_synced);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         SyncEngine                              │
//! │   router → slices → coordinator → per-slice pagination loop     │
//! └───────────────────────────────┬─────────────────────────────────┘
//!                                 │
//! ┌──────────┬───────────┬────────┴──────┬───────────┬─────────────┐
//! │   Auth   │ Requester │   Paginate    │ Partition │    State    │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ API Key  │ Classify  │ Cursor        │ Single    │ Monotonic   │
//! │ Bearer   │ Retry     │ Offset        │ List      │ cursors     │
//! │ Basic    │ Backoff   │ Page Number   │ Datetime  │ Checkpoints │
//! │          │ Rate Limit│ Link Header   │ Substream │ Resume      │
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the engine
pub mod error;

/// Common types and type aliases
pub mod types;

/// Template interpolation
pub mod interpolate;

/// Datetime parsing and bound clamping
pub mod datetime;

/// Response classification and backoff
pub mod handler;

/// Request option assembly
pub mod request;

/// Authentication providers
pub mod auth;

/// Record extraction
pub mod extract;

/// Pagination strategies
pub mod pagination;

/// Transport and the pagination loop
pub mod requester;

/// Stream partitioning
pub mod partition;

/// State management and checkpointing
pub mod state;

/// Concurrent partition execution
pub mod concurrent;

/// Main execution engine
pub mod engine;

/// Declarative stream definitions
pub mod config;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

pub use config::StreamDefinition;
pub use engine::{Message, SyncEngine, SyncReport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

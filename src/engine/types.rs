//! Engine types
//!
//! Message types, configuration, and statistics for the sync engine.

use serde_json::Value;

use crate::concurrent::DEFAULT_MAX_CONCURRENT_TASKS;
use crate::types::Record;

/// A message emitted during sync
#[derive(Debug, Clone)]
pub enum Message {
    /// One extracted record
    Record {
        /// The record
        record: Record,
    },
    /// State update
    State {
        /// Stream name
        stream: String,
        /// State data (cursor values)
        data: Value,
    },
    /// Log message
    Log {
        /// Log level
        level: LogLevel,
        /// Log message
        message: String,
    },
}

/// Log level for engine messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// General information
    Info,
    /// Warning
    Warn,
    /// Error (non-fatal)
    Error,
}

impl Message {
    /// Create a record message
    pub fn record(record: Record) -> Self {
        Self::Record { record }
    }

    /// Create a state message
    pub fn state(stream: impl Into<String>, data: Value) -> Self {
        Self::State {
            stream: stream.into(),
            data,
        }
    }

    /// Create a log message
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log {
            level,
            message: message.into(),
        }
    }

    /// Create an info log
    pub fn info(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Info, message)
    }

    /// Create a debug log
    pub fn debug(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Debug, message)
    }

    /// Create an error log
    pub fn error(message: impl Into<String>) -> Self {
        Self::log(LogLevel::Error, message)
    }

    /// Check if this is a record message
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record { .. })
    }

    /// Check if this is a state message
    pub fn is_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }

    /// Check if this is a log message
    pub fn is_log(&self) -> bool {
        matches!(self, Self::Log { .. })
    }
}

/// Configuration for a sync operation
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum partitions processed concurrently
    pub max_concurrent_partitions: usize,
    /// Abort the whole sync on the first partition failure
    pub fail_fast: bool,
    /// Checkpoint state after each completed partition
    pub checkpoint_per_partition: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            // The coordinator tolerates far more; syncs rarely should.
            max_concurrent_partitions: 10,
            fail_fast: true,
            checkpoint_per_partition: true,
        }
    }
}

impl SyncConfig {
    /// Create a new sync config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the partition concurrency (clamped to the coordinator maximum)
    #[must_use]
    pub fn with_max_concurrent_partitions(mut self, max: usize) -> Self {
        self.max_concurrent_partitions = max.clamp(1, DEFAULT_MAX_CONCURRENT_TASKS);
        self
    }

    /// Set fail fast mode
    #[must_use]
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Set per-partition checkpointing
    #[must_use]
    pub fn with_checkpoint_per_partition(mut self, checkpoint: bool) -> Self {
        self.checkpoint_per_partition = checkpoint;
        self
    }
}

/// Statistics from a sync operation
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Total records synced
    pub records_synced: usize,
    /// Partitions processed to completion
    pub partitions_synced: usize,
    /// Partitions skipped because a checkpoint already covered them
    pub partitions_skipped: usize,
    /// Partition errors tolerated (fail_fast off)
    pub errors: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

/// The outcome of one sync: the emitted messages plus roll-up statistics
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Every message emitted, in arrival order
    pub messages: Vec<Message>,
    /// Roll-up statistics
    pub stats: SyncStats,
}

impl SyncReport {
    /// The records in arrival order
    pub fn records(&self) -> Vec<&Record> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                Message::Record { record } => Some(record),
                _ => None,
            })
            .collect()
    }
}

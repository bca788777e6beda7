//! State manager
//!
//! Caches the live state behind an async lock, feeds cursor candidates
//! through the monotonic advance, and checkpoints through a pluggable
//! store. File persistence writes a temp file then renames, so a crashed
//! checkpoint never leaves a torn state file.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::types::{State, StreamState};
use crate::error::{Error, Result};

/// Consumes state snapshots at checkpoint boundaries
#[async_trait]
pub trait StateWriter: Send + Sync {
    /// Persist a snapshot
    async fn write(&self, state: &State) -> Result<()>;
}

/// Supplies the state for resumed syncs
#[async_trait]
pub trait StateReader: Send + Sync {
    /// Load the persisted state, or `None` when starting fresh
    async fn read(&self) -> Result<Option<State>>;
}

// ============================================================================
// File store
// ============================================================================

/// JSON-file-backed state store with atomic writes
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    /// Create a store at the given path
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StateWriter for FileStateStore {
    async fn write(&self, state: &State) -> Result<()> {
        let contents = serde_json::to_string_pretty(state).map_err(|e| Error::Checkpoint {
            message: format!("Failed to serialize state: {e}"),
        })?;

        // Write to temp file first, then rename for atomicity
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::Checkpoint {
                message: format!("Failed to write state file: {e}"),
            })?;

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::Checkpoint {
                message: format!("Failed to rename state file: {e}"),
            })?;

        Ok(())
    }
}

#[async_trait]
impl StateReader for FileStateStore {
    async fn read(&self) -> Result<Option<State>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::State {
                message: format!("Failed to read state file: {e}"),
            })?;

        let state: State = serde_json::from_str(&contents).map_err(|e| Error::State {
            message: format!("Failed to parse state file: {e}"),
        })?;

        Ok(Some(state))
    }
}

// ============================================================================
// Manager
// ============================================================================

/// Owns the live state for a sync
pub struct StateManager {
    /// Current state (cached)
    state: Arc<RwLock<State>>,
    /// Checkpoint sink, if persistence is configured
    store: Option<Arc<dyn StateWriter>>,
    /// Whether to checkpoint on every update
    auto_checkpoint: bool,
}

impl StateManager {
    /// Create an in-memory manager (no persistence)
    pub fn in_memory() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::new())),
            store: None,
            auto_checkpoint: false,
        }
    }

    /// Create a manager checkpointing to the given store
    pub fn with_store(store: Arc<dyn StateWriter>) -> Self {
        Self {
            state: Arc::new(RwLock::new(State::new())),
            store: Some(store),
            auto_checkpoint: true,
        }
    }

    /// Disable per-update checkpointing (checkpoint() still works)
    #[must_use]
    pub fn without_auto_checkpoint(mut self) -> Self {
        self.auto_checkpoint = false;
        self
    }

    /// Seed the manager from a reader, for resumed syncs
    pub async fn load_from(&self, reader: &dyn StateReader) -> Result<()> {
        if let Some(loaded) = reader.read().await? {
            let mut state = self.state.write().await;
            *state = loaded;
        }
        Ok(())
    }

    /// Seed the manager from an inline JSON string
    pub async fn load_json(&self, json: &str) -> Result<()> {
        let loaded: State = serde_json::from_str(json).map_err(|e| Error::State {
            message: format!("Failed to parse state JSON: {e}"),
        })?;
        let mut state = self.state.write().await;
        *state = loaded;
        Ok(())
    }

    /// Snapshot the current state
    pub async fn snapshot(&self) -> State {
        self.state.read().await.clone()
    }

    /// Render one stream's state for the interpolation context
    pub async fn stream_value(&self, stream: &str) -> Value {
        let state = self.state.read().await;
        state
            .get_stream(stream)
            .map_or_else(|| Value::Object(serde_json::Map::new()), StreamState::to_value)
    }

    /// Get a stream's cursor value for a field
    pub async fn cursor(&self, stream: &str, field: &str) -> Option<Value> {
        let state = self.state.read().await;
        state.get_stream(stream)?.cursor(field).cloned()
    }

    /// Offer a cursor candidate for a stream (and optionally one of its
    /// partitions). Stores it only when further along; returns whether the
    /// stream-level state advanced.
    pub async fn advance_cursor(
        &self,
        stream: &str,
        partition_id: Option<&str>,
        field: &str,
        candidate: Value,
    ) -> Result<bool> {
        let advanced = {
            let mut state = self.state.write().await;
            let stream_state = state.get_stream_mut(stream);
            if let Some(partition_id) = partition_id {
                stream_state
                    .get_partition_mut(partition_id)
                    .advance(field, candidate.clone());
            }
            stream_state.advance(field, candidate)
        };

        if advanced && self.auto_checkpoint {
            self.checkpoint().await?;
        }

        Ok(advanced)
    }

    /// Check if a partition is completed
    pub async fn is_partition_completed(&self, stream: &str, partition_id: &str) -> bool {
        let state = self.state.read().await;
        state
            .get_stream(stream)
            .is_some_and(|s| s.is_partition_completed(partition_id))
    }

    /// Mark a partition as completed
    pub async fn mark_partition_completed(&self, stream: &str, partition_id: &str) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state
                .get_stream_mut(stream)
                .mark_partition_completed(partition_id);
        }

        if self.auto_checkpoint {
            self.checkpoint().await?;
        }

        Ok(())
    }

    /// Persist the current state through the configured store
    pub async fn checkpoint(&self) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(()); // In-memory mode
        };
        let state = self.state.read().await;
        store.write(&state).await
    }

    /// Export state as JSON string
    pub async fn to_json(&self) -> Result<String> {
        let state = self.state.read().await;
        serde_json::to_string(&*state).map_err(|e| Error::State {
            message: format!("Failed to serialize state: {e}"),
        })
    }
}

impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            store: self.store.clone(),
            auto_checkpoint: self.auto_checkpoint,
        }
    }
}

impl std::fmt::Debug for StateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateManager")
            .field("has_store", &self.store.is_some())
            .field("auto_checkpoint", &self.auto_checkpoint)
            .finish_non_exhaustive()
    }
}

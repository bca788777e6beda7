//! Execution engine
//!
//! The top-level sync loop: enumerate slices from the router, submit each
//! to the concurrent coordinator, drive the pagination loop per slice,
//! feed extracted records through the cursor into state, and checkpoint
//! between partitions.

mod types;

pub use types::{LogLevel, Message, SyncConfig, SyncReport, SyncStats};

use futures::TryStreamExt;
use serde_json::Value;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::concurrent::{CoordinatorConfig, PartitionCoordinator};
use crate::error::{Error, Result};
use crate::partition::{PartitionRouter, StreamSlice};
use crate::requester::PaginatedRequester;
use crate::state::{DatetimeCursor, StateManager};

/// Orchestrates one stream's sync
pub struct SyncEngine {
    requester: Arc<PaginatedRequester>,
    router: Arc<dyn PartitionRouter>,
    cursor: Option<Arc<DatetimeCursor>>,
    state: StateManager,
    config: SyncConfig,
}

impl SyncEngine {
    /// Create an engine for a stream
    pub fn new(
        requester: Arc<PaginatedRequester>,
        router: Arc<dyn PartitionRouter>,
        state: StateManager,
    ) -> Self {
        Self {
            requester,
            router,
            cursor: None,
            state,
            config: SyncConfig::default(),
        }
    }

    /// Track incremental progress with the given cursor
    #[must_use]
    pub fn with_cursor(mut self, cursor: DatetimeCursor) -> Self {
        self.cursor = Some(Arc::new(cursor));
        self
    }

    /// Set the sync configuration
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// The state manager
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Run a full sync of the stream.
    ///
    /// Slices already marked completed in state are skipped, so a resumed
    /// sync re-reads only unfinished partitions. With `fail_fast` set the
    /// first partition failure aborts the sync; otherwise failures are
    /// reported as error messages and the remaining partitions continue.
    pub async fn sync(&self, config: &Value) -> Result<SyncReport> {
        let started = Instant::now();
        let stream_name = self.requester.stream_name().to_string();
        info!(stream = %stream_name, "Starting sync");

        let mut seen = HashSet::new();
        let mut slices = Vec::new();
        for slice in self.router.stream_slices()? {
            // Content-equal slices are one unit of work.
            if seen.insert(slice.clone()) {
                slices.push(slice);
            }
        }
        debug!(stream = %stream_name, "Enumerated {} slices", slices.len());

        let (coordinator, mut rx) = PartitionCoordinator::<Message>::new(CoordinatorConfig {
            max_concurrent_tasks: self.config.max_concurrent_partitions,
            ..Default::default()
        });

        let collector = tokio::spawn(async move {
            let mut messages = Vec::new();
            while let Some(message) = rx.recv().await {
                messages.push(message);
            }
            messages
        });

        let mut skipped = 0usize;
        for slice in slices {
            let slice_id = slice.id();
            if self.state.is_partition_completed(&stream_name, &slice_id).await {
                debug!(stream = %stream_name, "Skipping completed partition '{slice_id}'");
                skipped += 1;
                continue;
            }
            let work = self.partition_work(slice, config.clone(), coordinator.sender());
            coordinator.submit(work).await;
        }

        let outcome = coordinator.check_for_errors_and_shutdown().await;
        let mut messages = collector
            .await
            .map_err(|e| Error::coordinator(format!("output collector failed: {e}")))?;
        outcome?;

        let stats = SyncStats {
            records_synced: messages.iter().filter(|m| m.is_record()).count(),
            partitions_synced: messages.iter().filter(|m| m.is_state()).count(),
            partitions_skipped: skipped,
            errors: messages
                .iter()
                .filter(|m| matches!(m, Message::Log { level: LogLevel::Error, .. }))
                .count(),
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            stream = %stream_name,
            "Completed sync: {} records across {} partitions ({} skipped)",
            stats.records_synced,
            stats.partitions_synced,
            stats.partitions_skipped
        );
        messages.push(Message::info(format!(
            "Completed sync for {stream_name}: {} records across {} partitions",
            stats.records_synced, stats.partitions_synced
        )));

        Ok(SyncReport { messages, stats })
    }

    /// Build the self-contained future that processes one slice
    fn partition_work(
        &self,
        slice: StreamSlice,
        config: Value,
        tx: mpsc::Sender<Message>,
    ) -> impl Future<Output = Result<()>> + Send + 'static {
        let requester = Arc::clone(&self.requester);
        let cursor = self.cursor.clone();
        let state = self.state.clone();
        let fail_fast = self.config.fail_fast;
        let checkpoint = self.config.checkpoint_per_partition;

        async move {
            let stream_name = requester.stream_name().to_string();
            let slice_id = slice.id();

            let result = run_partition(
                &requester,
                cursor.as_deref(),
                &state,
                &slice,
                &slice_id,
                &stream_name,
                config,
                &tx,
                checkpoint,
            )
            .await;

            match result {
                Ok(count) => {
                    debug!(stream = %stream_name, "Partition '{slice_id}' done: {count} records");
                    Ok(())
                }
                Err(err) => {
                    let wrapped =
                        Error::partition(&stream_name, format!("partition '{slice_id}': {err}"));
                    if fail_fast {
                        Err(wrapped)
                    } else {
                        tx.send(Message::error(wrapped.to_string())).await.ok();
                        Ok(())
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("stream", &self.requester.stream_name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Drain one slice's record stream into the output channel, advancing
/// cursors as records arrive and checkpointing on completion.
#[allow(clippy::too_many_arguments)]
async fn run_partition(
    requester: &PaginatedRequester,
    cursor: Option<&DatetimeCursor>,
    state: &StateManager,
    slice: &StreamSlice,
    slice_id: &str,
    stream_name: &str,
    config: Value,
    tx: &mpsc::Sender<Message>,
    checkpoint: bool,
) -> Result<usize> {
    let stream_state = state.stream_value(stream_name).await;
    let mut records = requester.records(config, stream_state, slice.clone());

    let mut count = 0usize;
    while let Some(record) = records.try_next().await? {
        if let Some(cursor) = cursor {
            if let Some(value) = cursor.record_value(&record.data) {
                state
                    .advance_cursor(stream_name, Some(slice_id), cursor.cursor_field(), value)
                    .await?;
            }
        }
        if tx.send(Message::record(record)).await.is_err() {
            // Receiver hung up; nothing left to deliver to.
            break;
        }
        count += 1;
    }

    state.mark_partition_completed(stream_name, slice_id).await?;
    if checkpoint {
        state.checkpoint().await?;
    }
    tx.send(Message::state(
        stream_name,
        state.stream_value(stream_name).await,
    ))
    .await
    .ok();

    Ok(count)
}

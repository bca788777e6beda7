//! State management
//!
//! Handles cursor tracking, checkpointing, and resumability. Cursor values
//! only ever advance: a candidate replaces the stored value when the
//! type-aware comparison says it is further along. State is persisted
//! between sync runs through pluggable reader/writer stores.

mod cursor;
mod manager;
mod types;

pub use cursor::DatetimeCursor;
pub use manager::{FileStateStore, StateManager, StateReader, StateWriter};
pub use types::{compare_values, PartitionState, State, StreamState};

#[cfg(test)]
mod manager_tests;

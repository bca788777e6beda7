//! Stream partitioning
//!
//! A [`StreamSlice`] is one bounded unit of extraction work: a date window,
//! a parent-entity id, or the whole stream. Routers enumerate the finite
//! slice set for a sync; enumeration restarts only by calling
//! `stream_slices()` again. Slice equality and hashing are content-based so
//! concurrent deduplication and per-partition state maps behave.

mod routers;
mod types;

pub use routers::{
    parse_duration, DatetimeRouter, ListPartitionRouter, SinglePartitionRouter, SubstreamRouter,
};
pub use types::{PartitionRouter, StreamSlice};

#[cfg(test)]
mod tests;

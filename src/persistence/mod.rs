//! Persistence layer: PostgreSQL event log and ingest checkpoints.
//!
//! [`EventLog`] and [`CheckpointStore`] are the seams the rest of the
//! service talks through; the concrete implementations use `sqlx::PgPool`.
//! Tests substitute the in-memory stores from [`memory`].

pub mod checkpoint;
pub mod event_log;
pub mod models;
pub mod schema;

#[cfg(test)]
pub mod memory;

pub use checkpoint::{Checkpoint, CheckpointStore, PgCheckpointStore};
pub use event_log::{EventLog, EventQuery, PgEventLog};

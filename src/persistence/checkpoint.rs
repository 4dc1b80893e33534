//! Per-source resumable ingest state.
//!
//! The `state` column is opaque to the framework: each adapter serializes
//! and parses its own scalar or JSON. Upsert is the only write path; rows
//! are never deleted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::SourceId;
use crate::error::VigilError;

/// A checkpoint row for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    /// Opaque adapter state.
    pub state: Option<String>,
    /// When the row was last upserted.
    pub updated_at: DateTime<Utc>,
}

/// Store of per-source opaque resumable state.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Returns the checkpoint for a source, if one was ever written.
    async fn get(&self, source_id: SourceId) -> Result<Option<Checkpoint>, VigilError>;

    /// Inserts or replaces the checkpoint row, stamping `updated_at` now.
    async fn upsert(&self, source_id: SourceId, state: Option<&str>) -> Result<(), VigilError>;
}

/// PostgreSQL-backed checkpoint store.
#[derive(Debug, Clone)]
pub struct PgCheckpointStore {
    pool: PgPool,
}

impl PgCheckpointStore {
    /// Creates a new checkpoint store over the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckpointStore for PgCheckpointStore {
    async fn get(&self, source_id: SourceId) -> Result<Option<Checkpoint>, VigilError> {
        let row = sqlx::query_as::<_, (Option<String>, DateTime<Utc>)>(
            "SELECT state, updated_at FROM ingest_checkpoints WHERE source_id = $1",
        )
        .bind(source_id.as_i16())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(state, updated_at)| Checkpoint { state, updated_at }))
    }

    async fn upsert(&self, source_id: SourceId, state: Option<&str>) -> Result<(), VigilError> {
        sqlx::query(
            "INSERT INTO ingest_checkpoints (source_id, state, updated_at) \
             VALUES ($1, $2, now()) \
             ON CONFLICT (source_id) DO UPDATE \
             SET state = EXCLUDED.state, updated_at = EXCLUDED.updated_at",
        )
        .bind(source_id.as_i16())
        .bind(state)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

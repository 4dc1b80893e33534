//! Startup schema creation.

use sqlx::PgPool;

use crate::error::VigilError;

/// DDL for the two tables and the read-path indexes.
///
/// The three indexes serve the two list paths: `(fetched_at DESC)` for the
/// unfiltered list, and the composite indexes for kind- and source-filtered
/// lists, without full scans.
const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS events (
    id          UUID PRIMARY KEY,
    source      SMALLINT NOT NULL,
    kind        SMALLINT NOT NULL,
    title       TEXT NOT NULL,
    body        TEXT,
    fetched_at  TIMESTAMPTZ NOT NULL,
    occurred_at TIMESTAMPTZ,
    region_text TEXT,
    level       SMALLINT NOT NULL CHECK (level BETWEEN 1 AND 5),
    payload     JSONB
);

CREATE INDEX IF NOT EXISTS idx_events_fetched_at
    ON events (fetched_at DESC);
CREATE INDEX IF NOT EXISTS idx_events_kind_fetched_at
    ON events (kind, fetched_at DESC);
CREATE INDEX IF NOT EXISTS idx_events_source_fetched_at
    ON events (source, fetched_at DESC);

CREATE TABLE IF NOT EXISTS ingest_checkpoints (
    source_id  SMALLINT PRIMARY KEY,
    state      TEXT,
    updated_at TIMESTAMPTZ NOT NULL
);
";

/// Creates tables and indexes if they do not exist yet.
///
/// # Errors
///
/// Returns [`VigilError::Persistence`] on database failure.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), VigilError> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    tracing::debug!("database schema ensured");
    Ok(())
}

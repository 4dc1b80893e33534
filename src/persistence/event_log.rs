//! Append-only event log.
//!
//! Events are written exactly as materialized by the ingest worker and
//! never updated or deleted. `fetched_at` is the ordering key for both
//! read paths; ties are broken by `id`, which is itself time-ordered.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::models::{event_from_row, EventRow};
use crate::domain::{Event, EventId, EventKind, SourceId};
use crate::error::VigilError;

/// Maximum `limit` accepted by [`EventLog::list`].
pub const LIST_MAX_LIMIT: i64 = 200;

/// Default `limit` for [`EventLog::list`].
pub const LIST_DEFAULT_LIMIT: i64 = 50;

/// Default `limit` for [`EventLog::list_since`].
pub const SINCE_DEFAULT_LIMIT: i64 = 500;

/// Filters for the newest-first list read.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventQuery {
    /// Maximum rows to return; clamped to [`LIST_MAX_LIMIT`].
    pub limit: Option<i64>,
    /// Only events of this category.
    pub kind: Option<EventKind>,
    /// Only events from this source.
    pub source: Option<SourceId>,
}

/// Append-only persistent store of normalized events.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Atomically persists one row; the caller provides every field.
    ///
    /// # Errors
    ///
    /// Fails on I/O or constraint violation (duplicate id).
    async fn insert(&self, event: &Event) -> Result<(), VigilError>;

    /// Returns the event with the given id, if present.
    async fn get_by_id(&self, id: EventId) -> Result<Option<Event>, VigilError>;

    /// Newest-first read with optional ANDed filters.
    async fn list(&self, query: EventQuery) -> Result<Vec<Event>, VigilError>;

    /// Resumable ascending read: events with `fetched_at > since`, ordered
    /// `(fetched_at ASC, id ASC)`, capped at `limit`
    /// (default [`SINCE_DEFAULT_LIMIT`]).
    async fn list_since(
        &self,
        since: DateTime<Utc>,
        limit: Option<i64>,
    ) -> Result<Vec<Event>, VigilError>;
}

/// PostgreSQL-backed event log using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PgEventLog {
    pool: PgPool,
}

impl PgEventLog {
    /// Creates a new event log over the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const EVENT_COLUMNS: &str =
    "id, source, kind, title, body, fetched_at, occurred_at, region_text, level, payload";

#[async_trait]
impl EventLog for PgEventLog {
    async fn insert(&self, event: &Event) -> Result<(), VigilError> {
        sqlx::query(
            "INSERT INTO events \
             (id, source, kind, title, body, fetched_at, occurred_at, region_text, level, payload) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(event.id.as_uuid())
        .bind(event.source.as_i16())
        .bind(event.kind.as_i16())
        .bind(&event.title)
        .bind(&event.body)
        .bind(event.fetched_at)
        .bind(event.occurred_at)
        .bind(&event.region_text)
        .bind(event.level.as_i16())
        .bind(&event.payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_by_id(&self, id: EventId) -> Result<Option<Event>, VigilError> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");
        let row = sqlx::query_as::<_, EventRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(event_from_row).transpose()
    }

    async fn list(&self, query: EventQuery) -> Result<Vec<Event>, VigilError> {
        let limit = query
            .limit
            .unwrap_or(LIST_DEFAULT_LIMIT)
            .clamp(1, LIST_MAX_LIMIT);

        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE ($1::smallint IS NULL OR kind = $1) \
               AND ($2::smallint IS NULL OR source = $2) \
             ORDER BY fetched_at DESC \
             LIMIT $3"
        );
        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(query.kind.map(EventKind::as_i16))
            .bind(query.source.map(SourceId::as_i16))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(event_from_row).collect()
    }

    async fn list_since(
        &self,
        since: DateTime<Utc>,
        limit: Option<i64>,
    ) -> Result<Vec<Event>, VigilError> {
        let limit = limit.unwrap_or(SINCE_DEFAULT_LIMIT).max(1);

        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE fetched_at > $1 \
             ORDER BY fetched_at ASC, id ASC \
             LIMIT $2"
        );
        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(since)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(event_from_row).collect()
    }
}

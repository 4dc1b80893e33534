//! Wire DTOs for the query API and the SSE stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::Event;

/// An event as served to clients: the stored record verbatim, with the
/// enum tags in their numeric form and nullable fields emitted as JSON
/// nulls.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventDto {
    /// Time-ordered unique id; doubles as the SSE frame id.
    pub id: String,
    /// Source tag (see the source catalog).
    pub source: i16,
    /// Category tag.
    pub kind: i16,
    /// Single-line summary.
    pub title: String,
    /// Multi-line detail.
    pub body: Option<String>,
    /// Insertion timestamp; the ordering key.
    pub fetched_at: DateTime<Utc>,
    /// Real-world occurrence time.
    pub occurred_at: Option<DateTime<Utc>>,
    /// Free-text region label.
    pub region_text: Option<String>,
    /// Severity 1 (Info) to 5 (Critical).
    pub level: i16,
    /// Source-specific raw fields.
    pub payload: Option<serde_json::Value>,
}

impl From<Event> for EventDto {
    fn from(event: Event) -> Self {
        Self {
            id: event.id.to_string(),
            source: event.source.as_i16(),
            kind: event.kind.as_i16(),
            title: event.title,
            body: event.body,
            fetched_at: event.fetched_at,
            occurred_at: event.occurred_at,
            region_text: event.region_text,
            level: event.level.as_i16(),
            payload: event.payload,
        }
    }
}

/// Query parameters for `GET /events`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ListEventsParams {
    /// Maximum rows, 1–200. Defaults to 50.
    pub limit: Option<i64>,
    /// Category tag filter.
    pub kind: Option<i16>,
    /// Source tag filter.
    pub source: Option<i16>,
}

/// Query parameters for `GET /events/stream`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct StreamParams {
    /// Replay events fetched after this instant before going live.
    pub since: Option<DateTime<Utc>>,
}

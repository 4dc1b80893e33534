//! The normalized event record.
//!
//! [`NewEvent`] is what a source adapter emits: category, text, severity,
//! and optional occurrence metadata. The ingest worker turns it into an
//! [`Event`] by assigning the identifier, the producing source, and the
//! fetch timestamp. Events are immutable once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EventId, EventKind, Level, SourceId};

/// A fully materialized event row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Time-ordered unique identifier.
    pub id: EventId,
    /// Adapter that produced the event.
    pub source: SourceId,
    /// Event category.
    pub kind: EventKind,
    /// Single-line human-readable summary.
    pub title: String,
    /// Multi-line detail, when the source provides one.
    pub body: Option<String>,
    /// When the ingest worker fetched the event. Ordering key for reads.
    pub fetched_at: DateTime<Utc>,
    /// Real-world occurrence time (UTC), when the source provides one.
    pub occurred_at: Option<DateTime<Utc>>,
    /// Verbatim free-text region label.
    pub region_text: Option<String>,
    /// Severity on the 1..5 scale.
    pub level: Level,
    /// Source-specific raw fields for debugging and downstream use.
    pub payload: Option<serde_json::Value>,
}

/// An event draft as emitted by a source adapter.
///
/// No `id`, `source`, or `fetched_at` — those are assigned by the ingest
/// worker at insertion time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    /// Event category.
    pub kind: EventKind,
    /// Single-line human-readable summary.
    pub title: String,
    /// Multi-line detail.
    pub body: Option<String>,
    /// Real-world occurrence time (UTC).
    pub occurred_at: Option<DateTime<Utc>>,
    /// Verbatim free-text region label.
    pub region_text: Option<String>,
    /// Severity on the 1..5 scale.
    pub level: Level,
    /// Source-specific raw fields.
    pub payload: Option<serde_json::Value>,
}

impl NewEvent {
    /// Materializes the draft into a full [`Event`].
    #[must_use]
    pub fn materialize(self, source: SourceId, fetched_at: DateTime<Utc>) -> Event {
        Event {
            id: EventId::new(),
            source,
            kind: self.kind,
            title: self.title,
            body: self.body,
            fetched_at,
            occurred_at: self.occurred_at,
            region_text: self.region_text,
            level: self.level,
            payload: self.payload,
        }
    }
}

//! Row types for the `events` and `ingest_checkpoints` tables.

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{Event, EventId, EventKind, Level, SourceId};
use crate::error::VigilError;

/// Raw column tuple for an `events` row, in table order.
pub type EventRow = (
    Uuid,                  // id
    i16,                   // source
    i16,                   // kind
    String,                // title
    Option<String>,        // body
    DateTime<Utc>,         // fetched_at
    Option<DateTime<Utc>>, // occurred_at
    Option<String>,        // region_text
    i16,                   // level
    Option<Value>,         // payload
);

/// Decodes an [`EventRow`] into the domain [`Event`].
///
/// # Errors
///
/// Returns [`VigilError::Persistence`] when a stored enum tag is outside
/// the known range (schema drift).
pub fn event_from_row(row: EventRow) -> Result<Event, VigilError> {
    let (id, source, kind, title, body, fetched_at, occurred_at, region_text, level, payload) = row;
    Ok(Event {
        id: EventId::from_uuid(id),
        source: SourceId::try_from(source)
            .map_err(|tag| VigilError::Persistence(format!("unknown source tag {tag}")))?,
        kind: EventKind::try_from(kind)
            .map_err(|tag| VigilError::Persistence(format!("unknown kind tag {tag}")))?,
        title,
        body,
        fetched_at,
        occurred_at,
        region_text,
        level: Level::try_from(level)
            .map_err(|tag| VigilError::Persistence(format!("level {tag} out of range")))?,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> EventRow {
        (
            Uuid::now_v7(),
            SourceId::Sms.as_i16(),
            EventKind::HeavyRain.as_i16(),
            "row".to_string(),
            None,
            Utc::now(),
            None,
            None,
            Level::Moderate.as_i16(),
            None,
        )
    }

    #[test]
    fn decodes_known_tags() {
        let event = event_from_row(row());
        assert!(event.is_ok());
    }

    #[test]
    fn rejects_unknown_source_tag() {
        let mut bad = row();
        bad.1 = 42;
        assert!(event_from_row(bad).is_err());
    }

    #[test]
    fn rejects_out_of_range_level() {
        let mut bad = row();
        bad.8 = 9;
        assert!(event_from_row(bad).is_err());
    }
}

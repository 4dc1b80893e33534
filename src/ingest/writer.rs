//! Insert-then-announce write path.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::bus::EventBus;
use crate::domain::{Event, NewEvent, SourceId};
use crate::error::VigilError;
use crate::persistence::EventLog;

/// Writes events to the log and announces them on the bus.
///
/// The announce step is best-effort: a persisted event whose notification
/// was lost is still discovered by clients through the `since` catch-up,
/// so publish failures are logged and swallowed.
#[derive(Clone)]
pub struct EventWriter {
    event_log: Arc<dyn EventLog>,
    bus: Arc<dyn EventBus>,
}

impl EventWriter {
    /// Creates a writer over the given log and bus.
    #[must_use]
    pub fn new(event_log: Arc<dyn EventLog>, bus: Arc<dyn EventBus>) -> Self {
        Self { event_log, bus }
    }

    /// Materializes and persists one draft, then announces its id.
    ///
    /// # Errors
    ///
    /// Returns the insert error; announce failures never propagate.
    pub async fn append(
        &self,
        draft: NewEvent,
        source: SourceId,
        fetched_at: DateTime<Utc>,
    ) -> Result<Event, VigilError> {
        let event = draft.materialize(source, fetched_at);
        self.event_log.insert(&event).await?;

        if let Err(e) = self.bus.publish(event.id).await {
            tracing::warn!(event_id = %event.id, error = %e, "event persisted but announce failed");
        }

        Ok(event)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::bus::local::LocalBus;
    use crate::domain::{EventKind, Level};
    use crate::persistence::memory::MemoryEventLog;

    fn draft(title: &str) -> NewEvent {
        NewEvent {
            kind: EventKind::Fire,
            title: title.to_string(),
            body: None,
            occurred_at: None,
            region_text: None,
            level: Level::Severe,
            payload: None,
        }
    }

    #[tokio::test]
    async fn append_persists_and_returns_materialized_event() {
        let log = Arc::new(MemoryEventLog::new());
        let writer = EventWriter::new(log.clone(), Arc::new(LocalBus::new()));

        let fetched_at = Utc::now();
        let Ok(event) = writer.append(draft("fire"), SourceId::ForestFire, fetched_at).await else {
            panic!("append should succeed");
        };

        assert_eq!(event.source, SourceId::ForestFire);
        assert_eq!(event.fetched_at, fetched_at);
        let Ok(Some(stored)) = log.get_by_id(event.id).await else {
            panic!("event should be readable back");
        };
        assert_eq!(stored, event);
    }

    #[tokio::test]
    async fn insert_failure_propagates() {
        let log = Arc::new(MemoryEventLog::new());
        log.fail_on_title("boom");
        let writer = EventWriter::new(log.clone(), Arc::new(LocalBus::new()));

        let result = writer.append(draft("boom"), SourceId::Sms, Utc::now()).await;
        assert!(result.is_err());
        assert_eq!(log.len(), 0);
    }
}

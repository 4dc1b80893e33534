//! In-memory store substitutes for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::checkpoint::{Checkpoint, CheckpointStore};
use super::event_log::{EventLog, EventQuery, LIST_DEFAULT_LIMIT, LIST_MAX_LIMIT, SINCE_DEFAULT_LIMIT};
use crate::domain::{Event, EventId, SourceId};
use crate::error::VigilError;

/// Vec-backed [`EventLog`] with the same ordering semantics as Postgres.
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    events: Mutex<Vec<Event>>,
    /// Titles whose insert should fail, for checkpoint-guard tests.
    fail_titles: Mutex<HashSet<String>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes any insert of an event with this title fail.
    pub fn fail_on_title(&self, title: &str) {
        if let Ok(mut titles) = self.fail_titles.lock() {
            titles.insert(title.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    pub fn titles(&self) -> Vec<String> {
        self.events
            .lock()
            .map(|events| events.iter().map(|event| event.title.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventLog for MemoryEventLog {
    async fn insert(&self, event: &Event) -> Result<(), VigilError> {
        if self
            .fail_titles
            .lock()
            .is_ok_and(|titles| titles.contains(&event.title))
        {
            return Err(VigilError::Persistence("injected insert failure".to_string()));
        }
        let mut events = self
            .events
            .lock()
            .map_err(|_| VigilError::Internal("poisoned lock".to_string()))?;
        if events.iter().any(|existing| existing.id == event.id) {
            return Err(VigilError::Persistence("duplicate id".to_string()));
        }
        events.push(event.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: EventId) -> Result<Option<Event>, VigilError> {
        let events = self
            .events
            .lock()
            .map_err(|_| VigilError::Internal("poisoned lock".to_string()))?;
        Ok(events.iter().find(|event| event.id == id).cloned())
    }

    async fn list(&self, query: EventQuery) -> Result<Vec<Event>, VigilError> {
        let limit = query
            .limit
            .unwrap_or(LIST_DEFAULT_LIMIT)
            .clamp(1, LIST_MAX_LIMIT) as usize;
        let events = self
            .events
            .lock()
            .map_err(|_| VigilError::Internal("poisoned lock".to_string()))?;
        let mut matched: Vec<Event> = events
            .iter()
            .filter(|event| query.kind.is_none_or(|kind| event.kind == kind))
            .filter(|event| query.source.is_none_or(|source| event.source == source))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.fetched_at.cmp(&a.fetched_at).then(b.id.cmp(&a.id)));
        matched.truncate(limit);
        Ok(matched)
    }

    async fn list_since(
        &self,
        since: DateTime<Utc>,
        limit: Option<i64>,
    ) -> Result<Vec<Event>, VigilError> {
        let limit = limit.unwrap_or(SINCE_DEFAULT_LIMIT).max(1) as usize;
        let events = self
            .events
            .lock()
            .map_err(|_| VigilError::Internal("poisoned lock".to_string()))?;
        let mut matched: Vec<Event> = events
            .iter()
            .filter(|event| event.fetched_at > since)
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.fetched_at.cmp(&b.fetched_at).then(a.id.cmp(&b.id)));
        matched.truncate(limit);
        Ok(matched)
    }
}

/// HashMap-backed [`CheckpointStore`].
#[derive(Debug, Default)]
pub struct MemoryCheckpoints {
    rows: Mutex<HashMap<SourceId, Checkpoint>>,
}

impl MemoryCheckpoints {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpoints {
    async fn get(&self, source_id: SourceId) -> Result<Option<Checkpoint>, VigilError> {
        let rows = self
            .rows
            .lock()
            .map_err(|_| VigilError::Internal("poisoned lock".to_string()))?;
        Ok(rows.get(&source_id).cloned())
    }

    async fn upsert(&self, source_id: SourceId, state: Option<&str>) -> Result<(), VigilError> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| VigilError::Internal("poisoned lock".to_string()))?;
        rows.insert(
            source_id,
            Checkpoint {
                state: state.map(ToString::to_string),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{EventKind, Level, NewEvent};

    fn event_at(title: &str, fetched_at: DateTime<Utc>) -> Event {
        NewEvent {
            kind: EventKind::HeavyRain,
            title: title.to_string(),
            body: None,
            occurred_at: None,
            region_text: None,
            level: Level::Info,
            payload: None,
        }
        .materialize(SourceId::Sms, fetched_at)
    }

    #[tokio::test]
    async fn list_is_newest_first_and_capped() {
        let log = MemoryEventLog::new();
        let base = Utc::now();
        for offset in 0..5 {
            let event = event_at(&format!("e{offset}"), base + chrono::Duration::seconds(offset));
            let _ = log.insert(&event).await;
        }

        let Ok(listed) = log
            .list(EventQuery {
                limit: Some(3),
                ..EventQuery::default()
            })
            .await
        else {
            panic!("list failed");
        };
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].title, "e4");
        assert!(listed.windows(2).all(|w| w[0].fetched_at >= w[1].fetched_at));
    }

    #[tokio::test]
    async fn list_since_is_strictly_later_and_ascending() {
        let log = MemoryEventLog::new();
        let base = Utc::now();
        for offset in 0..4 {
            let event = event_at(&format!("e{offset}"), base + chrono::Duration::seconds(offset));
            let _ = log.insert(&event).await;
        }

        let Ok(listed) = log.list_since(base + chrono::Duration::seconds(1), None).await else {
            panic!("list_since failed");
        };
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].title, "e2");
        assert_eq!(listed[1].title, "e3");
    }

    #[tokio::test]
    async fn duplicate_id_insert_fails() {
        let log = MemoryEventLog::new();
        let event = event_at("dup", Utc::now());
        assert!(log.insert(&event).await.is_ok());
        assert!(log.insert(&event).await.is_err());
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn checkpoint_upsert_overwrites() {
        let store = MemoryCheckpoints::new();
        let _ = store.upsert(SourceId::Sms, Some("100")).await;
        let _ = store.upsert(SourceId::Sms, Some("101")).await;
        let Ok(Some(checkpoint)) = store.get(SourceId::Sms).await else {
            panic!("checkpoint missing");
        };
        assert_eq!(checkpoint.state.as_deref(), Some("101"));
    }
}

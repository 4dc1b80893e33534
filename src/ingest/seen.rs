//! Seen-set checkpoint state with TTL pruning.
//!
//! The third dedup pattern adapters use: the checkpoint stores a JSON
//! object `{"seen": {"<item id>": "<rfc3339 first-seen>"}}`. Each run
//! prunes entries older than the adapter's TTL and emits only ids that
//! are not in the set.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Seen-item ledger carried in an adapter's checkpoint state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeenSet {
    /// Item id → when it was first seen.
    pub seen: HashMap<String, DateTime<Utc>>,
}

impl SeenSet {
    /// Parses the stored state. Absent or malformed state yields an empty
    /// set, so a corrupted checkpoint degrades to re-emitting (at-least-once)
    /// rather than wedging the adapter.
    #[must_use]
    pub fn from_state(state: Option<&str>) -> Self {
        state
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }

    /// Serializes the set back into checkpoint state.
    #[must_use]
    pub fn to_state(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }

    /// Drops entries first seen more than `ttl` before `now`.
    pub fn prune(&mut self, ttl: Duration, now: DateTime<Utc>) {
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return;
        };
        self.seen.retain(|_, first_seen| now - *first_seen <= ttl);
    }

    /// Whether the item was already emitted.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains_key(id)
    }

    /// Records an item as emitted at `now`.
    pub fn insert(&mut self, id: impl Into<String>, now: DateTime<Utc>) {
        self.seen.insert(id.into(), now);
    }
}

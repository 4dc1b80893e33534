//! Cross-instance notification channel for freshly inserted event ids.
//!
//! A single logical channel carries `{"event_id":"<id>"}` messages from
//! whichever instance wrote an event to every instance's SSE hub. Delivery
//! is at-most-once and unpersisted; an instance that is down misses
//! notifications and its clients recover through the `since` catch-up.

pub mod redis;

#[cfg(test)]
pub mod local;

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::domain::EventId;
use crate::error::VigilError;

/// Channel name shared by all instances.
pub const CHANNEL: &str = "events:new";

/// Wire payload on [`CHANNEL`].
#[derive(Debug, Serialize, Deserialize)]
pub struct BusMessage {
    /// Id of the freshly inserted event.
    pub event_id: EventId,
}

/// Callback invoked for each received event id.
pub type BusHandler = Arc<dyn Fn(EventId) -> BoxFuture<'static, ()> + Send + Sync>;

/// Handle to an active subscription. Dropping it (or calling
/// [`BusSubscription::stop`]) cancels the receive loop.
#[derive(Debug)]
pub struct BusSubscription {
    task: tokio::task::JoinHandle<()>,
}

impl BusSubscription {
    /// Wraps the receive-loop task.
    #[must_use]
    pub fn new(task: tokio::task::JoinHandle<()>) -> Self {
        Self { task }
    }

    /// Cancels the subscription.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for BusSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Publish/subscribe bridge between instances.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Announces a freshly inserted event id to all instances.
    ///
    /// Best-effort: callers log failures at warn and never let them fail
    /// the enclosing insert.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::Bus`] when the announcement could not be sent.
    async fn publish(&self, event_id: EventId) -> Result<(), VigilError>;

    /// Starts delivering received event ids to `handler`. Malformed
    /// messages are dropped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::Bus`] when the subscription could not be
    /// established.
    async fn subscribe(&self, handler: BusHandler) -> Result<BusSubscription, VigilError>;
}

//! Redis pub/sub implementation of the event bus.
//!
//! Publishing goes through the shared connection pool; the subscription
//! holds its own dedicated connection, since a Redis connection in
//! subscriber mode cannot issue regular commands.

use deadpool_redis::redis::cmd;
use deadpool_redis::Pool;
use futures_util::StreamExt;

use async_trait::async_trait;

use super::{BusHandler, BusMessage, BusSubscription, EventBus, CHANNEL};
use crate::domain::EventId;
use crate::error::VigilError;

/// Redis-backed [`EventBus`].
#[derive(Clone)]
pub struct RedisEventBus {
    pool: Pool,
    /// Separate client for the dedicated subscriber connection.
    client: deadpool_redis::redis::Client,
}

impl RedisEventBus {
    /// Creates a bus over the shared pool plus a dedicated subscriber
    /// client for the same server.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::Bus`] when `redis_url` is not a valid Redis URL.
    pub fn new(pool: Pool, redis_url: &str) -> Result<Self, VigilError> {
        let client = deadpool_redis::redis::Client::open(redis_url)
            .map_err(|e| VigilError::Bus(format!("invalid redis url: {e}")))?;
        Ok(Self { pool, client })
    }
}

#[async_trait]
impl EventBus for RedisEventBus {
    async fn publish(&self, event_id: EventId) -> Result<(), VigilError> {
        let payload = serde_json::to_string(&BusMessage { event_id })
            .map_err(|e| VigilError::Bus(format!("encode bus message: {e}")))?;

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| VigilError::Bus(format!("redis connection: {e}")))?;

        cmd("PUBLISH")
            .arg(CHANNEL)
            .arg(payload)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| VigilError::Bus(format!("publish: {e}")))?;
        Ok(())
    }

    async fn subscribe(&self, handler: BusHandler) -> Result<BusSubscription, VigilError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| VigilError::Bus(format!("pubsub connection: {e}")))?;
        pubsub
            .subscribe(CHANNEL)
            .await
            .map_err(|e| VigilError::Bus(format!("subscribe {CHANNEL}: {e}")))?;

        let task = tokio::spawn(async move {
            let mut messages = pubsub.on_message();
            while let Some(message) = messages.next().await {
                let payload: String = match message.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!(error = %e, "bus message with non-text payload dropped");
                        continue;
                    }
                };
                match serde_json::from_str::<BusMessage>(&payload) {
                    Ok(message) => handler(message.event_id).await,
                    Err(e) => {
                        tracing::warn!(error = %e, payload, "malformed bus message dropped");
                    }
                }
            }
            tracing::debug!("bus subscription stream closed");
        });

        Ok(BusSubscription::new(task))
    }
}

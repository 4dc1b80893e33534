//! In-process bus substitute for tests.
//!
//! Backed by a `tokio::sync::broadcast` channel: every subscription sees
//! every publish, which is exactly the cross-instance fan-out shape the
//! Redis bus provides in production.

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{BusHandler, BusSubscription, EventBus};
use crate::domain::EventId;
use crate::error::VigilError;

/// Broadcast-channel [`EventBus`] for tests.
#[derive(Debug, Clone)]
pub struct LocalBus {
    sender: broadcast::Sender<EventId>,
}

impl LocalBus {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for LocalBus {
    async fn publish(&self, event_id: EventId) -> Result<(), VigilError> {
        // No receivers is fine; the message is simply lost, as on Redis.
        let _ = self.sender.send(event_id);
        Ok(())
    }

    async fn subscribe(&self, handler: BusHandler) -> Result<BusSubscription, VigilError> {
        let mut receiver = self.sender.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event_id) => handler(event_id).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "local bus receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(BusSubscription::new(task))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn delivered_to_every_subscription() {
        let bus = LocalBus::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();

        let _sub1 = bus
            .subscribe(Arc::new(move |id| {
                let tx = tx1.clone();
                Box::pin(async move {
                    let _ = tx.send(id);
                })
            }))
            .await;
        let _sub2 = bus
            .subscribe(Arc::new(move |id| {
                let tx = tx2.clone();
                Box::pin(async move {
                    let _ = tx.send(id);
                })
            }))
            .await;

        let id = EventId::new();
        let _ = bus.publish(id).await;

        assert_eq!(rx1.recv().await, Some(id));
        assert_eq!(rx2.recv().await, Some(id));
    }

    #[tokio::test]
    async fn stopped_subscription_receives_nothing() {
        let bus = LocalBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let Ok(sub) = bus
            .subscribe(Arc::new(move |id| {
                let tx = tx.clone();
                Box::pin(async move {
                    let _ = tx.send(id);
                })
            }))
            .await
        else {
            panic!("subscribe failed");
        };
        sub.stop();
        tokio::task::yield_now().await;

        let _ = bus.publish(EventId::new()).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }
}

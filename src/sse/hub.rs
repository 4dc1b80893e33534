//! Per-instance SSE hub.
//!
//! The hub subscribes once to the cross-instance event bus. Each bus
//! message names a freshly inserted event id; the hub reads the full row
//! from the event log and broadcasts it to every connected client through
//! a local `tokio::broadcast` channel. The channel is the subscriber set:
//! clients join by taking a receiver, and leave by dropping it when the
//! HTTP connection tears down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::bus::{BusSubscription, EventBus};
use crate::domain::{Event, EventId};
use crate::error::VigilError;
use crate::persistence::EventLog;

/// Ring-buffer capacity per instance; lagging clients are evicted.
const CHANNEL_CAPACITY: usize = 1024;

/// Fan-out hub for one instance's SSE clients.
pub struct SseHub {
    event_log: Arc<dyn EventLog>,
    bus: Arc<dyn EventBus>,
    sender: Mutex<broadcast::Sender<Event>>,
    started: AtomicBool,
    subscription: Mutex<Option<BusSubscription>>,
}

impl SseHub {
    /// Creates a hub over the given event log and bus. Call
    /// [`SseHub::start`] before serving clients.
    #[must_use]
    pub fn new(event_log: Arc<dyn EventLog>, bus: Arc<dyn EventBus>) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            event_log,
            bus,
            sender: Mutex::new(sender),
            started: AtomicBool::new(false),
            subscription: Mutex::new(None),
        }
    }

    /// Subscribes to the event bus. Idempotent; a second call while
    /// started is a no-op. On subscribe failure the started flag is
    /// reset so a later call can retry.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::Bus`] when the bus subscription fails.
    pub async fn start(&self) -> Result<(), VigilError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let event_log = Arc::clone(&self.event_log);
        let sender = self.sender();
        let handler: crate::bus::BusHandler = Arc::new(move |event_id| {
            let event_log = Arc::clone(&event_log);
            let sender = sender.clone();
            Box::pin(async move {
                Self::on_bus_message(&*event_log, &sender, event_id).await;
            })
        });

        match self.bus.subscribe(handler).await {
            Ok(subscription) => {
                if let Ok(mut slot) = self.subscription.lock() {
                    *slot = Some(subscription);
                }
                tracing::info!("sse hub subscribed to event bus");
                Ok(())
            }
            Err(e) => {
                self.started.store(false, Ordering::SeqCst);
                tracing::error!(error = %e, "sse hub could not subscribe to event bus");
                Err(e)
            }
        }
    }

    /// Unsubscribes from the bus and disconnects every client: replacing
    /// the channel drops the old sender, so all receivers see `Closed`.
    pub fn stop(&self) {
        if let Ok(mut slot) = self.subscription.lock() {
            if let Some(subscription) = slot.take() {
                subscription.stop();
            }
        }
        let (fresh, _) = broadcast::channel(CHANNEL_CAPACITY);
        if let Ok(mut sender) = self.sender.lock() {
            *sender = fresh;
        }
        self.started.store(false, Ordering::SeqCst);
        tracing::info!("sse hub stopped");
    }

    /// Adds a client, returning its live-event receiver. The client
    /// leaves the subscriber set by dropping the receiver.
    #[must_use]
    pub fn add_client(&self) -> broadcast::Receiver<Event> {
        self.sender().subscribe()
    }

    /// Events a reconnecting client missed: everything after `since`,
    /// ascending. No-op without `since`.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::Persistence`] when the log read fails.
    pub async fn catch_up(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Event>, VigilError> {
        match since {
            Some(since) => self.event_log.list_since(since, None).await,
            None => Ok(Vec::new()),
        }
    }

    /// Number of currently connected clients.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender().receiver_count()
    }

    fn sender(&self) -> broadcast::Sender<Event> {
        self.sender
            .lock()
            .map(|sender| sender.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// One bus message: look the event up and broadcast it.
    async fn on_bus_message(
        event_log: &dyn EventLog,
        sender: &broadcast::Sender<Event>,
        event_id: EventId,
    ) {
        match event_log.get_by_id(event_id).await {
            Ok(Some(event)) => {
                // No receivers is fine; send only fails when nobody listens.
                let _ = sender.send(event);
            }
            Ok(None) => {
                // Likely a replica read racing the writer; the client's
                // next catch-up will pick the event up.
                tracing::warn!(%event_id, "announced event not found in log, dropped");
            }
            Err(e) => {
                tracing::error!(%event_id, error = %e, "event lookup failed on bus message");
            }
        }
    }
}

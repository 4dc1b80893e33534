//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::persistence::EventLog;
use crate::sse::SseHub;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Append-only event log for the query API.
    pub event_log: Arc<dyn EventLog>,
    /// Per-instance SSE hub for the stream endpoint.
    pub hub: Arc<SseHub>,
}

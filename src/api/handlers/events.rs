//! Event read handlers: the filtered list and the SSE stream.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::stream::{self, Stream, StreamExt};
use tokio::sync::broadcast;

use crate::api::dto::{EventDto, ListEventsParams, StreamParams};
use crate::app_state::AppState;
use crate::domain::{Event, EventKind, SourceId};
use crate::error::{ErrorResponse, VigilError};
use crate::persistence::event_log::{EventQuery, LIST_MAX_LIMIT};

/// Keep-alive period on open SSE connections.
const PING_INTERVAL: Duration = Duration::from_secs(15);

/// `GET /events` — newest-first event list with optional filters.
///
/// # Errors
///
/// Returns [`VigilError::InvalidRequest`] on an out-of-range limit or an
/// unknown kind/source tag.
#[utoipa::path(
    get,
    path = "/events",
    tag = "Events",
    summary = "List recent events",
    description = "Returns events ordered by fetch time, newest first. `kind` and `source` filters are ANDed; an absent filter matches everything.",
    params(ListEventsParams),
    responses(
        (status = 200, description = "Matching events", body = Vec<EventDto>),
        (status = 400, description = "Invalid filter or limit", body = ErrorResponse),
    )
)]
pub async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<ListEventsParams>,
) -> Result<impl IntoResponse, VigilError> {
    let query = validate_params(&params)?;
    let events = state.event_log.list(query).await?;
    let dtos: Vec<EventDto> = events.into_iter().map(EventDto::from).collect();
    Ok(Json(dtos))
}

/// `GET /events/stream` — SSE stream: catch-up frames, then live events,
/// with a `ping` keep-alive every 15 seconds.
///
/// # Errors
///
/// Returns [`VigilError::Persistence`] when the catch-up read fails.
#[utoipa::path(
    get,
    path = "/events/stream",
    tag = "Events",
    summary = "Stream events over SSE",
    description = "Opens a server-sent-events stream. With `since`, missed events are replayed in ascending fetch order before live delivery begins. Clients should dedupe frames by event id.",
    params(StreamParams),
    responses(
        (status = 200, description = "Event stream", content_type = "text/event-stream"),
    )
)]
pub async fn stream_events(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, VigilError> {
    // Join the live set first: an event landing during catch-up is then
    // delivered twice rather than lost, and clients dedupe by frame id.
    let receiver = state.hub.add_client();
    let caught_up = state.hub.catch_up(params.since).await?;
    tracing::debug!(catch_up = caught_up.len(), "sse client connected");

    let catch_up_stream = stream::iter(caught_up).map(event_frame);
    // A `None` sentinel after the live stream ends (client evicted or hub
    // stopped) terminates the merged stream, pings included, so the
    // connection closes instead of idling on keep-alives.
    let live = live_stream(receiver)
        .map(Some)
        .chain(stream::once(std::future::ready(None)));
    let pings = ping_stream().map(Some);
    let merged = stream::select(live, pings)
        .take_while(|frame| std::future::ready(frame.is_some()))
        .filter_map(std::future::ready);

    let stream = catch_up_stream.chain(merged).map(Ok::<SseEvent, Infallible>);
    Ok(Sse::new(stream))
}

/// Validates list parameters into a log query.
fn validate_params(params: &ListEventsParams) -> Result<EventQuery, VigilError> {
    if let Some(limit) = params.limit {
        if limit < 1 || limit > LIST_MAX_LIMIT {
            return Err(VigilError::InvalidRequest(format!(
                "limit must be between 1 and {LIST_MAX_LIMIT}"
            )));
        }
    }
    let kind = params
        .kind
        .map(|tag| {
            EventKind::try_from(tag)
                .map_err(|tag| VigilError::InvalidRequest(format!("unknown kind {tag}")))
        })
        .transpose()?;
    let source = params
        .source
        .map(|tag| {
            SourceId::try_from(tag)
                .map_err(|tag| VigilError::InvalidRequest(format!("unknown source {tag}")))
        })
        .transpose()?;

    Ok(EventQuery {
        limit: params.limit,
        kind,
        source,
    })
}

/// One event as an SSE frame: the id doubles as the frame id for client
/// dedup, the data is the DTO JSON.
fn event_frame(event: Event) -> SseEvent {
    let dto = EventDto::from(event);
    let frame = SseEvent::default().id(dto.id.clone());
    match serde_json::to_string(&dto) {
        Ok(json) => frame.data(json),
        Err(e) => {
            tracing::error!(error = %e, "event dto serialization failed");
            frame.data("{}")
        }
    }
}

/// Live events from the hub's broadcast channel. Lagged receivers log and
/// continue; a closed channel (hub stop) ends the stream.
fn live_stream(receiver: broadcast::Receiver<Event>) -> impl Stream<Item = SseEvent> {
    stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => return Some((event_frame(event), receiver)),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "sse client lagged behind broadcast");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
}

/// `event: ping` / `data: keep-alive` every [`PING_INTERVAL`].
fn ping_stream() -> impl Stream<Item = SseEvent> {
    let mut ticker = tokio::time::interval(PING_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    stream::unfold(ticker, |mut ticker| async move {
        // The first tick fires immediately; every frame after that waits
        // the full period.
        ticker.tick().await;
        Some((SseEvent::default().event("ping").data("keep-alive"), ticker))
    })
    .skip(1)
}

/// Event routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events))
        .route("/events/stream", get(stream_events))
}

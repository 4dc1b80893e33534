//! HTTP API layer: route handlers, DTOs, and router composition.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::app_state::AppState;

/// OpenAPI documentation for the vigil query API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "vigil",
        version = "0.1.0",
        description = "Disaster event aggregation and streaming service. Polls public safety feeds, persists an append-only event log, and fans events out over SSE.",
        license(name = "MIT"),
    ),
    tags(
        (name = "System", description = "Liveness and health"),
        (name = "Events", description = "Event list and SSE stream"),
    ),
    paths(
        handlers::system::root_handler,
        handlers::system::ping_handler,
        handlers::events::list_events,
        handlers::events::stream_events,
    ),
    components(schemas(
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
        dto::EventDto,
        handlers::system::PingResponse,
    ))
)]
#[derive(Debug)]
pub struct ApiDoc;

/// Builds the complete router. When `swagger` is set, the OpenAPI JSON is
/// served at `/api/docs` and the UI at `/api-docs`.
pub fn build_router(swagger: bool) -> Router<AppState> {
    let router = Router::new().merge(handlers::routes());
    if swagger {
        router.merge(SwaggerUi::new("/api-docs").url("/api/docs", ApiDoc::openapi()))
    } else {
        router
    }
}

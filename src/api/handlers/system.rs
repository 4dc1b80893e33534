//! System endpoints: liveness probe and health ping.

use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Health ping response.
#[derive(Debug, Serialize, ToSchema)]
pub struct PingResponse {
    /// Always true when the process serves requests.
    pub ok: bool,
    /// Server time in epoch milliseconds.
    pub timestamp: i64,
}

/// `GET /` — plain-text liveness probe.
#[utoipa::path(
    get,
    path = "/",
    tag = "System",
    summary = "Liveness probe",
    responses(
        (status = 200, description = "Service is up", content_type = "text/plain"),
    )
)]
pub async fn root_handler() -> impl IntoResponse {
    "Running"
}

/// `GET /api/health/ping` — health check with server time.
#[utoipa::path(
    get,
    path = "/api/health/ping",
    tag = "System",
    summary = "Health check",
    responses(
        (status = 200, description = "Service is healthy", body = PingResponse),
    )
)]
pub async fn ping_handler() -> impl IntoResponse {
    Json(PingResponse {
        ok: true,
        timestamp: Utc::now().timestamp_millis(),
    })
}

/// System routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root_handler))
        .route("/api/health/ping", get(ping_handler))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_response_shape() {
        let response = PingResponse {
            ok: true,
            timestamp: 1_735_075_200_000,
        };
        let json = serde_json::to_value(&response).unwrap_or_default();
        assert_eq!(json["ok"], serde_json::json!(true));
        assert_eq!(json["timestamp"], serde_json::json!(1_735_075_200_000_i64));
    }
}

//! Runtime resource surfaces.
//!
//! `/resource` serves the counters as a hypermedia JSON document;
//! `/metrics` serves the same figures in plain-text exposition format.
//! Neither is cached: both must reflect the live process.

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::hal::{Hal, HAL_CONTENT_TYPE};
use crate::handlers::AppState;

/// `GET /resource`
pub async fn handle_resource(State(state): State<AppState>) -> Response {
    let hal = Hal::new(
        state.metrics.to_json(&state.config.build_info),
        "/resource",
    )
    .add_link("metrics", "/metrics");
    let body = serde_json::to_vec(&hal).unwrap_or_default();
    state.metrics.record_request(true);
    ([(header::CONTENT_TYPE, HAL_CONTENT_TYPE)], body).into_response()
}

/// `GET /metrics`
pub async fn handle_metrics(State(state): State<AppState>) -> Response {
    let body = state.metrics.to_exposition();
    state.metrics.record_request(true);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}

//! Liveness and status endpoints of the control plane

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use super::metrics::HEALTH_CHECKS;
use crate::state::AppState;

/// Registry totals reported by `GET /health`
#[derive(Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    pub services: usize,
    pub nodes: usize,
    pub available_nodes: usize,
    pub connections: u64,
}

/// GET /api/ping - liveness probe
async fn ping() -> &'static str {
    metrics::counter!(HEALTH_CHECKS).increment(1);
    "pong"
}

/// GET /health
async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    metrics::counter!(HEALTH_CHECKS).increment(1);

    let summary = state.registry.summary();
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        services: summary.services,
        nodes: summary.nodes,
        available_nodes: summary.available_nodes,
        connections: summary.connections,
    })
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/ping", get(ping))
        .route("/health", get(status))
}

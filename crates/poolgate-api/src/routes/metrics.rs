//! Prometheus metrics endpoint and metric names

use axum::{Router, extract::State, response::IntoResponse, routing::get};
use metrics::{Unit, describe_counter};
use std::sync::Arc;

use crate::state::MetricsHandle;

pub const PROXY_REQUESTS: &str = "poolgate_proxy_requests_total";
pub const HEALTH_CHECKS: &str = "poolgate_health_checks_total";
pub const REGISTRY_MUTATIONS: &str = "poolgate_registry_mutations_total";

/// Register descriptions for the counters the surfaces emit. Call once after
/// installing the recorder.
pub fn describe_metrics() {
    describe_counter!(
        PROXY_REQUESTS,
        Unit::Count,
        "Data-plane requests by outcome (forwarded, no_route, failed)"
    );
    describe_counter!(HEALTH_CHECKS, Unit::Count, "Liveness probe hits");
    describe_counter!(
        REGISTRY_MUTATIONS,
        Unit::Count,
        "Successful management mutations by operation"
    );
}

/// Create metrics routes with the Prometheus handle
pub fn routes(handle: Arc<MetricsHandle>) -> Router {
    Router::new()
        .route("/metrics", get(render))
        .with_state(handle)
}

/// GET /metrics
async fn render(State(handle): State<Arc<MetricsHandle>>) -> impl IntoResponse {
    handle.render()
}

//! API routes

mod health;
mod management;
pub mod metrics;
mod proxy;

use axum::Router;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::state::{AppState, MetricsHandle};

/// Create the control-plane router: management API, liveness probes and,
/// when a handle is given, Prometheus metrics
pub fn create_admin_router(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    let mut router = Router::new()
        // Health check
        .merge(health::routes())
        // Management API
        .merge(management::routes())
        .with_state(state);

    // Add metrics endpoint if handle is provided
    if let Some(handle) = metrics_handle {
        router = router.merge(metrics::routes(handle));
    }

    router
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
}

/// Create the data-plane router. Every request, whatever its method or path,
/// is routed to a node and forwarded.
pub fn create_proxy_router(state: AppState) -> Router {
    Router::new()
        .fallback(proxy::forward)
        .with_state(state)
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
}

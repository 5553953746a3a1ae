//! Application state

use metrics_exporter_prometheus::PrometheusHandle;
use poolgate_core::Registry;
use poolgate_proxy::Forwarder;
use std::sync::Arc;

/// Handle used to render the Prometheus exposition
pub type MetricsHandle = PrometheusHandle;

/// Application state shared across handlers of both surfaces
#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
    pub forwarder: Arc<Forwarder>,
}

impl AppState {
    pub fn new(registry: Registry, forwarder: Arc<Forwarder>) -> Self {
        Self {
            registry,
            forwarder,
        }
    }
}

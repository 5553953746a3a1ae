//! Poolgate HTTP Surfaces
//!
//! This crate provides the two Axum routers of the proxy: the data plane,
//! which routes and forwards client traffic, and the control plane, which
//! exposes the management API, liveness probes and metrics.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_admin_router, create_proxy_router};
pub use state::{AppState, MetricsHandle};

//! Management API routes
//!
//! CRUD over the registry: services, their three fixed pools, and the nodes
//! inside each pool. Pool names are parsed at this boundary, so anything
//! other than `prod`, `gray` or `debug` is a 404 before the registry is
//! touched.

pub mod nodes;
pub mod pools;
pub mod services;
pub mod types;

use axum::Router;
use poolgate_core::PoolKind;

use super::metrics::REGISTRY_MUTATIONS;
use crate::error::ApiError;
use crate::state::AppState;

/// Create management API routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(services::routes())
        .merge(pools::routes())
        .merge(nodes::routes())
}

fn parse_pool(name: &str) -> Result<PoolKind, ApiError> {
    Ok(name.parse::<PoolKind>()?)
}

fn record_mutation(op: &'static str) {
    metrics::counter!(REGISTRY_MUTATIONS, "op" => op).increment(1);
}

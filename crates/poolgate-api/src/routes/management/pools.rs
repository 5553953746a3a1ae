//! Pool management routes

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use poolgate_core::{PoolKind, UpdatePool};

use super::types::{PoolResponse, UpdatePoolRequest, pool_to_response};
use super::{parse_pool, record_mutation};
use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/services/{service}/pools - the fixed pool names
async fn list_pools(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> Result<Json<Vec<PoolKind>>, ApiError> {
    Ok(Json(state.registry.list_pools(&service)?))
}

/// GET /api/services/{service}/pools/{pool}
async fn get_pool(
    State(state): State<AppState>,
    Path((service, pool)): Path<(String, String)>,
) -> Result<Json<PoolResponse>, ApiError> {
    let kind = parse_pool(&pool)?;
    let pool = state.registry.get_pool(&service, kind)?;
    Ok(Json(pool_to_response(kind, pool)))
}

/// PUT /api/services/{service}/pools/{pool}
async fn update_pool(
    State(state): State<AppState>,
    Path((service, pool)): Path<(String, String)>,
    Json(request): Json<UpdatePoolRequest>,
) -> Result<Json<PoolResponse>, ApiError> {
    let kind = parse_pool(&pool)?;
    let pool = state.registry.update_pool(
        &service,
        kind,
        UpdatePool {
            pattern: request.pattern,
            lb_policy: request.lb_policy,
        },
    )?;

    record_mutation("update_pool");
    Ok(Json(pool_to_response(kind, pool)))
}

/// DELETE /api/services/{service}/pools/{pool}
async fn delete_pool(
    State(state): State<AppState>,
    Path((service, pool)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let kind = parse_pool(&pool)?;
    state.registry.delete_pool(&service, kind)?;

    record_mutation("delete_pool");
    Ok(StatusCode::NO_CONTENT)
}

/// Create pool management routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/services/{service}/pools", get(list_pools))
        .route(
            "/api/services/{service}/pools/{pool}",
            get(get_pool).put(update_pool).delete(delete_pool),
        )
}

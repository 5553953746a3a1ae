//! Node management routes

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use poolgate_core::{MAX_WEIGHT, MIN_WEIGHT, NewNode, UpdateNode};
use tracing::debug;

use super::types::{CreateNodeRequest, NodeResponse, UpdateNodeRequest};
use super::{parse_pool, record_mutation};
use crate::error::ApiError;
use crate::state::AppState;

/// Narrow a requested weight; the registry enforces the exact range
fn weight(value: i64) -> Result<u8, ApiError> {
    u8::try_from(value).map_err(|_| {
        ApiError::BadRequest(format!(
            "node weight must be between {} and {}",
            MIN_WEIGHT, MAX_WEIGHT
        ))
    })
}

/// GET /api/services/{service}/pools/{pool}/nodes
async fn list_nodes(
    State(state): State<AppState>,
    Path((service, pool)): Path<(String, String)>,
) -> Result<Json<Vec<NodeResponse>>, ApiError> {
    let kind = parse_pool(&pool)?;
    let nodes = state.registry.list_nodes(&service, kind)?;
    Ok(Json(nodes.into_iter().map(NodeResponse::from).collect()))
}

/// POST /api/services/{service}/pools/{pool}/nodes
async fn create_node(
    State(state): State<AppState>,
    Path((service, pool)): Path<(String, String)>,
    Json(request): Json<CreateNodeRequest>,
) -> Result<(StatusCode, Json<NodeResponse>), ApiError> {
    let kind = parse_pool(&pool)?;
    debug!("Creating node {} in pool {} of service {}", request.name, kind, service);

    let node = state.registry.create_node(
        &service,
        kind,
        NewNode {
            name: request.name,
            host: request.host,
            status: request.status,
            weight: weight(request.weight)?,
        },
    )?;

    record_mutation("create_node");
    Ok((StatusCode::CREATED, Json(node.into())))
}

/// GET /api/services/{service}/pools/{pool}/nodes/{node}
async fn get_node(
    State(state): State<AppState>,
    Path((service, pool, node)): Path<(String, String, String)>,
) -> Result<Json<NodeResponse>, ApiError> {
    let kind = parse_pool(&pool)?;
    Ok(Json(state.registry.get_node(&service, kind, &node)?.into()))
}

/// PUT /api/services/{service}/pools/{pool}/nodes/{node}
async fn update_node(
    State(state): State<AppState>,
    Path((service, pool, node)): Path<(String, String, String)>,
    Json(request): Json<UpdateNodeRequest>,
) -> Result<Json<NodeResponse>, ApiError> {
    let kind = parse_pool(&pool)?;

    let node = state.registry.update_node(
        &service,
        kind,
        &node,
        UpdateNode {
            weight: request.weight.map(weight).transpose()?,
            status: request.status,
        },
    )?;

    record_mutation("update_node");
    Ok(Json(node.into()))
}

/// DELETE /api/services/{service}/pools/{pool}/nodes/{node}
async fn delete_node(
    State(state): State<AppState>,
    Path((service, pool, node)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    let kind = parse_pool(&pool)?;
    state.registry.delete_node(&service, kind, &node)?;

    record_mutation("delete_node");
    Ok(StatusCode::NO_CONTENT)
}

/// Create node management routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/services/{service}/pools/{pool}/nodes",
            get(list_nodes).post(create_node),
        )
        .route(
            "/api/services/{service}/pools/{pool}/nodes/{node}",
            get(get_node).put(update_node).delete(delete_node),
        )
}

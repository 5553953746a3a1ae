//! Service management routes

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use poolgate_core::{NewService, UpdateService};
use tracing::debug;

use super::record_mutation;
use super::types::{CreateServiceRequest, ServiceResponse, UpdateServiceRequest};
use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/services
async fn list_services(State(state): State<AppState>) -> Json<Vec<ServiceResponse>> {
    Json(
        state
            .registry
            .list_services()
            .into_iter()
            .map(ServiceResponse::from)
            .collect(),
    )
}

/// POST /api/services
async fn create_service(
    State(state): State<AppState>,
    Json(request): Json<CreateServiceRequest>,
) -> Result<(StatusCode, Json<ServiceResponse>), ApiError> {
    debug!("Creating service: {}", request.name);

    let service = state.registry.create_service(NewService {
        name: request.name,
        host: request.host,
        url: request.url,
    })?;

    record_mutation("create_service");
    Ok((StatusCode::CREATED, Json(service.into())))
}

/// GET /api/services/{service}
async fn get_service(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> Result<Json<ServiceResponse>, ApiError> {
    Ok(Json(state.registry.get_service(&service)?.into()))
}

/// PUT /api/services/{service}
async fn update_service(
    State(state): State<AppState>,
    Path(service): Path<String>,
    Json(request): Json<UpdateServiceRequest>,
) -> Result<Json<ServiceResponse>, ApiError> {
    let service = state.registry.update_service(
        &service,
        UpdateService {
            host: request.host,
            url: request.url,
        },
    )?;

    record_mutation("update_service");
    Ok(Json(service.into()))
}

/// DELETE /api/services/{service}
async fn delete_service(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.registry.delete_service(&service)?;

    record_mutation("delete_service");
    Ok(StatusCode::NO_CONTENT)
}

/// Create service management routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/services", get(list_services).post(create_service))
        .route(
            "/api/services/{service}",
            get(get_service).put(update_service).delete(delete_service),
        )
}

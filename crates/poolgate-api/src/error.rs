//! API error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use poolgate_core::CoreError;
use poolgate_proxy::ProxyError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Proxy(#[from] ProxyError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Core(e) => match e {
                CoreError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                CoreError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
                CoreError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            },
            // Data-plane callers only ever see a bare status code
            ApiError::Proxy(e) => {
                let status = match e {
                    ProxyError::NoRoute(_) => StatusCode::NOT_FOUND,
                    ProxyError::InvalidTarget(_) | ProxyError::Forwarding(_) => {
                        StatusCode::BAD_GATEWAY
                    }
                };
                return status.into_response();
            }
        };

        let body = axum::Json(json!({
            "code": code,
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

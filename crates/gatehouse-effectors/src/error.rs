//! Error handling for the effector services.
//! Maps `GatehouseError` to HTTP status codes and JSON error bodies.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gatehouse_core::error::GatehouseError;
use serde_json::json;

/// Wrapper to convert `GatehouseError` into an axum response.
pub struct AppError(pub GatehouseError);

impl From<GatehouseError> for AppError {
    fn from(e: GatehouseError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = json!({
            "error": self.0.to_string(),
            "code": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}

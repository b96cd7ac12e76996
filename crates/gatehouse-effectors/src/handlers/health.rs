//! Liveness endpoint, one per service.

use axum::{Extension, Json};
use serde_json::{json, Value};

use crate::EffectorState;

pub async fn health(Extension(state): Extension<EffectorState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": state.service_name,
    }))
}

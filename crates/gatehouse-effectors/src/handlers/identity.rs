//! Identity change effector: reconciles the member's directory group
//! membership. `change_data` carries the desired authorization list; an
//! absent list means the member keeps no groups.

use axum::{Extension, Json};
use serde_json::{json, Value};

use gatehouse_core::change::DispatchPayload;
use gatehouse_core::GatehouseError;

use crate::error::AppError;
use crate::EffectorState;

pub async fn change_identity(
    Extension(state): Extension<EffectorState>,
    Json(request): Json<DispatchPayload>,
) -> Result<Json<Value>, AppError> {
    tracing::debug!(member_id = request.member_id, "received identity change request");

    let identity = state.members.identity(request.member_id).await?;
    let username = identity.directory_username.as_deref().ok_or_else(|| {
        GatehouseError::InvalidInput("directory username not found in member identity".into())
    })?;

    let groups: Vec<String> = if request.change_data.is_null() {
        Vec::new()
    } else {
        serde_json::from_value(request.change_data.clone()).map_err(|e| {
            GatehouseError::InvalidInput(format!(
                "change_data must be a list of authorizations: {e}"
            ))
        })?
    };

    tracing::info!(
        member = %identity.display_name(),
        member_id = request.member_id,
        username,
        groups = groups.len(),
        "syncing directory authorizations"
    );
    state.directory.sync_groups(username, &groups).await?;

    Ok(Json(json!({"processed": true})))
}

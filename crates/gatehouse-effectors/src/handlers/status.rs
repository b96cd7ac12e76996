//! Status change effector.
//!
//! A status change drives two downstream systems: the directory account's
//! enabled flag follows whether the new status is the active value, and
//! every tag currently assigned to the member (status ACTIVE) is pushed
//! to or pulled from the access controller accordingly. Tags already
//! retired (INACTIVE) are not touched here; the access effector owns
//! their removal.

use axum::{Extension, Json};
use serde_json::{json, Value};

use gatehouse_core::change::DispatchPayload;
use gatehouse_core::member::{is_active_status, TagStatus};
use gatehouse_core::GatehouseError;

use crate::error::AppError;
use crate::EffectorState;

pub async fn change_status(
    Extension(state): Extension<EffectorState>,
    Json(request): Json<DispatchPayload>,
) -> Result<Json<Value>, AppError> {
    tracing::debug!(member_id = request.member_id, "received status change request");

    let membership_status = request
        .change_data
        .get("membership_status")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            GatehouseError::InvalidInput("change_data.membership_status is required".into())
        })?;
    let active = is_active_status(membership_status);

    let identity = state.members.identity(request.member_id).await?;
    tracing::info!(
        member = %identity.display_name(),
        member_id = request.member_id,
        status = %membership_status,
        "processing status change"
    );

    let username = identity.directory_username.as_deref().ok_or_else(|| {
        GatehouseError::InvalidInput("directory username not found in member identity".into())
    })?;
    state.directory.set_enabled(username, active).await?;

    let tags = state.members.tags(request.member_id).await?;
    for tag in tags.iter().filter(|t| t.status == TagStatus::Active) {
        if active {
            state.board.add_tag(tag).await?;
        } else {
            state.board.remove_tag(tag).await?;
        }
    }

    tracing::info!(member_id = request.member_id, "status change applied");
    Ok(Json(json!({"processed": true})))
}

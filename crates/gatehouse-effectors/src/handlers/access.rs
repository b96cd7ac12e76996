//! Access change effector.
//!
//! Add-vs-remove is decided per tag by the dual-key rule: the tag's own
//! flag and the member's overall status. An inactive tag is always
//! removed; an active tag is added only while the member is active.

use axum::{Extension, Json};
use serde_json::{json, Value};

use gatehouse_core::change::DispatchPayload;
use gatehouse_core::member::{is_active_status, tag_action, TagAction};

use crate::error::AppError;
use crate::EffectorState;

pub async fn change_access(
    Extension(state): Extension<EffectorState>,
    Json(request): Json<DispatchPayload>,
) -> Result<Json<Value>, AppError> {
    tracing::debug!(member_id = request.member_id, "received access change request");

    let identity = state.members.identity(request.member_id).await?;
    let membership_status = state.members.membership_status(request.member_id).await?;
    let member_active = is_active_status(&membership_status);
    tracing::info!(
        member = %identity.display_name(),
        member_id = request.member_id,
        status = %membership_status,
        "processing access change"
    );

    let tags = state.members.tags(request.member_id).await?;
    if tags.is_empty() {
        // Nothing to reconcile; not fatal.
        tracing::warn!(
            member = %identity.display_name(),
            member_id = request.member_id,
            "no tags found for member"
        );
    }

    for tag in &tags {
        match tag_action(member_active, tag.status) {
            TagAction::Add => state.board.add_tag(tag).await?,
            TagAction::Remove => state.board.remove_tag(tag).await?,
        }
    }

    tracing::info!(
        member_id = request.member_id,
        tags = tags.len(),
        "access change applied"
    );
    Ok(Json(json!({"processed": true, "details": request})))
}

//! Member identity, membership status and RFID tag shapes, as the
//! effectors read them from the member store.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The only membership status that grants physical access.
pub const ACTIVE_MEMBERSHIP_STATUS: &str = "active";

pub fn is_active_status(status: &str) -> bool {
    status.eq_ignore_ascii_case(ACTIVE_MEMBERSHIP_STATUS)
}

/// The member's identity section. Additional fields ride along untyped;
/// only the ones the effectors consume are named.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemberIdentity {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub directory_username: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl MemberIdentity {
    /// For log lines only.
    pub fn display_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or("Unknown"),
            self.last_name.as_deref().unwrap_or("Unknown")
        )
    }
}

/// A tag's own flag, independent of the member's overall status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TagStatus {
    Active,
    Inactive,
}

/// A physical RFID credential. `converted_tag` is the Wiegand-converted
/// numeric form the access controller speaks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberTag {
    pub tag: String,
    pub converted_tag: i64,
    pub status: TagStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagAction {
    Add,
    Remove,
}

/// The dual-key rule: an inactive tag is always removed from the access
/// controller; an active tag is added only while the member is active.
pub fn tag_action(member_active: bool, tag_status: TagStatus) -> TagAction {
    match tag_status {
        TagStatus::Inactive => TagAction::Remove,
        TagStatus::Active if member_active => TagAction::Add,
        TagStatus::Active => TagAction::Remove,
    }
}

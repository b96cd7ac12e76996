//! Operation payloads carried over the hardware-isolation bus, and the
//! structured outcome the workers report back.
//!
//! The wire form is internally tagged by `operation`, e.g.
//! `{"operation": "add", "tag_id": "0001460114", "converted_tag": 1234567}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operations the board worker accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum BoardOp {
    Add { tag_id: String, converted_tag: i64 },
    Remove { tag_id: String, converted_tag: i64 },
    SetDatetime,
    GetDatetime,
}

/// Operations the directory worker accepts. `sync_groups` reconciles the
/// account's group membership against the desired set; the finer-grained
/// add/remove operations exist for targeted corrections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum DirectoryOp {
    SetEnabled { username: String, enabled: bool },
    AddGroup { username: String, group: String },
    RemoveGroup { username: String, group: String },
    SyncGroups { username: String, groups: Vec<String> },
    GetDatetime,
}

/// What a worker reports for one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpOutcome {
    pub status: OpStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpStatus {
    Success,
    Failure,
}

impl OpOutcome {
    pub fn success(data: Value) -> Self {
        Self {
            status: OpStatus::Success,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            status: OpStatus::Failure,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OpStatus::Success
    }
}

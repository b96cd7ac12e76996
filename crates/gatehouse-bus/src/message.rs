use serde::{Deserialize, Serialize};
use serde_json::Value;

/// On-disk request form: `{root}/pending/{id}.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub id: String,
    pub payload: Value,
    /// Unix seconds at send time. Informational; claim order is driven by
    /// file modification time, not this field.
    pub timestamp: f64,
}

/// On-disk reply form: `{root}/responses/{id}.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusReply {
    pub original_id: String,
    pub result: String,
    pub status: ReplyStatus,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Success,
    Failure,
}

impl BusReply {
    pub fn is_success(&self) -> bool {
        self.status == ReplyStatus::Success
    }
}

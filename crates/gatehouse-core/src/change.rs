//! Change log, routing table and attempt log row shapes.
//!
//! A change row's `data` column is a JSON envelope:
//! `{"change": "<type key>", "member_id": <int>, "<type key>": {...}}`.
//! The envelope is parsed lazily; a malformed envelope is an
//! `InvalidInput` error and the row stays unprocessed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GatehouseError;

/// Synthetic attempt code for rows that never produced an HTTP exchange:
/// no route for the change type, or an envelope that cannot be parsed.
pub const RESPONSE_CODE_UNDISPATCHABLE: i32 = 0;

/// Synthetic attempt code for transport failures (connect error, client
/// timeout) where the effector never returned a status line.
pub const RESPONSE_CODE_TRANSPORT_FAILURE: i32 = 599;

/// A row in the `member_changes` table. `id` is monotonic and globally
/// ordered; `processed` flips false to true exactly once, on dispatch
/// success, and is never reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRow {
    pub id: i64,
    pub data: Value,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

/// A row in the `service_endpoints` routing table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub name: String,
    pub endpoint: String,
}

/// A row appended to the `member_changes_processing_log` table for every
/// dispatch verdict, success or failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub change_id: i64,
    pub service_name: String,
    pub endpoint: String,
    pub response_code: i32,
    pub response_message: String,
}

/// The parsed `data` envelope of a change row.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeEnvelope {
    pub change: String,
    pub member_id: i64,
    #[serde(flatten)]
    pub sections: serde_json::Map<String, Value>,
}

impl ChangeEnvelope {
    pub fn parse(data: &Value) -> Result<Self, GatehouseError> {
        serde_json::from_value(data.clone())
            .map_err(|e| GatehouseError::InvalidInput(format!("malformed change envelope: {e}")))
    }

    /// The type-specific body, keyed in the envelope by the change type
    /// name itself. Absent section dispatches as JSON null; the effector
    /// decides whether that is acceptable.
    pub fn change_data(&self) -> Value {
        self.sections
            .get(&self.change)
            .cloned()
            .unwrap_or(Value::Null)
    }
}

/// The wire format POSTed to an effector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchPayload {
    pub member_id: i64,
    pub change_type: String,
    pub change_data: Value,
}

impl DispatchPayload {
    pub fn from_envelope(envelope: &ChangeEnvelope) -> Self {
        Self {
            member_id: envelope.member_id,
            change_type: envelope.change.clone(),
            change_data: envelope.change_data(),
        }
    }
}

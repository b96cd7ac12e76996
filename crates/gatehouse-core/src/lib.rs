//! gatehouse-core — pure domain types, port traits, error enum.
//!
//! Everything the dispatcher, effectors and workers agree on lives here:
//! change rows and dispatch payloads, attempt records, member identity and
//! tag shapes, bus operation payloads, and the storage/effector port traits
//! the adapters implement. Deliberately free of sqlx, axum and reqwest.

pub mod change;
pub mod error;
pub mod member;
pub mod ops;
pub mod ports;

pub use change::{
    AttemptRecord, ChangeEnvelope, ChangeRow, DispatchPayload, Route,
    RESPONSE_CODE_TRANSPORT_FAILURE, RESPONSE_CODE_UNDISPATCHABLE,
};
pub use error::GatehouseError;
pub use member::{tag_action, MemberIdentity, MemberTag, TagAction, TagStatus};
pub use ops::{BoardOp, DirectoryOp, OpOutcome};
pub use ports::Result;

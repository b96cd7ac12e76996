//! gatehouse-effectors — the HTTP services the dispatcher routes changes to.
//!
//! Each service accepts a single POST of `{member_id, change_type,
//! change_data}`, reads whatever extra context it needs from the member
//! store, and fans out to the directory and/or the access controller
//! through the hardware-isolation bus. Effectors are stateless and
//! idempotent; any sub-call failure is answered non-200 so the dispatcher
//! retries the change.

pub mod board;
pub mod config;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod router;
pub mod serve;

use std::sync::Arc;

use gatehouse_core::ports::{AccessController, DirectoryAccount, MemberStore};

/// Shared handler context. All fields are ports, so the full handler
/// logic runs in tests against in-memory fakes.
#[derive(Clone)]
pub struct EffectorState {
    pub service_name: &'static str,
    pub members: Arc<dyn MemberStore>,
    pub board: Arc<dyn AccessController>,
    pub directory: Arc<dyn DirectoryAccount>,
}

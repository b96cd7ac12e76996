//! Storage and effector port traits — implemented by gatehouse-postgres
//! and the bus-backed adapters in gatehouse-effectors. The dispatch engine
//! and the effector handlers depend only on these, never on sqlx or the
//! filesystem directly.

use async_trait::async_trait;

use crate::change::{AttemptRecord, ChangeRow, Route};
use crate::error::GatehouseError;
use crate::member::{MemberIdentity, MemberTag};

pub type Result<T> = std::result::Result<T, GatehouseError>;

/// The change log. The dispatcher is its sole consumer and the sole
/// mutator of the `processed` flag.
#[async_trait]
pub trait ChangeStore: Send + Sync {
    /// Oldest unprocessed rows with id greater than `after_id`, ascending,
    /// at most `limit`. Pagination by id keeps a failing row from being
    /// refetched within the same pass.
    async fn fetch_unprocessed(&self, after_id: i64, limit: i64) -> Result<Vec<ChangeRow>>;

    async fn count_unprocessed(&self) -> Result<i64>;

    /// Flip `processed` and append the success attempt in one transaction,
    /// so a processed row always has its 200 attempt on record.
    async fn mark_processed(&self, change_id: i64, attempt: &AttemptRecord) -> Result<()>;
}

/// The routing table: change type name to effector endpoint. Configured
/// out-of-band; read-only here.
#[async_trait]
pub trait RouteStore: Send + Sync {
    async fn resolve(&self, change_type: &str) -> Result<Option<Route>>;
}

/// Append-only audit trail of dispatch verdicts.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn append(&self, attempt: &AttemptRecord) -> Result<()>;
}

/// Read access to the member table the external membership service owns.
#[async_trait]
pub trait MemberStore: Send + Sync {
    async fn identity(&self, member_id: i64) -> Result<MemberIdentity>;
    async fn membership_status(&self, member_id: i64) -> Result<String>;
    async fn tags(&self, member_id: i64) -> Result<Vec<MemberTag>>;
}

/// Effector-side view of the physical access controller. The production
/// implementation rides the hardware-isolation bus; a reply timeout is an
/// error so the enclosing change is retried.
#[async_trait]
pub trait AccessController: Send + Sync {
    async fn add_tag(&self, tag: &MemberTag) -> Result<()>;
    async fn remove_tag(&self, tag: &MemberTag) -> Result<()>;
}

/// Effector-side view of the directory service.
#[async_trait]
pub trait DirectoryAccount: Send + Sync {
    async fn set_enabled(&self, username: &str, enabled: bool) -> Result<()>;
    async fn sync_groups(&self, username: &str, groups: &[String]) -> Result<()>;
}

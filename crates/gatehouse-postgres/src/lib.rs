//! gatehouse-postgres — Postgres implementations of the core port traits.
//!
//! Each adapter is a newtype wrapping PgPool. All SQL is runtime-checked
//! (sqlx::query, not sqlx::query!) to avoid a compile-time DB requirement.

mod store;

pub use store::{PgAttemptStore, PgChangeStore, PgMemberStore, PgRouteStore};

use sqlx::PgPool;

/// Bundle of all adapters over one pool.
pub struct PgStores {
    pub changes: PgChangeStore,
    pub routes: PgRouteStore,
    pub attempts: PgAttemptStore,
    pub members: PgMemberStore,
}

impl PgStores {
    pub fn new(pool: PgPool) -> Self {
        Self {
            changes: PgChangeStore::new(pool.clone()),
            routes: PgRouteStore::new(pool.clone()),
            attempts: PgAttemptStore::new(pool.clone()),
            members: PgMemberStore::new(pool),
        }
    }
}

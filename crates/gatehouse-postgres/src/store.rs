use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use gatehouse_core::change::{AttemptRecord, ChangeRow, Route};
use gatehouse_core::error::GatehouseError;
use gatehouse_core::member::{MemberIdentity, MemberTag, TagStatus};
use gatehouse_core::ports::{AttemptStore, ChangeStore, MemberStore, Result, RouteStore};

// ── PgChangeStore ─────────────────────────────────────────────

/// Postgres-backed change log. The dispatcher is the only writer of the
/// `processed` flag, and only ever flips it to true.
pub struct PgChangeStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct PgChangeRow {
    id: i64,
    data: Value,
    processed: bool,
    created_at: DateTime<Utc>,
}

impl From<PgChangeRow> for ChangeRow {
    fn from(r: PgChangeRow) -> Self {
        ChangeRow {
            id: r.id,
            data: r.data,
            processed: r.processed,
            created_at: r.created_at,
        }
    }
}

impl PgChangeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChangeStore for PgChangeStore {
    async fn fetch_unprocessed(&self, after_id: i64, limit: i64) -> Result<Vec<ChangeRow>> {
        let rows = sqlx::query_as::<_, PgChangeRow>(
            r#"
            SELECT id, data, processed, created_at
            FROM member_changes
            WHERE processed = FALSE
              AND id > $1
            ORDER BY id
            LIMIT $2
            "#,
        )
        .bind(after_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_unprocessed(&self) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM member_changes WHERE processed = FALSE")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| anyhow!(e))?;
        Ok(count.0)
    }

    async fn mark_processed(&self, change_id: i64, attempt: &AttemptRecord) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;
        insert_attempt(&mut *tx, attempt).await.map_err(|e| anyhow!(e))?;
        sqlx::query("UPDATE member_changes SET processed = TRUE WHERE id = $1")
            .bind(change_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow!(e))?;
        tx.commit().await.map_err(|e| anyhow!(e))?;
        Ok(())
    }
}

// ── PgRouteStore ──────────────────────────────────────────────

/// Lookup over the `service_endpoints` routing table.
pub struct PgRouteStore {
    pool: PgPool,
}

impl PgRouteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RouteStore for PgRouteStore {
    async fn resolve(&self, change_type: &str) -> Result<Option<Route>> {
        let row: Option<(String, String)> = sqlx::query_as(
            r#"
            SELECT name, endpoint
            FROM service_endpoints
            WHERE name = $1
            "#,
        )
        .bind(change_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(row.map(|(name, endpoint)| Route { name, endpoint }))
    }
}

// ── PgAttemptStore ────────────────────────────────────────────

/// Append-only writer for the `member_changes_processing_log` audit table.
pub struct PgAttemptStore {
    pool: PgPool,
}

impl PgAttemptStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn insert_attempt<'e, E>(executor: E, attempt: &AttemptRecord) -> sqlx::Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO member_changes_processing_log (member_change_id,
                                                   service_name,
                                                   service_endpoint,
                                                   response_code,
                                                   response_message)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(attempt.change_id)
    .bind(&attempt.service_name)
    .bind(&attempt.endpoint)
    .bind(attempt.response_code)
    .bind(&attempt.response_message)
    .execute(executor)
    .await
    .map(|_| ())
}

#[async_trait]
impl AttemptStore for PgAttemptStore {
    async fn append(&self, attempt: &AttemptRecord) -> Result<()> {
        insert_attempt(&self.pool, attempt)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(())
    }
}

// ── PgMemberStore ─────────────────────────────────────────────

/// Read access to the member table owned by the membership service.
pub struct PgMemberStore {
    pool: PgPool,
}

impl PgMemberStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemberStore for PgMemberStore {
    async fn identity(&self, member_id: i64) -> Result<MemberIdentity> {
        let row: Option<(Value,)> = sqlx::query_as("SELECT identity FROM member WHERE id = $1")
            .bind(member_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        let identity = row
            .ok_or_else(|| GatehouseError::NotFound(format!("member {member_id}")))?
            .0;
        serde_json::from_value(identity)
            .map_err(|e| GatehouseError::Internal(anyhow!("member {member_id} identity: {e}")))
    }

    async fn membership_status(&self, member_id: i64) -> Result<String> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT status->>'membership_status' FROM member WHERE id = $1")
                .bind(member_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| anyhow!(e))?;
        match row {
            Some((Some(status),)) => Ok(status),
            Some((None,)) => Err(GatehouseError::NotFound(format!(
                "membership status for member {member_id}"
            ))),
            None => Err(GatehouseError::NotFound(format!("member {member_id}"))),
        }
    }

    async fn tags(&self, member_id: i64) -> Result<Vec<MemberTag>> {
        let rows: Vec<(String, i64, String)> = sqlx::query_as(
            "SELECT tag, wiegand_tag_num, status FROM get_all_tags_for_member($1)",
        )
        .bind(member_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        rows.into_iter()
            .map(|(tag, converted_tag, status)| {
                let status = match status.as_str() {
                    "ACTIVE" => TagStatus::Active,
                    "INACTIVE" => TagStatus::Inactive,
                    other => {
                        return Err(GatehouseError::Internal(anyhow!(
                            "unexpected tag status '{other}' for member {member_id}"
                        )))
                    }
                };
                Ok(MemberTag {
                    tag,
                    converted_tag,
                    status,
                })
            })
            .collect()
    }
}

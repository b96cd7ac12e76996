//! Postgres-backed pipeline tests.
//!
//! These prove the store adapters against a real database: resume order,
//! the processed flip + attempt insert transaction, and routing misses.
//!
//! Requires a PostgreSQL database with migrations/0001_init.sql applied.
//! Run with: DATABASE_URL="postgresql:///gatehouse_test" cargo test -p gatehouse-dispatcher --test pipeline_pg -- --ignored --nocapture

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use gatehouse_core::change::DispatchPayload;
use gatehouse_core::ports::Result;
use gatehouse_dispatcher::effector::{EffectorClient, EffectorResponse};
use gatehouse_dispatcher::{DispatchPolicy, Dispatcher};
use gatehouse_postgres::PgStores;

#[derive(Default)]
struct RecordingEffector {
    calls: Mutex<Vec<DispatchPayload>>,
}

#[async_trait]
impl EffectorClient for RecordingEffector {
    async fn dispatch(
        &self,
        _endpoint: &str,
        payload: &DispatchPayload,
    ) -> Result<EffectorResponse> {
        self.calls.lock().unwrap().push(payload.clone());
        Ok(EffectorResponse {
            code: 200,
            body: "{}".into(),
        })
    }
}

async fn pool() -> PgPool {
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");
    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("failed to connect to test database")
}

async fn insert_change(pool: &PgPool, data: serde_json::Value) -> i64 {
    let row: (i64,) =
        sqlx::query_as("INSERT INTO member_changes (data) VALUES ($1) RETURNING id")
            .bind(data)
            .fetch_one(pool)
            .await
            .expect("insert change");
    row.0
}

async fn cleanup(pool: &PgPool, ids: &[i64]) {
    for id in ids {
        sqlx::query("DELETE FROM member_changes_processing_log WHERE member_change_id = $1")
            .bind(id)
            .execute(pool)
            .await
            .ok();
        sqlx::query("DELETE FROM member_changes WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .ok();
    }
}

#[tokio::test]
#[ignore]
async fn resume_processes_backlog_in_id_order_and_records_attempts() {
    let pool = pool().await;
    sqlx::query(
        "INSERT INTO service_endpoints (name, endpoint) VALUES ('status', 'http://dhstatus/v1/change_status')
         ON CONFLICT (name) DO NOTHING",
    )
    .execute(&pool)
    .await
    .expect("seed route");

    let mut ids = Vec::new();
    for member_id in [1, 2, 3] {
        ids.push(
            insert_change(
                &pool,
                json!({
                    "change": "status",
                    "member_id": member_id,
                    "status": {"membership_status": "active"},
                }),
            )
            .await,
        );
    }

    let stores = PgStores::new(pool.clone());
    let effector = Arc::new(RecordingEffector::default());
    let dispatcher = Dispatcher::new(
        Arc::new(stores.changes),
        Arc::new(stores.routes),
        Arc::new(stores.attempts),
        Arc::clone(&effector) as Arc<dyn EffectorClient>,
        2, // force pagination across the three rows
        DispatchPolicy::default(),
    );

    dispatcher.resume().await.expect("resume");

    // Delivered ascending by id.
    let members: Vec<i64> = effector.calls.lock().unwrap().iter().map(|c| c.member_id).collect();
    assert_eq!(members, vec![1, 2, 3]);

    // Every processed row carries a 200 attempt.
    for id in &ids {
        let (processed,): (bool,) =
            sqlx::query_as("SELECT processed FROM member_changes WHERE id = $1")
                .bind(id)
                .fetch_one(&pool)
                .await
                .expect("row");
        assert!(processed);

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM member_changes_processing_log
             WHERE member_change_id = $1 AND response_code = 200",
        )
        .bind(id)
        .fetch_one(&pool)
        .await
        .expect("attempt count");
        assert_eq!(count, 1);
    }

    cleanup(&pool, &ids).await;
}

#[tokio::test]
#[ignore]
async fn unrouted_change_stays_unprocessed_with_synthetic_attempt() {
    let pool = pool().await;
    let id = insert_change(
        &pool,
        json!({"change": "mystery", "member_id": 7, "mystery": {}}),
    )
    .await;

    let stores = PgStores::new(pool.clone());
    let dispatcher = Dispatcher::new(
        Arc::new(stores.changes),
        Arc::new(stores.routes),
        Arc::new(stores.attempts),
        Arc::new(RecordingEffector::default()),
        100,
        DispatchPolicy::default(),
    );

    dispatcher.run_pass().await.expect("pass");

    let (processed,): (bool,) =
        sqlx::query_as("SELECT processed FROM member_changes WHERE id = $1")
            .bind(id)
            .fetch_one(&pool)
            .await
            .expect("row");
    assert!(!processed);

    let (code,): (i32,) = sqlx::query_as(
        "SELECT response_code FROM member_changes_processing_log WHERE member_change_id = $1",
    )
    .bind(id)
    .fetch_one(&pool)
    .await
    .expect("attempt");
    assert_eq!(code, 0);

    cleanup(&pool, &[id]).await;
}

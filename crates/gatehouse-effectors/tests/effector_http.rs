//! HTTP-level tests for the effector services against in-memory ports.
//!
//! These prove the handler contracts the dispatcher relies on: 200 only
//! when every sub-call succeeded, the dual-key tag rule, and idempotence
//! of repeated deliveries.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use http_body_util::BodyExt;
use hyper::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use gatehouse_core::error::GatehouseError;
use gatehouse_core::member::{MemberIdentity, MemberTag, TagStatus};
use gatehouse_core::ports::{AccessController, DirectoryAccount, MemberStore, Result};
use gatehouse_effectors::router::{access_router, identity_router, status_router};
use gatehouse_effectors::EffectorState;

// ── In-memory ports ────────────────────────────────────────────

struct FakeMemberStore {
    identity: MemberIdentity,
    status: String,
    tags: Vec<MemberTag>,
}

impl Default for FakeMemberStore {
    fn default() -> Self {
        Self {
            identity: MemberIdentity {
                first_name: Some("Ada".into()),
                last_name: Some("Lovelace".into()),
                directory_username: Some("alovelace".into()),
                extra: Default::default(),
            },
            status: "active".into(),
            tags: Vec::new(),
        }
    }
}

#[async_trait]
impl MemberStore for FakeMemberStore {
    async fn identity(&self, member_id: i64) -> Result<MemberIdentity> {
        if member_id == 7 {
            Ok(self.identity.clone())
        } else {
            Err(GatehouseError::NotFound(format!("member {member_id}")))
        }
    }

    async fn membership_status(&self, _member_id: i64) -> Result<String> {
        Ok(self.status.clone())
    }

    async fn tags(&self, _member_id: i64) -> Result<Vec<MemberTag>> {
        Ok(self.tags.clone())
    }
}

#[derive(Default)]
struct RecordingBoard {
    ops: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingBoard {
    fn ops(&self) -> Vec<(String, String)> {
        self.ops.lock().unwrap().clone()
    }
}

#[async_trait]
impl AccessController for RecordingBoard {
    async fn add_tag(&self, tag: &MemberTag) -> Result<()> {
        if self.fail {
            return Err(GatehouseError::Bus("no reply within 10s".into()));
        }
        self.ops.lock().unwrap().push(("add".into(), tag.tag.clone()));
        Ok(())
    }

    async fn remove_tag(&self, tag: &MemberTag) -> Result<()> {
        if self.fail {
            return Err(GatehouseError::Bus("no reply within 10s".into()));
        }
        self.ops
            .lock()
            .unwrap()
            .push(("remove".into(), tag.tag.clone()));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingDirectory {
    calls: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingDirectory {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DirectoryAccount for RecordingDirectory {
    async fn set_enabled(&self, username: &str, enabled: bool) -> Result<()> {
        if self.fail {
            return Err(GatehouseError::Directory("graph unavailable".into()));
        }
        self.calls
            .lock()
            .unwrap()
            .push(format!("set_enabled {username} {enabled}"));
        Ok(())
    }

    async fn sync_groups(&self, username: &str, groups: &[String]) -> Result<()> {
        if self.fail {
            return Err(GatehouseError::Directory("graph unavailable".into()));
        }
        self.calls
            .lock()
            .unwrap()
            .push(format!("sync_groups {username} {}", groups.join(",")));
        Ok(())
    }
}

// ── Fixtures ───────────────────────────────────────────────────

fn tag(id: &str, converted: i64, status: TagStatus) -> MemberTag {
    MemberTag {
        tag: id.into(),
        converted_tag: converted,
        status,
    }
}

struct Fixture {
    state: EffectorState,
    board: Arc<RecordingBoard>,
    directory: Arc<RecordingDirectory>,
}

fn fixture(members: FakeMemberStore, board: RecordingBoard, directory: RecordingDirectory) -> Fixture {
    let board = Arc::new(board);
    let directory = Arc::new(directory);
    let state = EffectorState {
        service_name: "gatehouse-test",
        members: Arc::new(members),
        board: Arc::clone(&board) as Arc<dyn AccessController>,
        directory: Arc::clone(&directory) as Arc<dyn DirectoryAccount>,
    };
    Fixture {
        state,
        board,
        directory,
    }
}

async fn post(app: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn change(change_type: &str, change_data: Value) -> Value {
    json!({"member_id": 7, "change_type": change_type, "change_data": change_data})
}

// ── Status effector ────────────────────────────────────────────

#[tokio::test]
async fn status_active_enables_account_and_adds_assigned_tags() {
    let members = FakeMemberStore {
        tags: vec![
            tag("T1", 111, TagStatus::Active),
            tag("T2", 222, TagStatus::Inactive),
        ],
        ..Default::default()
    };
    let f = fixture(members, RecordingBoard::default(), RecordingDirectory::default());

    let (status, body) = post(
        status_router(f.state.clone()),
        "/v1/change_status",
        change("status", json!({"membership_status": "active"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], json!(true));
    assert_eq!(f.directory.calls(), vec!["set_enabled alovelace true"]);
    // Only the currently-assigned (ACTIVE) tag is pushed.
    assert_eq!(f.board.ops(), vec![("add".to_string(), "T1".to_string())]);
}

#[tokio::test]
async fn status_lapsed_disables_account_and_removes_assigned_tags() {
    let members = FakeMemberStore {
        tags: vec![tag("T1", 111, TagStatus::Active)],
        ..Default::default()
    };
    let f = fixture(members, RecordingBoard::default(), RecordingDirectory::default());

    let (status, _) = post(
        status_router(f.state.clone()),
        "/v1/change_status",
        change("status", json!({"membership_status": "expired"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(f.directory.calls(), vec!["set_enabled alovelace false"]);
    assert_eq!(f.board.ops(), vec![("remove".to_string(), "T1".to_string())]);
}

#[tokio::test]
async fn status_without_membership_status_is_rejected() {
    let f = fixture(
        FakeMemberStore::default(),
        RecordingBoard::default(),
        RecordingDirectory::default(),
    );

    let (status, _) = post(
        status_router(f.state.clone()),
        "/v1/change_status",
        change("status", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(f.directory.calls().is_empty());
}

#[tokio::test]
async fn status_directory_failure_yields_non_200_for_retry() {
    let f = fixture(
        FakeMemberStore::default(),
        RecordingBoard::default(),
        RecordingDirectory {
            fail: true,
            ..Default::default()
        },
    );

    let (status, body) = post(
        status_router(f.state.clone()),
        "/v1/change_status",
        change("status", json!({"membership_status": "active"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("directory"));
}

#[tokio::test]
async fn status_board_failure_yields_non_200_for_retry() {
    let members = FakeMemberStore {
        tags: vec![tag("T1", 111, TagStatus::Active)],
        ..Default::default()
    };
    let f = fixture(
        members,
        RecordingBoard {
            fail: true,
            ..Default::default()
        },
        RecordingDirectory::default(),
    );

    let (status, _) = post(
        status_router(f.state.clone()),
        "/v1/change_status",
        change("status", json!({"membership_status": "active"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn status_change_is_idempotent() {
    let members = FakeMemberStore {
        tags: vec![tag("T1", 111, TagStatus::Active)],
        ..Default::default()
    };
    let f = fixture(members, RecordingBoard::default(), RecordingDirectory::default());
    let body = change("status", json!({"membership_status": "active"}));

    let (first, _) = post(status_router(f.state.clone()), "/v1/change_status", body.clone()).await;
    let ops_after_first = f.board.ops();
    let (second, _) = post(status_router(f.state.clone()), "/v1/change_status", body).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);
    // Same operations both times: replay converges to the same state.
    assert_eq!(f.board.ops()[ops_after_first.len()..], ops_after_first[..]);
    assert_eq!(f.directory.calls(), vec![
        "set_enabled alovelace true",
        "set_enabled alovelace true",
    ]);
}

// ── Access effector ────────────────────────────────────────────

#[tokio::test]
async fn access_active_member_applies_dual_key_rule() {
    let members = FakeMemberStore {
        tags: vec![
            tag("T1", 111, TagStatus::Active),
            tag("T2", 222, TagStatus::Inactive),
        ],
        ..Default::default()
    };
    let f = fixture(members, RecordingBoard::default(), RecordingDirectory::default());

    let (status, body) = post(
        access_router(f.state.clone()),
        "/v1/change_access",
        change("access", json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], json!(true));
    assert_eq!(
        f.board.ops(),
        vec![
            ("add".to_string(), "T1".to_string()),
            ("remove".to_string(), "T2".to_string()),
        ]
    );
}

#[tokio::test]
async fn access_inactive_member_removes_every_tag() {
    let members = FakeMemberStore {
        status: "suspended".into(),
        tags: vec![
            tag("T1", 111, TagStatus::Active),
            tag("T2", 222, TagStatus::Inactive),
        ],
        ..Default::default()
    };
    let f = fixture(members, RecordingBoard::default(), RecordingDirectory::default());

    let (status, _) = post(
        access_router(f.state.clone()),
        "/v1/change_access",
        change("access", json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        f.board.ops(),
        vec![
            ("remove".to_string(), "T1".to_string()),
            ("remove".to_string(), "T2".to_string()),
        ]
    );
}

#[tokio::test]
async fn access_with_no_tags_still_succeeds() {
    let f = fixture(
        FakeMemberStore::default(),
        RecordingBoard::default(),
        RecordingDirectory::default(),
    );

    let (status, body) = post(
        access_router(f.state.clone()),
        "/v1/change_access",
        change("access", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], json!(true));
    assert!(f.board.ops().is_empty());
}

#[tokio::test]
async fn access_unknown_member_is_not_found() {
    let f = fixture(
        FakeMemberStore::default(),
        RecordingBoard::default(),
        RecordingDirectory::default(),
    );

    let (status, _) = post(
        access_router(f.state.clone()),
        "/v1/change_access",
        json!({"member_id": 9, "change_type": "access", "change_data": {}}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Identity effector ──────────────────────────────────────────

#[tokio::test]
async fn identity_change_syncs_authorization_groups() {
    let f = fixture(
        FakeMemberStore::default(),
        RecordingBoard::default(),
        RecordingDirectory::default(),
    );

    let (status, _) = post(
        identity_router(f.state.clone()),
        "/v1/change_identity",
        change("identity", json!(["members", "woodshop"])),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        f.directory.calls(),
        vec!["sync_groups alovelace members,woodshop"]
    );
}

#[tokio::test]
async fn identity_change_with_null_data_clears_groups() {
    let f = fixture(
        FakeMemberStore::default(),
        RecordingBoard::default(),
        RecordingDirectory::default(),
    );

    let (status, _) = post(
        identity_router(f.state.clone()),
        "/v1/change_identity",
        change("identity", Value::Null),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(f.directory.calls(), vec!["sync_groups alovelace "]);
}

#[tokio::test]
async fn identity_without_directory_username_is_rejected() {
    let members = FakeMemberStore {
        identity: MemberIdentity {
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            directory_username: None,
            extra: Default::default(),
        },
        ..Default::default()
    };
    let f = fixture(members, RecordingBoard::default(), RecordingDirectory::default());

    let (status, _) = post(
        identity_router(f.state.clone()),
        "/v1/change_identity",
        change("identity", json!(["members"])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(f.directory.calls().is_empty());
}

// ── Health ─────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_service_name() {
    let f = fixture(
        FakeMemberStore::default(),
        RecordingBoard::default(),
        RecordingDirectory::default(),
    );

    let response = status_router(f.state.clone())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "gatehouse-test");
}

//! Directory worker: translates bus operations into tenant calls.

pub mod graph;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Local;
use serde_json::{json, Value};
use thiserror::Error;

use gatehouse_bus::{MessageHandler, QueueMessage, ReplyStatus};
use gatehouse_core::ops::{DirectoryOp, OpOutcome};

use crate::board::outcome_reply;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Rejected(String),
}

/// The tenant operations the worker needs. The production implementation
/// is [`graph::GraphDirectory`].
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    async fn set_enabled(&self, username: &str, enabled: bool) -> Result<(), DirectoryError>;
    async fn groups(&self, username: &str) -> Result<Vec<String>, DirectoryError>;
    async fn add_group(&self, username: &str, group: &str) -> Result<(), DirectoryError>;
    async fn remove_group(&self, username: &str, group: &str) -> Result<(), DirectoryError>;
}

pub struct DirectoryHandler<C> {
    client: C,
}

impl<C: DirectoryClient> DirectoryHandler<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub async fn handle_op(&self, op: &DirectoryOp) -> OpOutcome {
        match op {
            DirectoryOp::SetEnabled { username, enabled } => {
                tracing::info!(username, enabled, "setting account enabled flag");
                match self.client.set_enabled(username, *enabled).await {
                    Ok(()) => OpOutcome::success(json!({
                        "username": username,
                        "enabled": enabled,
                    })),
                    Err(e) => OpOutcome::failure(e.to_string()),
                }
            }
            DirectoryOp::AddGroup { username, group } => {
                tracing::info!(username, group, "adding account to group");
                match self.client.add_group(username, group).await {
                    Ok(()) => OpOutcome::success(json!({
                        "username": username,
                        "group": group,
                    })),
                    Err(e) => OpOutcome::failure(e.to_string()),
                }
            }
            DirectoryOp::RemoveGroup { username, group } => {
                tracing::info!(username, group, "removing account from group");
                match self.client.remove_group(username, group).await {
                    Ok(()) => OpOutcome::success(json!({
                        "username": username,
                        "group": group,
                    })),
                    Err(e) => OpOutcome::failure(e.to_string()),
                }
            }
            DirectoryOp::SyncGroups { username, groups } => {
                self.sync_groups(username, groups).await
            }
            DirectoryOp::GetDatetime => OpOutcome::success(json!({
                "current_time": Local::now().to_rfc3339(),
            })),
        }
    }

    /// Reconciles the account's group membership against the desired set:
    /// missing groups are added, surplus groups are removed, the rest are
    /// untouched. Replaying the same desired set is a no-op.
    async fn sync_groups(&self, username: &str, desired: &[String]) -> OpOutcome {
        let current: HashSet<String> = match self.client.groups(username).await {
            Ok(groups) => groups.into_iter().collect(),
            Err(e) => return OpOutcome::failure(e.to_string()),
        };
        let desired: HashSet<String> = desired.iter().cloned().collect();

        let mut added: Vec<&String> = desired.difference(&current).collect();
        let mut removed: Vec<&String> = current.difference(&desired).collect();
        added.sort();
        removed.sort();

        tracing::info!(
            username,
            add = added.len(),
            remove = removed.len(),
            "reconciling directory groups"
        );

        for group in &added {
            if let Err(e) = self.client.add_group(username, group).await {
                return OpOutcome::failure(e.to_string());
            }
        }
        for group in &removed {
            if let Err(e) = self.client.remove_group(username, group).await {
                return OpOutcome::failure(e.to_string());
            }
        }

        OpOutcome::success(json!({
            "username": username,
            "added": added,
            "removed": removed,
        }))
    }
}

#[async_trait]
impl<C: DirectoryClient> MessageHandler for DirectoryHandler<C> {
    async fn handle(&self, message: &QueueMessage) -> (ReplyStatus, Value) {
        let outcome = match serde_json::from_value::<DirectoryOp>(message.payload.clone()) {
            Ok(op) => self.handle_op(&op).await,
            Err(e) => OpOutcome::failure(format!("unknown operation: {e}")),
        };
        outcome_reply(outcome)
    }
}

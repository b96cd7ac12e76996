//! Bus-backed implementation of the `DirectoryAccount` port.

use std::path::Path;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;

use gatehouse_bus::BusProducer;
use gatehouse_core::ops::DirectoryOp;
use gatehouse_core::ports::{DirectoryAccount, Result};
use gatehouse_core::GatehouseError;

pub struct BusDirectoryAccount {
    producer: BusProducer,
    timeout: Duration,
}

impl BusDirectoryAccount {
    pub fn open(root: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        let producer = BusProducer::open(root).map_err(|e| anyhow!(e))?;
        Ok(Self { producer, timeout })
    }

    async fn perform(&self, op: DirectoryOp) -> Result<()> {
        let payload = serde_json::to_value(&op).map_err(|e| anyhow!(e))?;
        let reply = self
            .producer
            .request(&payload, self.timeout)
            .await
            .map_err(|e| GatehouseError::Bus(e.to_string()))?;
        if !reply.is_success() {
            return Err(GatehouseError::Directory(format!(
                "directory operation failed: {}",
                reply.data
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DirectoryAccount for BusDirectoryAccount {
    async fn set_enabled(&self, username: &str, enabled: bool) -> Result<()> {
        tracing::info!(username, enabled, "setting directory account enabled flag");
        self.perform(DirectoryOp::SetEnabled {
            username: username.to_string(),
            enabled,
        })
        .await
    }

    async fn sync_groups(&self, username: &str, groups: &[String]) -> Result<()> {
        tracing::info!(username, count = groups.len(), "syncing directory groups");
        self.perform(DirectoryOp::SyncGroups {
            username: username.to_string(),
            groups: groups.to_vec(),
        })
        .await
    }
}

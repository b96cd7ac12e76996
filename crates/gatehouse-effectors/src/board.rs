//! Bus-backed implementation of the `AccessController` port.
//!
//! The effector containers cannot reach the physical board; every tag
//! operation becomes a correlated bus request to the board worker. A
//! reply timeout surfaces as an error so the enclosing change stays
//! unprocessed and is retried with a fresh message id.

use std::path::Path;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;

use gatehouse_bus::BusProducer;
use gatehouse_core::member::MemberTag;
use gatehouse_core::ops::BoardOp;
use gatehouse_core::ports::{AccessController, Result};
use gatehouse_core::GatehouseError;

pub struct BusAccessController {
    producer: BusProducer,
    timeout: Duration,
}

impl BusAccessController {
    pub fn open(root: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        let producer = BusProducer::open(root).map_err(|e| anyhow!(e))?;
        Ok(Self { producer, timeout })
    }

    async fn perform(&self, op: BoardOp) -> Result<()> {
        let payload = serde_json::to_value(&op).map_err(|e| anyhow!(e))?;
        let reply = self
            .producer
            .request(&payload, self.timeout)
            .await
            .map_err(|e| GatehouseError::Bus(e.to_string()))?;
        if !reply.is_success() {
            return Err(GatehouseError::Board(format!(
                "board operation failed: {}",
                reply.data
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl AccessController for BusAccessController {
    async fn add_tag(&self, tag: &MemberTag) -> Result<()> {
        tracing::info!(tag = %tag.tag, "adding tag to access controller");
        self.perform(BoardOp::Add {
            tag_id: tag.tag.clone(),
            converted_tag: tag.converted_tag,
        })
        .await
    }

    async fn remove_tag(&self, tag: &MemberTag) -> Result<()> {
        tracing::info!(tag = %tag.tag, "removing tag from access controller");
        self.perform(BoardOp::Remove {
            tag_id: tag.tag.clone(),
            converted_tag: tag.converted_tag,
        })
        .await
    }
}

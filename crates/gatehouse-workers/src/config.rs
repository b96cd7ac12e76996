//! Worker configuration, read from env vars.
//!
//! Shared:
//!   GATEHOUSE_STALE_CLAIM_SECS  age at which a leftover `processing/`
//!                               claim is requeued at startup (default: 300)
//!
//! Board worker:
//!   GATEHOUSE_BOARD_BUS_PATH    shared volume root (required)
//!   GATEHOUSE_BOARD_DEVICE_ID   controller serial number (required)
//!   GATEHOUSE_BOARD_ENDPOINT    controller UDP address, host:port (required)
//!
//! Directory worker:
//!   GATEHOUSE_DIRECTORY_BUS_PATH       shared volume root (required)
//!   GATEHOUSE_DIRECTORY_TENANT_ID      tenant id (required)
//!   GATEHOUSE_DIRECTORY_CLIENT_ID      app registration id (required)
//!   GATEHOUSE_DIRECTORY_CLIENT_SECRET  app secret (required)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use crate::directory::graph::GraphConfig;

#[derive(Debug, Clone)]
pub struct BoardWorkerConfig {
    pub bus_path: PathBuf,
    pub stale_after: Duration,
    pub device_id: u32,
    pub endpoint: SocketAddr,
}

impl BoardWorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            bus_path: required("GATEHOUSE_BOARD_BUS_PATH")?.into(),
            stale_after: stale_after()?,
            device_id: required("GATEHOUSE_BOARD_DEVICE_ID")?
                .parse()
                .context("GATEHOUSE_BOARD_DEVICE_ID must be an integer")?,
            endpoint: required("GATEHOUSE_BOARD_ENDPOINT")?
                .parse()
                .context("GATEHOUSE_BOARD_ENDPOINT must be host:port")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryWorkerConfig {
    pub bus_path: PathBuf,
    pub stale_after: Duration,
    pub graph: GraphConfig,
}

impl DirectoryWorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            bus_path: required("GATEHOUSE_DIRECTORY_BUS_PATH")?.into(),
            stale_after: stale_after()?,
            graph: GraphConfig {
                tenant_id: required("GATEHOUSE_DIRECTORY_TENANT_ID")?,
                client_id: required("GATEHOUSE_DIRECTORY_CLIENT_ID")?,
                client_secret: required("GATEHOUSE_DIRECTORY_CLIENT_SECRET")?,
            },
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    std::env::var(key).with_context(|| format!("{key} must be set"))
}

fn stale_after() -> anyhow::Result<Duration> {
    match std::env::var("GATEHOUSE_STALE_CLAIM_SECS") {
        Ok(v) => Ok(Duration::from_secs(
            v.parse()
                .context("GATEHOUSE_STALE_CLAIM_SECS must be an integer")?,
        )),
        Err(_) => Ok(Duration::from_secs(300)),
    }
}

//! Effector service configuration, read from env vars:
//!
//!   GATEHOUSE_DATABASE_URL        Postgres connection string (required)
//!   GATEHOUSE_BOARD_BUS_PATH      shared volume root for the board worker (required)
//!   GATEHOUSE_DIRECTORY_BUS_PATH  shared volume root for the directory worker (required)
//!   GATEHOUSE_BIND_ADDR           listen address (default per service)
//!   GATEHOUSE_BUS_TIMEOUT_SECS    reply wait before a sub-call fails (default: 10)

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct EffectorConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub board_bus_path: PathBuf,
    pub directory_bus_path: PathBuf,
    pub bus_timeout: Duration,
}

impl EffectorConfig {
    pub fn from_env(default_bind: &str) -> anyhow::Result<Self> {
        let database_url = std::env::var("GATEHOUSE_DATABASE_URL")
            .context("GATEHOUSE_DATABASE_URL must be set")?;
        let board_bus_path = std::env::var("GATEHOUSE_BOARD_BUS_PATH")
            .context("GATEHOUSE_BOARD_BUS_PATH must be set")?
            .into();
        let directory_bus_path = std::env::var("GATEHOUSE_DIRECTORY_BUS_PATH")
            .context("GATEHOUSE_DIRECTORY_BUS_PATH must be set")?
            .into();
        let bind_addr =
            std::env::var("GATEHOUSE_BIND_ADDR").unwrap_or_else(|_| default_bind.into());
        let bus_timeout = match std::env::var("GATEHOUSE_BUS_TIMEOUT_SECS") {
            Ok(v) => Duration::from_secs(
                v.parse()
                    .context("GATEHOUSE_BUS_TIMEOUT_SECS must be an integer")?,
            ),
            Err(_) => gatehouse_bus::DEFAULT_REPLY_TIMEOUT,
        };

        Ok(Self {
            database_url,
            bind_addr,
            board_bus_path,
            directory_bus_path,
            bus_timeout,
        })
    }
}

//! Dispatcher configuration, read from the environment at startup.
//!
//!   GATEHOUSE_DATABASE_URL        Postgres connection string (required)
//!   GATEHOUSE_WATCH_CHANNEL       notification channel (default: member_changes)
//!   GATEHOUSE_BATCH_SIZE          max rows per fetch (default: 100)
//!   GATEHOUSE_POLL_INTERVAL_SECS  retained for compatibility; the
//!                                 notification timeout covers lost wakeups
//!   GATEHOUSE_HTTP_TIMEOUT_SECS   effector client timeout (default: 30)
//!   GATEHOUSE_HOLD_FAILED_MEMBERS hold later rows for a member whose
//!                                 earlier row failed this pass (default: false)
//!   GATEHOUSE_MAX_ATTEMPTS        stop redispatching a row after this many
//!                                 in-process failures (default: unlimited)

use std::time::Duration;

use anyhow::{bail, Context};

use crate::DispatchPolicy;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub database_url: String,
    pub watch_channel: String,
    pub batch_size: i64,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
    pub policy: DispatchPolicy,
}

impl DispatcherConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("GATEHOUSE_DATABASE_URL")
            .context("GATEHOUSE_DATABASE_URL must be set")?;
        let watch_channel = std::env::var("GATEHOUSE_WATCH_CHANNEL")
            .unwrap_or_else(|_| "member_changes".into());

        let batch_size: i64 = env_parsed("GATEHOUSE_BATCH_SIZE", 100)?;
        if batch_size <= 0 {
            bail!("GATEHOUSE_BATCH_SIZE must be positive");
        }
        let poll_interval = Duration::from_secs(env_parsed("GATEHOUSE_POLL_INTERVAL_SECS", 60)?);
        let http_timeout = Duration::from_secs(env_parsed("GATEHOUSE_HTTP_TIMEOUT_SECS", 30)?);

        let hold_failed_members = std::env::var("GATEHOUSE_HOLD_FAILED_MEMBERS")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let max_attempts = match std::env::var("GATEHOUSE_MAX_ATTEMPTS") {
            Ok(v) => Some(
                v.parse::<u32>()
                    .context("GATEHOUSE_MAX_ATTEMPTS must be an integer")?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            database_url,
            watch_channel,
            batch_size,
            poll_interval,
            http_timeout,
            policy: DispatchPolicy {
                hold_failed_members,
                max_attempts,
            },
        })
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{key} has an invalid value: {v}")),
        Err(_) => Ok(default),
    }
}

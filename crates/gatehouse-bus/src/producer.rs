//! Producer side: atomic publish into `pending/` plus correlated reply
//! polling.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use uuid::Uuid;

use crate::message::{BusReply, QueueMessage};
use crate::{unix_now, BusDirs, BusError};

/// How long a producer waits for a reply before reporting failure. The
/// message may still be processed later; the caller is expected to retry
/// the enclosing change with a fresh id.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Reply poll cadence.
pub const REPLY_POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct BusProducer {
    dirs: BusDirs,
    poll_interval: Duration,
}

impl BusProducer {
    /// Opens a producer over `root`, creating the bus directories if they
    /// do not exist yet.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, BusError> {
        Ok(Self {
            dirs: BusDirs::create(root.as_ref())?,
            poll_interval: REPLY_POLL_INTERVAL,
        })
    }

    /// Shrinks the reply poll cadence. Tests use this; production keeps
    /// the default.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Stages the message in the scratch area, fsyncs, and atomically
    /// renames it into `pending/`. Returns the minted message id.
    pub fn send(&self, payload: &Value) -> Result<String, BusError> {
        let id = Uuid::new_v4().to_string();
        let message = QueueMessage {
            id: id.clone(),
            payload: payload.clone(),
            timestamp: unix_now(),
        };

        let tmp_path = self.dirs.root.join(format!(".tmp_{id}"));
        let final_path = self.dirs.pending.join(format!("{id}.json"));

        let bytes = serde_json::to_vec(&message).map_err(|source| BusError::Malformed {
            path: final_path.clone(),
            source,
        })?;

        let mut file = File::create(&tmp_path)?;
        file.write_all(&bytes)?;
        file.flush()?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &final_path)?;
        tracing::debug!(id = %id, "bus message published");
        Ok(id)
    }

    /// Polls `responses/{id}.json` until it appears or `timeout` expires.
    /// The response file is deleted after a successful read.
    pub async fn await_reply(&self, id: &str, timeout: Duration) -> Result<BusReply, BusError> {
        let resp_path = self.dirs.responses.join(format!("{id}.json"));
        let deadline = Instant::now() + timeout;

        loop {
            if resp_path.exists() {
                let bytes = fs::read(&resp_path)?;
                fs::remove_file(&resp_path)?;
                let reply: BusReply =
                    serde_json::from_slice(&bytes).map_err(|source| BusError::Malformed {
                        path: resp_path.clone(),
                        source,
                    })?;
                tracing::debug!(id = %id, status = ?reply.status, "bus reply received");
                return Ok(reply);
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::error!(id = %id, ?timeout, "timed out waiting for bus reply");
                return Err(BusError::ReplyTimeout {
                    id: id.to_string(),
                    timeout,
                });
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    /// Send then await the correlated reply.
    pub async fn request(&self, payload: &Value, timeout: Duration) -> Result<BusReply, BusError> {
        let id = self.send(payload)?;
        self.await_reply(&id, timeout).await
    }
}

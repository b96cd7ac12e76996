//! Consumer side: FIFO claim via atomic rename, reply publication, and the
//! stale-claim recovery sweep.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde_json::Value;

use crate::message::{BusReply, QueueMessage, ReplyStatus};
use crate::{BusDirs, BusError};

/// How long the run loop sleeps when `pending/` is empty.
const IDLE_SLEEP: Duration = Duration::from_millis(100);

/// What a worker does with one claimed message. The returned value lands
/// in the reply's `status` and `data` fields; the consumer fills in the
/// correlation envelope.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &QueueMessage) -> (ReplyStatus, Value);
}

/// A message this consumer owns, i.e. successfully renamed into
/// `processing/`.
#[derive(Debug)]
pub struct ClaimedMessage {
    pub message: QueueMessage,
    processing_path: PathBuf,
}

impl ClaimedMessage {
    pub fn id(&self) -> &str {
        &self.message.id
    }
}

pub struct BusConsumer {
    dirs: BusDirs,
    idle_sleep: Duration,
}

impl BusConsumer {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, BusError> {
        Ok(Self {
            dirs: BusDirs::create(root.as_ref())?,
            idle_sleep: IDLE_SLEEP,
        })
    }

    pub fn with_idle_sleep(mut self, idle_sleep: Duration) -> Self {
        self.idle_sleep = idle_sleep;
        self
    }

    /// Moves files stuck under `processing/` back to `pending/`. A file is
    /// stuck when its owner crashed between claim and reply; modification
    /// time older than `older_than` is the heuristic. Run once at startup,
    /// before the poll loop. Returns how many files were requeued.
    pub fn recover_stale(&self, older_than: Duration) -> Result<usize, BusError> {
        let now = SystemTime::now();
        let mut requeued = 0;

        for entry in fs::read_dir(&self.dirs.processing)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
                continue;
            };
            let age = now.duration_since(modified).unwrap_or_default();
            if age < older_than {
                continue;
            }

            let Some(file_name) = path.file_name() else {
                continue;
            };
            let target = self.dirs.pending.join(file_name);
            match fs::rename(&path, &target) {
                Ok(()) => {
                    tracing::warn!(file = %path.display(), ?age, "requeued stale claim");
                    requeued += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(requeued)
    }

    /// Claims the oldest pending message. Listing is sorted by modification
    /// time ascending; the rename into `processing/` is the claim, so a
    /// `NotFound` rename means another consumer won the race and the next
    /// candidate is tried.
    pub fn claim_next(&self) -> Result<Option<ClaimedMessage>, BusError> {
        let mut candidates: Vec<(PathBuf, SystemTime)> = Vec::new();
        for entry in fs::read_dir(&self.dirs.pending)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            candidates.push((path, modified));
        }
        candidates.sort_by_key(|(_, modified)| *modified);

        for (path, _) in candidates {
            let Some(file_name) = path.file_name() else {
                continue;
            };
            let processing_path = self.dirs.processing.join(file_name);

            match fs::rename(&path, &processing_path) {
                Ok(()) => {
                    let bytes = fs::read(&processing_path)?;
                    match serde_json::from_slice::<QueueMessage>(&bytes) {
                        Ok(message) => {
                            tracing::debug!(id = %message.id, "claimed bus message");
                            return Ok(Some(ClaimedMessage {
                                message,
                                processing_path,
                            }));
                        }
                        Err(source) => {
                            // A file that cannot be parsed would be
                            // requeued forever; drop it and report.
                            let _ = fs::remove_file(&processing_path);
                            return Err(BusError::Malformed {
                                path: processing_path,
                                source,
                            });
                        }
                    }
                }
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    /// Publishes the reply for a claimed message (stage, fsync, atomic
    /// rename into `responses/`) and deletes the claim.
    pub fn respond(&self, claimed: &ClaimedMessage, reply: &BusReply) -> Result<(), BusError> {
        let id = claimed.id();
        let tmp_path = self.dirs.root.join(format!(".tmp_resp_{id}"));
        let final_path = self.dirs.responses.join(format!("{id}.json"));

        let bytes = serde_json::to_vec(reply).map_err(|source| BusError::Malformed {
            path: final_path.clone(),
            source,
        })?;

        let mut file = File::create(&tmp_path)?;
        file.write_all(&bytes)?;
        file.flush()?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp_path, &final_path)?;

        fs::remove_file(&claimed.processing_path)?;
        tracing::debug!(id = %id, status = ?reply.status, "bus reply published");
        Ok(())
    }

    /// The worker loop: claim, handle, reply, forever. Errors are logged
    /// and the loop continues; a wedged message never takes the worker
    /// down with it.
    pub async fn run(&self, handler: &dyn MessageHandler) {
        tracing::info!(root = %self.dirs.root.display(), "bus consumer started");
        loop {
            match self.claim_next() {
                Ok(Some(claimed)) => {
                    tracing::info!(id = %claimed.id(), "processing bus message");
                    let (status, data) = handler.handle(&claimed.message).await;
                    let reply = BusReply {
                        original_id: claimed.id().to_string(),
                        result: format!("processed {}", claimed.id()),
                        status,
                        data,
                    };
                    if let Err(e) = self.respond(&claimed, &reply) {
                        tracing::error!(id = %claimed.id(), error = %e, "failed to publish reply");
                    }
                }
                Ok(None) => tokio::time::sleep(self.idle_sleep).await,
                Err(e) => {
                    tracing::error!(error = %e, "bus claim failed");
                    tokio::time::sleep(self.idle_sleep).await;
                }
            }
        }
    }
}

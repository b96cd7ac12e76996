//! gatehouse-bus — correlated request/reply over a shared filesystem.
//!
//! Some workers run in containers that cannot reach the physical access
//! controller or the directory tenant; exactly one host-attached process
//! can. This crate brokers between them with nothing but JSON files and
//! POSIX rename semantics:
//!
//! - a producer stages `{root}/.tmp_{id}`, fsyncs, then renames into
//!   `{root}/pending/{id}.json` so a consumer never sees a partial file;
//! - a consumer claims the oldest pending file by renaming it into
//!   `{root}/processing/` (whichever consumer renames first owns it),
//!   handles it, and publishes `{root}/responses/{id}.json` the same
//!   stage-then-rename way;
//! - the producer polls for the response named by its message id.
//!
//! Delivery is at-least-once: a consumer crash leaves the claim under
//! `processing/`, and [`BusConsumer::recover_stale`] moves such leftovers
//! back to `pending/` at the next startup. No ordering is guaranteed
//! across unrelated messages.

mod consumer;
mod message;
mod producer;

pub use consumer::{BusConsumer, ClaimedMessage, MessageHandler};
pub use message::{BusReply, QueueMessage, ReplyStatus};
pub use producer::{BusProducer, DEFAULT_REPLY_TIMEOUT, REPLY_POLL_INTERVAL};

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus i/o: {0}")]
    Io(#[from] io::Error),

    #[error("no reply for message {id} within {timeout:?}")]
    ReplyTimeout { id: String, timeout: Duration },

    #[error("malformed bus file {path}: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub(crate) const PENDING_DIR: &str = "pending";
pub(crate) const PROCESSING_DIR: &str = "processing";
pub(crate) const RESPONSES_DIR: &str = "responses";

/// The four locations under a bus root. The root itself doubles as the
/// scratch area for staged writes.
#[derive(Debug, Clone)]
pub(crate) struct BusDirs {
    pub root: PathBuf,
    pub pending: PathBuf,
    pub processing: PathBuf,
    pub responses: PathBuf,
}

impl BusDirs {
    pub fn create(root: &Path) -> io::Result<Self> {
        let dirs = Self {
            root: root.to_path_buf(),
            pending: root.join(PENDING_DIR),
            processing: root.join(PROCESSING_DIR),
            responses: root.join(RESPONSES_DIR),
        };
        std::fs::create_dir_all(&dirs.pending)?;
        std::fs::create_dir_all(&dirs.processing)?;
        std::fs::create_dir_all(&dirs.responses)?;
        Ok(dirs)
    }
}

pub(crate) fn unix_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

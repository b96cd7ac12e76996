//! Board worker: translates bus operations into controller calls.

pub mod uhppote;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use serde_json::{json, Value};
use thiserror::Error;

use gatehouse_bus::{MessageHandler, QueueMessage, ReplyStatus};
use gatehouse_core::ops::{BoardOp, OpOutcome, OpStatus};

/// How many times a timed-out device call is reissued before the
/// operation is reported failed.
const DEVICE_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("device timeout")]
    Timeout,

    #[error("device i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Protocol(String),
}

/// The controller operations the worker needs. The production
/// implementation is [`uhppote::UhppoteDriver`].
#[async_trait]
pub trait BoardDriver: Send + Sync {
    async fn put_card(&self, card: u32) -> Result<(), DriverError>;
    async fn delete_card(&self, card: u32) -> Result<(), DriverError>;
    async fn get_time(&self) -> Result<NaiveDateTime, DriverError>;
    async fn set_time(&self, when: NaiveDateTime) -> Result<(), DriverError>;
}

pub struct BoardHandler<D> {
    driver: D,
    max_attempts: u32,
}

impl<D: BoardDriver> BoardHandler<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            max_attempts: DEVICE_ATTEMPTS,
        }
    }

    pub async fn handle_op(&self, op: &BoardOp) -> OpOutcome {
        match op {
            BoardOp::Add {
                tag_id,
                converted_tag,
            } => {
                let Ok(card) = u32::try_from(*converted_tag) else {
                    return OpOutcome::failure(format!(
                        "converted tag {converted_tag} out of card range"
                    ));
                };
                tracing::info!(tag = %tag_id, card, "adding card to board");
                match self.retrying(|| self.driver.put_card(card)).await {
                    Ok(()) => OpOutcome::success(json!({
                        "operation": "add",
                        "tag_id": tag_id,
                        "converted_tag": converted_tag,
                    })),
                    Err(e) => OpOutcome::failure(e.to_string()),
                }
            }
            BoardOp::Remove {
                tag_id,
                converted_tag,
            } => {
                let Ok(card) = u32::try_from(*converted_tag) else {
                    return OpOutcome::failure(format!(
                        "converted tag {converted_tag} out of card range"
                    ));
                };
                tracing::info!(tag = %tag_id, card, "removing card from board");
                match self.retrying(|| self.driver.delete_card(card)).await {
                    Ok(()) => OpOutcome::success(json!({
                        "operation": "remove",
                        "tag_id": tag_id,
                        "converted_tag": converted_tag,
                    })),
                    Err(e) => OpOutcome::failure(e.to_string()),
                }
            }
            BoardOp::SetDatetime => {
                let now = Local::now().naive_local();
                tracing::info!(%now, "setting board clock");
                match self.retrying(|| self.driver.set_time(now)).await {
                    Ok(()) => OpOutcome::success(json!({
                        "message": format!("date and time set to {}", now.format("%Y-%m-%d %H:%M:%S")),
                    })),
                    Err(e) => OpOutcome::failure(e.to_string()),
                }
            }
            BoardOp::GetDatetime => match self.retrying(|| self.driver.get_time()).await {
                Ok(when) => OpOutcome::success(json!({
                    "current_time": when.format("%Y-%m-%d %H:%M:%S").to_string(),
                })),
                Err(e) => OpOutcome::failure(e.to_string()),
            },
        }
    }

    /// Reissues a device call after a timeout, up to the attempt budget.
    /// Other driver errors fail immediately.
    async fn retrying<T, Fut>(&self, mut call: impl FnMut() -> Fut) -> Result<T, DriverError>
    where
        Fut: std::future::Future<Output = Result<T, DriverError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match call().await {
                Err(DriverError::Timeout) if attempt < self.max_attempts => {
                    tracing::warn!(attempt, "device timeout, retrying");
                }
                other => return other,
            }
        }
    }
}

pub(crate) fn outcome_reply(outcome: OpOutcome) -> (ReplyStatus, Value) {
    let status = match outcome.status {
        OpStatus::Success => ReplyStatus::Success,
        OpStatus::Failure => ReplyStatus::Failure,
    };
    let data = serde_json::to_value(&outcome)
        .unwrap_or_else(|_| json!({"status": "failure", "error": "unencodable outcome"}));
    (status, data)
}

#[async_trait]
impl<D: BoardDriver> MessageHandler for BoardHandler<D> {
    async fn handle(&self, message: &QueueMessage) -> (ReplyStatus, Value) {
        let outcome = match serde_json::from_value::<BoardOp>(message.payload.clone()) {
            Ok(op) => self.handle_op(&op).await,
            Err(e) => OpOutcome::failure(format!("unknown operation: {e}")),
        };
        outcome_reply(outcome)
    }
}

//! gatehouse-dispatcher — the single consumer of the change log.
//!
//! The engine in this crate is deliberately oblivious to effector
//! semantics: it resolves a change type through the routing table, POSTs
//! the payload, records the verdict in the attempt log, and flips
//! `processed` only on HTTP 200. Everything it touches is behind the core
//! port traits, so the whole per-row protocol is testable without
//! Postgres or a network.

pub mod config;
pub mod effector;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use gatehouse_core::change::{
    AttemptRecord, ChangeEnvelope, ChangeRow, DispatchPayload,
    RESPONSE_CODE_TRANSPORT_FAILURE, RESPONSE_CODE_UNDISPATCHABLE,
};
use gatehouse_core::ports::{AttemptStore, ChangeStore, Result, RouteStore};

use crate::effector::EffectorClient;

/// Policy knobs beyond the batch size. Both default to the source
/// behavior: no per-member serialization, unlimited retries.
#[derive(Debug, Clone, Default)]
pub struct DispatchPolicy {
    /// When set, a row for a member that already failed in the current
    /// pass is skipped, so changes for one member apply in order even
    /// across a failure. Off by default: a failed row does not starve
    /// later rows.
    pub hold_failed_members: bool,
    /// When set, a row that has failed this many times in this process is
    /// no longer dispatched until restart. The attempt log keeps the
    /// history either way.
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
}

enum RowOutcome {
    Processed,
    Failed,
    Skipped,
}

pub struct Dispatcher {
    changes: Arc<dyn ChangeStore>,
    routes: Arc<dyn RouteStore>,
    attempts: Arc<dyn AttemptStore>,
    effector: Arc<dyn EffectorClient>,
    batch_size: i64,
    policy: DispatchPolicy,
    // Failures per change id, in-process only. Single dispatcher, no
    // await while locked.
    failure_counts: Mutex<HashMap<i64, u32>>,
}

impl Dispatcher {
    pub fn new(
        changes: Arc<dyn ChangeStore>,
        routes: Arc<dyn RouteStore>,
        attempts: Arc<dyn AttemptStore>,
        effector: Arc<dyn EffectorClient>,
        batch_size: i64,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            changes,
            routes,
            attempts,
            effector,
            batch_size,
            policy,
            failure_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Startup/reconnect path: report the backlog, then drain it. Runs
    /// before the caller subscribes to notifications, so rows that
    /// accumulated during downtime go out first, in id order.
    pub async fn resume(&self) -> Result<PassSummary> {
        let backlog = self.changes.count_unprocessed().await?;
        if backlog == 0 {
            tracing::info!("no unprocessed rows found");
            return Ok(PassSummary::default());
        }
        tracing::info!(backlog, "resuming unprocessed rows");
        let summary = self.run_pass().await?;
        tracing::info!(processed = summary.processed, "resume complete");
        Ok(summary)
    }

    /// One fetch-and-process pass over the backlog: batches of at most
    /// `batch_size`, ascending id, paginated by the last id seen so a
    /// failing row is not refetched within the same pass. Ends when a
    /// fetch comes back short.
    ///
    /// Store errors abort the pass and bubble up to trigger a reconnect;
    /// effector failures only mark the row for retry.
    pub async fn run_pass(&self) -> Result<PassSummary> {
        let mut summary = PassSummary::default();
        let mut held_members: HashSet<i64> = HashSet::new();
        let mut last_id = 0;

        loop {
            let rows = self
                .changes
                .fetch_unprocessed(last_id, self.batch_size)
                .await?;
            if rows.is_empty() {
                break;
            }
            let fetched = rows.len();
            tracing::debug!(count = fetched, after_id = last_id, "fetched batch");
            last_id = rows.last().map(|r| r.id).unwrap_or(last_id);

            for row in &rows {
                match self.process_row(row, &mut held_members).await? {
                    RowOutcome::Processed => summary.processed += 1,
                    RowOutcome::Failed => summary.failed += 1,
                    RowOutcome::Skipped => summary.skipped += 1,
                }
            }

            if fetched < self.batch_size as usize {
                break;
            }
        }
        Ok(summary)
    }

    async fn process_row(
        &self,
        row: &ChangeRow,
        held_members: &mut HashSet<i64>,
    ) -> Result<RowOutcome> {
        if self.exhausted(row.id) {
            tracing::warn!(id = row.id, "retry budget exhausted; skipping until restart");
            return Ok(RowOutcome::Skipped);
        }

        let envelope = match ChangeEnvelope::parse(&row.data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!(id = row.id, error = %e, "change row is not dispatchable");
                self.attempts
                    .append(&AttemptRecord {
                        change_id: row.id,
                        service_name: "dispatcher".into(),
                        endpoint: String::new(),
                        response_code: RESPONSE_CODE_UNDISPATCHABLE,
                        response_message: e.to_string(),
                    })
                    .await?;
                self.note_failure(row.id);
                return Ok(RowOutcome::Failed);
            }
        };

        if self.policy.hold_failed_members && held_members.contains(&envelope.member_id) {
            tracing::debug!(
                id = row.id,
                member_id = envelope.member_id,
                "holding row behind earlier failure for the same member"
            );
            return Ok(RowOutcome::Skipped);
        }

        let Some(route) = self.routes.resolve(&envelope.change).await? else {
            // New change types may land before their effector is
            // registered; the row waits for the operator, later rows
            // proceed.
            tracing::error!(
                id = row.id,
                change_type = %envelope.change,
                "no route for change type"
            );
            self.attempts
                .append(&AttemptRecord {
                    change_id: row.id,
                    service_name: envelope.change.clone(),
                    endpoint: String::new(),
                    response_code: RESPONSE_CODE_UNDISPATCHABLE,
                    response_message: format!("no route for change type '{}'", envelope.change),
                })
                .await?;
            return Ok(RowOutcome::Failed);
        };

        let payload = DispatchPayload::from_envelope(&envelope);
        tracing::info!(
            id = row.id,
            service = %route.name,
            endpoint = %route.endpoint,
            member_id = payload.member_id,
            "dispatching change"
        );

        match self.effector.dispatch(&route.endpoint, &payload).await {
            Ok(resp) if resp.code == 200 => {
                self.changes
                    .mark_processed(
                        row.id,
                        &AttemptRecord {
                            change_id: row.id,
                            service_name: route.name.clone(),
                            endpoint: route.endpoint.clone(),
                            response_code: i32::from(resp.code),
                            response_message: "Successfully processed.".into(),
                        },
                    )
                    .await?;
                self.clear_failures(row.id);
                tracing::info!(id = row.id, "change processed");
                Ok(RowOutcome::Processed)
            }
            Ok(resp) => {
                tracing::error!(id = row.id, code = resp.code, body = %resp.body, "effector rejected change");
                self.attempts
                    .append(&AttemptRecord {
                        change_id: row.id,
                        service_name: route.name.clone(),
                        endpoint: route.endpoint.clone(),
                        response_code: i32::from(resp.code),
                        response_message: resp.body,
                    })
                    .await?;
                self.note_failure(row.id);
                if self.policy.hold_failed_members {
                    held_members.insert(envelope.member_id);
                }
                Ok(RowOutcome::Failed)
            }
            Err(e) => {
                tracing::error!(id = row.id, error = %e, "effector unreachable");
                self.attempts
                    .append(&AttemptRecord {
                        change_id: row.id,
                        service_name: route.name.clone(),
                        endpoint: route.endpoint.clone(),
                        response_code: RESPONSE_CODE_TRANSPORT_FAILURE,
                        response_message: e.to_string(),
                    })
                    .await?;
                self.note_failure(row.id);
                if self.policy.hold_failed_members {
                    held_members.insert(envelope.member_id);
                }
                Ok(RowOutcome::Failed)
            }
        }
    }

    fn exhausted(&self, change_id: i64) -> bool {
        let Some(max) = self.policy.max_attempts else {
            return false;
        };
        let counts = self.failure_counts.lock().unwrap_or_else(|p| p.into_inner());
        counts.get(&change_id).copied().unwrap_or(0) >= max
    }

    fn note_failure(&self, change_id: i64) {
        if self.policy.max_attempts.is_none() {
            return;
        }
        let mut counts = self.failure_counts.lock().unwrap_or_else(|p| p.into_inner());
        *counts.entry(change_id).or_insert(0) += 1;
    }

    fn clear_failures(&self, change_id: i64) {
        if self.policy.max_attempts.is_none() {
            return;
        }
        let mut counts = self.failure_counts.lock().unwrap_or_else(|p| p.into_inner());
        counts.remove(&change_id);
    }
}

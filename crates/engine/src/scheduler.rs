// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduler tick loop: reconciles schedule entries and circuit
//! breakers against declared recurrences, then enqueues eligible jobs.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use rand::Rng;

use oj_core::breaker::{DEFAULT_FAILURE_THRESHOLD, DEFAULT_RESET_AFTER_SECS};
use oj_core::job::{Command, EnqueueRequest, JobStatus};
use oj_core::schedule::ScheduleEntryStatus;
use oj_core::EnqueueError;
use oj_storage::Storage;

use crate::error::ScheduleError;
use crate::hub::EventHub;
use crate::interval::parse_interval;
use crate::registry::PluginRegistry;
use crate::schedule_decl::ScheduleDecl;

/// Outstanding-jobs ceiling applied when no override is configured.
pub const DEFAULT_MAX_OUTSTANDING_POLLS: u32 = 1;

pub struct Scheduler {
    storage: Storage,
    registry: Arc<dyn PluginRegistry>,
    hub: Arc<EventHub>,
    service_name: String,
    failure_threshold: u32,
    reset_after_secs: i64,
    max_outstanding: u32,
    log_retention: Option<ChronoDuration>,
}

impl Scheduler {
    pub fn new(storage: Storage, registry: Arc<dyn PluginRegistry>, hub: Arc<EventHub>, service_name: impl Into<String>) -> Self {
        Self {
            storage,
            registry,
            hub,
            service_name: service_name.into(),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_after_secs: DEFAULT_RESET_AFTER_SECS,
            max_outstanding: DEFAULT_MAX_OUTSTANDING_POLLS,
            log_retention: None,
        }
    }

    pub fn with_max_outstanding(mut self, max_outstanding: u32) -> Self {
        self.max_outstanding = max_outstanding;
        self
    }

    pub fn with_log_retention(mut self, retention: ChronoDuration) -> Self {
        self.log_retention = Some(retention);
        self
    }

    /// Rewind orphaned `running` jobs left behind by an unclean shutdown.
    /// Call exactly once, before the tick loop starts.
    pub fn recover_orphans(&self) -> Result<(), ScheduleError> {
        for job in self.storage.find_jobs_by_status(JobStatus::Running)? {
            let new_attempt = job.attempt + 1;
            if new_attempt <= job.max_attempts {
                self.storage.update_job_for_recovery(&job.id, JobStatus::Queued, new_attempt, None, None)?;
            } else {
                self.storage.update_job_for_recovery(
                    &job.id,
                    JobStatus::Dead,
                    new_attempt,
                    None,
                    Some("recovered: attempts exhausted after crash"),
                )?;
            }
        }
        Ok(())
    }

    pub async fn run(&self, mut decls: Vec<ScheduleDecl>, tick_interval: Duration, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        decls.sort_by(|a, b| (a.plugin.as_str(), a.schedule_id.as_str()).cmp(&(b.plugin.as_str(), b.schedule_id.as_str())));

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
                _ = async {
                    if let Err(e) = self.tick(&decls).await {
                        tracing::warn!(error = %e, "scheduler tick failed");
                    }
                    tokio::time::sleep(tick_interval).await;
                } => {}
            }
        }
    }

    /// Run a single tick over every declared schedule, in
    /// `(plugin, schedule_id)` order.
    pub async fn tick(&self, decls: &[ScheduleDecl]) -> Result<(), ScheduleError> {
        let mut ordered: Vec<&ScheduleDecl> = decls.iter().collect();
        ordered.sort_by(|a, b| (a.plugin.as_str(), a.schedule_id.as_str()).cmp(&(b.plugin.as_str(), b.schedule_id.as_str())));

        self.hub.publish("scheduler.tick", serde_json::json!({"entries": ordered.len()}));

        for decl in ordered {
            self.tick_one(decl).await?;
        }

        if let Some(retention) = self.log_retention {
            self.storage.prune_job_logs(retention)?;
        }

        Ok(())
    }

    async fn tick_one(&self, decl: &ScheduleDecl) -> Result<(), ScheduleError> {
        let now = Utc::now();
        let command = decl.command.to_string();
        let mut entry = self.storage.get_schedule_entry_state(&decl.plugin, &decl.schedule_id, &command)?;

        if entry.status == ScheduleEntryStatus::PausedManual {
            self.skip(decl, "schedule_paused_manual");
            return Ok(());
        }

        if parse_interval(&decl.every).is_none() {
            entry.pause_invalid("invalid_schedule_interval", now);
            self.storage.upsert_schedule_entry_state(&entry)?;
            self.skip(decl, "invalid_schedule_interval");
            return Ok(());
        }

        if decl.command == Command::Handle {
            entry.pause_invalid("scheduled_handle_disallowed", now);
            self.storage.upsert_schedule_entry_state(&entry)?;
            self.skip(decl, "scheduled_handle_disallowed");
            return Ok(());
        }

        let supported = self.registry.get(&decl.plugin).map(|spec| spec.supports(decl.command)).unwrap_or(false);
        if !supported {
            entry.pause_invalid("command_not_supported", now);
            self.storage.upsert_schedule_entry_state(&entry)?;
            self.skip(decl, "command_not_supported");
            return Ok(());
        }

        if entry.status == ScheduleEntryStatus::PausedInvalid {
            entry.reactivate(now);
            self.storage.upsert_schedule_entry_state(&entry)?;
        }

        self.reconcile_breaker(decl, &command, now)?;

        let mut breaker = self.storage.get_circuit_breaker(&decl.plugin, &command)?;
        if breaker.should_skip(self.reset_after_secs, now) {
            self.storage.upsert_circuit_breaker(&breaker)?;
            self.skip(decl, "circuit_open");
            return Ok(());
        }
        self.storage.upsert_circuit_breaker(&breaker)?;

        let outstanding = self.storage.count_outstanding_jobs(&decl.plugin, decl.command)?;
        if outstanding >= self.max_outstanding {
            self.skip(decl, "outstanding_limit");
            return Ok(());
        }

        if let Some(jitter) = decl.jitter.as_deref().and_then(parse_interval) {
            let wait_ms = rand::thread_rng().gen_range(0..=jitter.as_millis() as u64);
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
        }

        self.enqueue_one(decl)?;
        Ok(())
    }

    fn reconcile_breaker(&self, decl: &ScheduleDecl, command: &str, now: chrono::DateTime<Utc>) -> Result<(), ScheduleError> {
        let Some(latest) = self.storage.latest_completed_command_result(&decl.plugin, decl.command, &self.service_name)? else {
            return Ok(());
        };

        let mut breaker = self.storage.get_circuit_breaker(&decl.plugin, command)?;
        if breaker.last_job_id.as_ref() == Some(&latest.id) {
            return Ok(());
        }

        let prior_state = breaker.state;
        let succeeded = latest.status == JobStatus::Succeeded;
        breaker.record_outcome(succeeded, latest.id.clone(), self.failure_threshold, now);
        self.storage.upsert_circuit_breaker(&breaker)?;

        if breaker.state != prior_state {
            self.hub.publish(
                "scheduler.circuit_state_changed",
                serde_json::json!({"plugin": decl.plugin, "command": command, "state": breaker.state.to_string()}),
            );
        }
        Ok(())
    }

    fn enqueue_one(&self, decl: &ScheduleDecl) -> Result<(), ScheduleError> {
        let req = EnqueueRequest::new(decl.plugin.clone(), decl.command, self.service_name.clone())
            .payload(decl.payload.clone())
            .dedupe_key(decl.dedupe_key())
            .max_attempts(decl.max_attempts);

        match self.storage.enqueue(req) {
            Ok(job_id) => {
                self.hub.publish(
                    "scheduler.scheduled",
                    serde_json::json!({"plugin": decl.plugin, "command": decl.command.to_string(), "schedule_id": decl.schedule_id, "job_id": job_id.as_str()}),
                );
                Ok(())
            }
            Err(EnqueueError::DedupeDrop { existing_job_id }) => {
                self.hub.publish(
                    "scheduler.skipped",
                    serde_json::json!({"plugin": decl.plugin, "schedule_id": decl.schedule_id, "reason": "dedupe", "existing_job_id": existing_job_id.as_str()}),
                );
                Ok(())
            }
            Err(EnqueueError::AlreadyRouted { .. }) => Ok(()),
            Err(EnqueueError::InvalidRequest(message)) => {
                tracing::warn!(plugin = %decl.plugin, schedule_id = %decl.schedule_id, %message, "scheduler enqueue rejected");
                Ok(())
            }
            Err(EnqueueError::Storage(e)) => Err(e.into()),
        }
    }

    fn skip(&self, decl: &ScheduleDecl, reason: &str) {
        self.hub.publish(
            "scheduler.skipped",
            serde_json::json!({"plugin": decl.plugin, "schedule_id": decl.schedule_id, "command": decl.command.to_string(), "reason": reason}),
        );
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identity, status lifecycle, and the plugin command set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event_context::EventContextId;

crate::define_id! {
    /// Unique identifier for a persisted job.
    pub struct JobId;
}

/// Default number of attempts a job gets before it is marked `dead`.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Default dedupe TTL: a `succeeded` job with a given `dedupe_key` keeps
/// suppressing new enqueues for this long after it completed.
pub const DEFAULT_DEDUPE_TTL_SECS: i64 = 24 * 60 * 60;

/// The command a plugin invocation executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Poll,
    Handle,
    Health,
    Init,
}

crate::simple_display! {
    Command {
        Poll => "poll",
        Handle => "handle",
        Health => "health",
        Init => "init",
    }
}

impl Command {
    /// Parse a command from its wire/config string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "poll" => Some(Self::Poll),
            "handle" => Some(Self::Handle),
            "health" => Some(Self::Health),
            "init" => Some(Self::Init),
            _ => None,
        }
    }

    /// Default per-command timeout, before any plugin-level override.
    pub fn default_timeout_secs(self) -> u64 {
        match self {
            Command::Poll => 60,
            Command::Handle => 120,
            Command::Health => 10,
            Command::Init => 30,
        }
    }
}

/// Terminal-or-not status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    TimedOut,
    Dead,
}

crate::simple_display! {
    JobStatus {
        Queued => "queued",
        Running => "running",
        Succeeded => "succeeded",
        Failed => "failed",
        TimedOut => "timed_out",
        Dead => "dead",
    }
}

impl JobStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            "timed_out" => Some(Self::TimedOut),
            "dead" => Some(Self::Dead),
            _ => None,
        }
    }

    /// Terminal statuses never transition further.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::TimedOut | Self::Dead)
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }
}

/// A single persisted unit of plugin work.
///
/// Mutated only through queue operations (`Enqueue`, `Dequeue`,
/// `CompleteWithResult`, `UpdateJobForRecovery`) — never edited in place
/// by callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub plugin: String,
    pub command: Command,
    pub payload: Value,
    pub status: JobStatus,
    pub attempt: u32,
    pub max_attempts: u32,
    pub submitted_by: String,
    pub dedupe_key: Option<String>,
    pub parent_job_id: Option<JobId>,
    pub source_event_id: Option<String>,
    pub event_context_id: Option<EventContextId>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl Job {
    /// `true` once `max_attempts` has been exhausted at the current attempt.
    pub fn attempts_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

/// Inputs accepted by `Queue::enqueue`.
#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub plugin: String,
    pub command: Command,
    pub payload: Value,
    pub submitted_by: String,
    pub max_attempts: Option<u32>,
    pub dedupe_key: Option<String>,
    pub parent_job_id: Option<JobId>,
    pub source_event_id: Option<String>,
    pub event_context_id: Option<EventContextId>,
}

impl EnqueueRequest {
    pub fn new(plugin: impl Into<String>, command: Command, submitted_by: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            command,
            payload: Value::Object(Default::default()),
            submitted_by: submitted_by.into(),
            max_attempts: None,
            dedupe_key: None,
            parent_job_id: None,
            source_event_id: None,
            event_context_id: None,
        }
    }

    crate::setters! {
        into { payload: Value }
        option { dedupe_key: String, source_event_id: String }
        set {
            max_attempts: Option<u32>,
            parent_job_id: Option<JobId>,
            event_context_id: Option<EventContextId>
        }
    }
}

/// An immutable completion record for one attempt of a job.
///
/// `id` is always `<job_id>-<attempt>`; a job that retries three times
/// accumulates three `JobLog` rows, one per attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLog {
    pub id: String,
    pub job_id: JobId,
    pub attempt: u32,
    pub status: JobStatus,
    pub result: Option<Value>,
    pub last_error: Option<String>,
    pub stderr: String,
    pub completed_at: DateTime<Utc>,
}

/// Byte cap applied to captured plugin stderr before it is persisted.
pub const STDERR_CAP_BYTES: usize = 64 * 1024;

/// Truncate `stderr` to [`STDERR_CAP_BYTES`] on a UTF-8 boundary.
pub fn truncate_stderr(stderr: &str) -> String {
    if stderr.len() <= STDERR_CAP_BYTES {
        return stderr.to_string();
    }
    let mut end = STDERR_CAP_BYTES;
    while end > 0 && !stderr.is_char_boundary(end) {
        end -= 1;
    }
    stderr[..end].to_string()
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;

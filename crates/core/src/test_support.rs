// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test builders shared by this crate's own tests and by downstream
//! crates via the `test-support` feature.

use chrono::Utc;
use serde_json::json;

use crate::job::{Command, Job, JobId, JobStatus};

/// Build a `Job` with sane defaults, overriding only what a test cares
/// about.
pub struct JobBuilder {
    plugin: String,
    command: Command,
    status: JobStatus,
    attempt: u32,
    max_attempts: u32,
}

impl Default for JobBuilder {
    fn default() -> Self {
        Self {
            plugin: "echo".to_string(),
            command: Command::Poll,
            status: JobStatus::Queued,
            attempt: 1,
            max_attempts: crate::job::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl JobBuilder {
    crate::setters! {
        into { plugin: String }
        set { command: Command, status: JobStatus, attempt: u32, max_attempts: u32 }
    }

    pub fn build(self) -> Job {
        let now = Utc::now();
        Job {
            id: JobId::new(),
            plugin: self.plugin,
            command: self.command,
            payload: json!({}),
            status: self.status,
            attempt: self.attempt,
            max_attempts: self.max_attempts,
            submitted_by: "test".to_string(),
            dedupe_key: None,
            parent_job_id: None,
            source_event_id: None,
            event_context_id: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            next_retry_at: None,
            last_error: None,
        }
    }
}

impl Job {
    pub fn builder() -> JobBuilder {
        JobBuilder::default()
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use oj_core::job::Command;

use crate::event::EventEnvelope;
use crate::PROTOCOL_VERSION;

/// The single JSON document written to a plugin's stdin for one
/// invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolRequest {
    pub protocol: i64,
    pub job_id: String,
    pub command: Command,
    pub config: Value,
    pub state: Value,
    pub context: Value,
    pub workspace_dir: String,
    pub deadline_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<EventEnvelope>,
}

impl ProtocolRequest {
    pub fn new(
        job_id: impl Into<String>,
        command: Command,
        config: Value,
        state: Value,
        context: Value,
        workspace_dir: impl Into<String>,
        deadline_at: DateTime<Utc>,
    ) -> Self {
        Self {
            protocol: PROTOCOL_VERSION,
            job_id: job_id.into(),
            command,
            config,
            state,
            context,
            workspace_dir: workspace_dir.into(),
            deadline_at,
            event: None,
        }
    }

    pub fn with_event(mut self, event: EventEnvelope) -> Self {
        self.event = Some(event);
        self
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;

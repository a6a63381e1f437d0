// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declared recurring invocations the scheduler ticks over.

use serde_json::Value;

use oj_core::job::Command;

/// A declared `(plugin, command)` recurrence.
#[derive(Debug, Clone)]
pub struct ScheduleDecl {
    pub plugin: String,
    pub schedule_id: String,
    pub command: Command,
    pub every: String,
    pub jitter: Option<String>,
    pub payload: Value,
    pub max_attempts: Option<u32>,
}

impl ScheduleDecl {
    pub fn new(plugin: impl Into<String>, schedule_id: impl Into<String>, command: Command, every: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            schedule_id: schedule_id.into(),
            command,
            every: every.into(),
            jitter: None,
            payload: Value::Object(Default::default()),
            max_attempts: None,
        }
    }

    pub fn dedupe_key(&self) -> String {
        format!("{}:{}:{}", self.plugin, self.command, self.schedule_id)
    }

    oj_core::setters! {
        into { payload: Value }
        option { jitter: String }
        set { max_attempts: Option<u32> }
    }
}

#[cfg(test)]
#[path = "schedule_decl_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::EventEnvelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

/// The single JSON document read from a plugin's stdout for one
/// invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolResponse {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_updates: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<EventEnvelope>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<LogEntry>>,
}

impl ProtocolResponse {
    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }

    /// `state_updates` only counts as present when it is a non-empty
    /// JSON object when non-empty.
    pub fn state_updates_object(&self) -> Option<&serde_json::Map<String, Value>> {
        match &self.state_updates {
            Some(Value::Object(map)) if !map.is_empty() => Some(map),
            _ => None,
        }
    }

    pub fn events(&self) -> &[EventEnvelope] {
        self.events.as_deref().unwrap_or(&[])
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;

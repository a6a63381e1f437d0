// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An event emitted by a plugin, or carried on a `handle` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedupe_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

impl EventEnvelope {
    /// Stamp a fresh id and timestamp if the plugin left them blank
    /// if the plugin omitted them.
    pub fn normalize(&mut self) {
        if self.event_id.as_deref().unwrap_or("").is_empty() {
            self.event_id = Some(uuid::Uuid::new_v4().to_string());
        }
        if self.timestamp.is_none() {
            self.timestamp = Some(Utc::now());
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;

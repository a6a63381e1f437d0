// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedule entry state: per-`(plugin, schedule_id)` activation status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleEntryStatus {
    Active,
    PausedManual,
    PausedInvalid,
}

crate::simple_display! {
    ScheduleEntryStatus {
        Active => "active",
        PausedManual => "paused_manual",
        PausedInvalid => "paused_invalid",
    }
}

impl ScheduleEntryStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "paused_manual" => Some(Self::PausedManual),
            "paused_invalid" => Some(Self::PausedInvalid),
            _ => None,
        }
    }
}

/// Durable activation state for a declared `(plugin, schedule_id)` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntryState {
    pub plugin: String,
    pub schedule_id: String,
    pub command: String,
    pub status: ScheduleEntryStatus,
    pub reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduleEntryState {
    pub fn active(plugin: impl Into<String>, schedule_id: impl Into<String>, command: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            plugin: plugin.into(),
            schedule_id: schedule_id.into(),
            command: command.into(),
            status: ScheduleEntryStatus::Active,
            reason: None,
            updated_at: now,
        }
    }

    pub fn pause_invalid(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        self.status = ScheduleEntryStatus::PausedInvalid;
        self.reason = Some(reason.into());
        self.updated_at = now;
    }

    pub fn reactivate(&mut self, now: DateTime<Utc>) {
        self.status = ScheduleEntryStatus::Active;
        self.reason = None;
        self.updated_at = now;
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;

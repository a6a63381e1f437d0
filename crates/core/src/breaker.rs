// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-`(plugin, command)` circuit breaker state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::JobId;

/// Default consecutive-failure count at which a breaker opens.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default cooldown before an open breaker moves to `half_open`.
pub const DEFAULT_RESET_AFTER_SECS: i64 = 5 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

crate::simple_display! {
    CircuitState {
        Closed => "closed",
        Open => "open",
        HalfOpen => "half_open",
    }
}

impl CircuitState {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "closed" => Some(Self::Closed),
            "open" => Some(Self::Open),
            "half_open" => Some(Self::HalfOpen),
            _ => None,
        }
    }
}

/// Failure-gate state for a `(plugin, command)` pair.
///
/// Invariant: in `Closed`, `opened_at` is `None`; in `Open`,
/// `opened_at` is `Some` and `failure_count >= threshold`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreaker {
    pub plugin: String,
    pub command: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub opened_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_job_id: Option<JobId>,
    pub updated_at: DateTime<Utc>,
}

impl CircuitBreaker {
    pub fn closed(plugin: impl Into<String>, command: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            plugin: plugin.into(),
            command: command.into(),
            state: CircuitState::Closed,
            failure_count: 0,
            opened_at: None,
            last_failure_at: None,
            last_job_id: None,
            updated_at: now,
        }
    }

    /// Apply a completed job's outcome.
    ///
    /// A success closes the breaker and resets the count; a failure
    /// increments the count and opens the breaker once `threshold` is
    /// reached.
    pub fn record_outcome(&mut self, succeeded: bool, job_id: JobId, threshold: u32, now: DateTime<Utc>) {
        self.last_job_id = Some(job_id);
        self.updated_at = now;
        if succeeded {
            self.state = CircuitState::Closed;
            self.failure_count = 0;
            self.opened_at = None;
        } else {
            self.failure_count += 1;
            self.last_failure_at = Some(now);
            if self.failure_count >= threshold {
                self.state = CircuitState::Open;
                self.opened_at = Some(now);
            }
        }
    }

    /// Cooldown elapsed since `opened_at`; moves the breaker to
    /// `half_open` in place and returns `true` when it is gateable
    /// (i.e. still open and within cooldown).
    pub fn should_skip(&mut self, reset_after_secs: i64, now: DateTime<Utc>) -> bool {
        match self.state {
            CircuitState::Open => {
                let elapsed = self.opened_at.map(|t| (now - t).num_seconds()).unwrap_or(0);
                if elapsed >= reset_after_secs {
                    self.state = CircuitState::HalfOpen;
                    self.updated_at = now;
                    false
                } else {
                    true
                }
            }
            CircuitState::Closed | CircuitState::HalfOpen => false,
        }
    }

    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.opened_at = None;
        self.updated_at = now;
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;

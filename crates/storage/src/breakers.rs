// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Circuit breaker state persistence, keyed by `(plugin, command)`.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use oj_core::breaker::CircuitState;
use oj_core::{CircuitBreaker, JobId, StorageError};

use crate::Storage;

impl Storage {
    /// Fetch the breaker for `(plugin, command)`, or a fresh closed one
    /// if none has been recorded yet.
    pub fn get_circuit_breaker(&self, plugin: &str, command: &str) -> Result<CircuitBreaker, StorageError> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT * FROM circuit_breakers WHERE plugin = ?1 AND command = ?2",
                params![plugin, command],
                breaker_from_row,
            )
            .optional()
            .map_err(|e| StorageError::Sqlite(e.to_string()))?;
        Ok(found.unwrap_or_else(|| CircuitBreaker::closed(plugin, command, Utc::now())))
    }

    pub fn upsert_circuit_breaker(&self, breaker: &CircuitBreaker) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO circuit_breakers
                (plugin, command, state, failure_count, opened_at, last_failure_at, last_job_id, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(plugin, command) DO UPDATE SET
                state = excluded.state,
                failure_count = excluded.failure_count,
                opened_at = excluded.opened_at,
                last_failure_at = excluded.last_failure_at,
                last_job_id = excluded.last_job_id,
                updated_at = excluded.updated_at",
            params![
                breaker.plugin,
                breaker.command,
                breaker.state.to_string(),
                breaker.failure_count,
                breaker.opened_at.map(|t| t.to_rfc3339()),
                breaker.last_failure_at.map(|t| t.to_rfc3339()),
                breaker.last_job_id.as_ref().map(|id| id.as_str().to_string()),
                breaker.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| StorageError::Sqlite(e.to_string()))?;
        Ok(())
    }

    pub fn reset_circuit_breaker(&self, plugin: &str, command: &str) -> Result<(), StorageError> {
        let mut breaker = self.get_circuit_breaker(plugin, command)?;
        breaker.reset(Utc::now());
        self.upsert_circuit_breaker(&breaker)
    }
}

fn breaker_from_row(row: &Row<'_>) -> rusqlite::Result<CircuitBreaker> {
    let state: String = row.get("state")?;
    let opened_at: Option<String> = row.get("opened_at")?;
    let last_failure_at: Option<String> = row.get("last_failure_at")?;
    let last_job_id: Option<String> = row.get("last_job_id")?;
    let updated_at: String = row.get("updated_at")?;

    let to_err = |e: StorageError| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e));
    let parse_ts = |s: &str| -> Result<DateTime<Utc>, StorageError> {
        DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc)).map_err(|e| StorageError::CorruptRow(e.to_string()))
    };

    Ok(CircuitBreaker {
        plugin: row.get("plugin")?,
        command: row.get("command")?,
        state: CircuitState::parse(&state)
            .ok_or_else(|| to_err(StorageError::CorruptRow(format!("unknown circuit state: {state}"))))?,
        failure_count: row.get("failure_count")?,
        opened_at: opened_at.map(|s| parse_ts(&s)).transpose().map_err(to_err)?,
        last_failure_at: last_failure_at.map(|s| parse_ts(&s)).transpose().map_err(to_err)?,
        last_job_id: last_job_id.map(JobId::from_string),
        updated_at: parse_ts(&updated_at).map_err(to_err)?,
    })
}

#[cfg(test)]
#[path = "breakers_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedule entry state persistence, keyed by `(plugin, schedule_id)`.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use oj_core::{ScheduleEntryState, StorageError};
use oj_core::schedule::ScheduleEntryStatus;

use crate::Storage;

impl Storage {
    /// Fetch a schedule entry's state, or a fresh `active` one if this
    /// entry has never been persisted.
    pub fn get_schedule_entry_state(
        &self,
        plugin: &str,
        schedule_id: &str,
        command: &str,
    ) -> Result<ScheduleEntryState, StorageError> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT * FROM schedule_entries WHERE plugin = ?1 AND schedule_id = ?2",
                params![plugin, schedule_id],
                schedule_entry_from_row,
            )
            .optional()
            .map_err(|e| StorageError::Sqlite(e.to_string()))?;
        Ok(found.unwrap_or_else(|| ScheduleEntryState::active(plugin, schedule_id, command, Utc::now())))
    }

    pub fn upsert_schedule_entry_state(&self, entry: &ScheduleEntryState) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO schedule_entries (plugin, schedule_id, command, status, reason, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(plugin, schedule_id) DO UPDATE SET
                command = excluded.command,
                status = excluded.status,
                reason = excluded.reason,
                updated_at = excluded.updated_at",
            params![
                entry.plugin,
                entry.schedule_id,
                entry.command,
                entry.status.to_string(),
                entry.reason,
                entry.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| StorageError::Sqlite(e.to_string()))?;
        Ok(())
    }
}

fn schedule_entry_from_row(row: &Row<'_>) -> rusqlite::Result<ScheduleEntryState> {
    let status: String = row.get("status")?;
    let updated_at: String = row.get("updated_at")?;

    let to_err = |e: StorageError| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e));
    let parse_ts = |s: &str| -> Result<DateTime<Utc>, StorageError> {
        DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc)).map_err(|e| StorageError::CorruptRow(e.to_string()))
    };

    Ok(ScheduleEntryState {
        plugin: row.get("plugin")?,
        schedule_id: row.get("schedule_id")?,
        command: row.get("command")?,
        status: ScheduleEntryStatus::parse(&status)
            .ok_or_else(|| to_err(StorageError::CorruptRow(format!("unknown schedule status: {status}"))))?,
        reason: row.get("reason")?,
        updated_at: parse_ts(&updated_at).map_err(to_err)?,
    })
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Table and index definitions.

use rusqlite::Connection;

use oj_core::StorageError;

pub(crate) fn migrate(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS job_queue (
            id               TEXT PRIMARY KEY,
            plugin           TEXT NOT NULL,
            command          TEXT NOT NULL,
            payload          TEXT NOT NULL,
            status           TEXT NOT NULL,
            attempt          INTEGER NOT NULL,
            max_attempts     INTEGER NOT NULL,
            submitted_by     TEXT NOT NULL,
            dedupe_key       TEXT,
            parent_job_id    TEXT,
            source_event_id  TEXT,
            event_context_id TEXT,
            created_at       TEXT NOT NULL,
            started_at       TEXT,
            completed_at     TEXT,
            next_retry_at    TEXT,
            last_error       TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_job_queue_status_created
            ON job_queue (status, created_at);
        CREATE INDEX IF NOT EXISTS idx_job_queue_plugin_command_status
            ON job_queue (plugin, command, status);
        CREATE INDEX IF NOT EXISTS idx_job_queue_dedupe_key
            ON job_queue (dedupe_key);
        CREATE INDEX IF NOT EXISTS idx_job_queue_parent
            ON job_queue (parent_job_id);
        CREATE UNIQUE INDEX IF NOT EXISTS uq_job_queue_parent_source_event
            ON job_queue (parent_job_id, source_event_id)
            WHERE source_event_id IS NOT NULL;

        CREATE TABLE IF NOT EXISTS job_log (
            id           TEXT PRIMARY KEY,
            job_id       TEXT NOT NULL,
            attempt      INTEGER NOT NULL,
            status       TEXT NOT NULL,
            result       TEXT,
            last_error   TEXT,
            stderr       TEXT NOT NULL,
            completed_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_job_log_job_id ON job_log (job_id);
        CREATE INDEX IF NOT EXISTS idx_job_log_completed_at ON job_log (completed_at);

        CREATE TABLE IF NOT EXISTS plugin_state (
            plugin TEXT PRIMARY KEY,
            state  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS event_context (
            id               TEXT PRIMARY KEY,
            parent_id        TEXT,
            pipeline_name    TEXT NOT NULL,
            step_id          TEXT NOT NULL,
            accumulated_json TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_event_context_parent ON event_context (parent_id);

        CREATE TABLE IF NOT EXISTS circuit_breakers (
            plugin          TEXT NOT NULL,
            command         TEXT NOT NULL,
            state           TEXT NOT NULL,
            failure_count   INTEGER NOT NULL,
            opened_at       TEXT,
            last_failure_at TEXT,
            last_job_id     TEXT,
            updated_at      TEXT NOT NULL,
            PRIMARY KEY (plugin, command)
        );

        CREATE TABLE IF NOT EXISTS schedule_entries (
            plugin      TEXT NOT NULL,
            schedule_id TEXT NOT NULL,
            command     TEXT NOT NULL,
            status      TEXT NOT NULL,
            reason      TEXT,
            updated_at  TEXT NOT NULL,
            PRIMARY KEY (plugin, schedule_id)
        );
        CREATE INDEX IF NOT EXISTS idx_schedule_entries_status ON schedule_entries (status);
        ",
    )
    .map_err(|e| StorageError::Sqlite(e.to_string()))
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;

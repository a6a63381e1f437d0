// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Row <-> domain type mapping shared by the store's operations.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde_json::Value;

use oj_core::job::{Command, JobStatus};
use oj_core::{EventContextId, Job, JobId, JobLog, StorageError};

pub(crate) fn parse_json(s: &str) -> Result<Value, StorageError> {
    serde_json::from_str(s).map_err(StorageError::from)
}

pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc)).map_err(|e| StorageError::CorruptRow(e.to_string()))
}

pub(crate) fn parse_command(s: &str) -> Result<Command, StorageError> {
    Command::parse(s).ok_or_else(|| StorageError::CorruptRow(format!("unknown command: {s}")))
}

pub(crate) fn parse_status(s: &str) -> Result<JobStatus, StorageError> {
    JobStatus::parse(s).ok_or_else(|| StorageError::CorruptRow(format!("unknown status: {s}")))
}

pub(crate) fn job_from_row(row: &Row<'_>) -> rusqlite::Result<Job> {
    let id: String = row.get("id")?;
    let plugin: String = row.get("plugin")?;
    let command: String = row.get("command")?;
    let payload: String = row.get("payload")?;
    let status: String = row.get("status")?;
    let attempt: u32 = row.get("attempt")?;
    let max_attempts: u32 = row.get("max_attempts")?;
    let submitted_by: String = row.get("submitted_by")?;
    let dedupe_key: Option<String> = row.get("dedupe_key")?;
    let parent_job_id: Option<String> = row.get("parent_job_id")?;
    let source_event_id: Option<String> = row.get("source_event_id")?;
    let event_context_id: Option<String> = row.get("event_context_id")?;
    let created_at: String = row.get("created_at")?;
    let started_at: Option<String> = row.get("started_at")?;
    let completed_at: Option<String> = row.get("completed_at")?;
    let next_retry_at: Option<String> = row.get("next_retry_at")?;
    let last_error: Option<String> = row.get("last_error")?;

    // Row values are our own serialized output; any corruption here is
    // a storage bug, not a caller error, so we surface it through
    // rusqlite's own error channel rather than threading StorageError
    // through this signature.
    let to_sqlite_err = |e: StorageError| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    };

    Ok(Job {
        id: JobId::from_string(id),
        plugin,
        command: parse_command(&command).map_err(to_sqlite_err)?,
        payload: parse_json(&payload).map_err(to_sqlite_err)?,
        status: parse_status(&status).map_err(to_sqlite_err)?,
        attempt,
        max_attempts,
        submitted_by,
        dedupe_key,
        parent_job_id: parent_job_id.map(JobId::from_string),
        source_event_id,
        event_context_id: event_context_id.map(EventContextId::from_string),
        created_at: parse_timestamp(&created_at).map_err(to_sqlite_err)?,
        started_at: started_at.map(|s| parse_timestamp(&s)).transpose().map_err(to_sqlite_err)?,
        completed_at: completed_at.map(|s| parse_timestamp(&s)).transpose().map_err(to_sqlite_err)?,
        next_retry_at: next_retry_at.map(|s| parse_timestamp(&s)).transpose().map_err(to_sqlite_err)?,
        last_error,
    })
}

pub(crate) fn job_log_from_row(row: &Row<'_>) -> rusqlite::Result<JobLog> {
    let id: String = row.get("id")?;
    let job_id: String = row.get("job_id")?;
    let attempt: u32 = row.get("attempt")?;
    let status: String = row.get("status")?;
    let result: Option<String> = row.get("result")?;
    let last_error: Option<String> = row.get("last_error")?;
    let stderr: String = row.get("stderr")?;
    let completed_at: String = row.get("completed_at")?;

    let to_sqlite_err = |e: StorageError| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    };

    Ok(JobLog {
        id,
        job_id: JobId::from_string(job_id),
        attempt,
        status: parse_status(&status).map_err(to_sqlite_err)?,
        result: result.map(|r| parse_json(&r)).transpose().map_err(to_sqlite_err)?,
        last_error,
        stderr,
        completed_at: parse_timestamp(&completed_at).map_err(to_sqlite_err)?,
    })
}

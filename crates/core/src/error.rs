// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared error taxonomy. Each variant describes *behavior*, not an
//! identifier: callers match on it to decide whether to surface the
//! error synchronously or fold it into job state.

use thiserror::Error;

use crate::job::JobId;

/// Errors raised by [`crate::job::EnqueueRequest`] validation and the
/// queue's dedupe/idempotency rules.
#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Dedupe suppressed the enqueue; callers treat this as success.
    #[error("dedupe drop: existing job {existing_job_id}")]
    DedupeDrop { existing_job_id: JobId },

    /// `(parent_job_id, source_event_id)` already has a row: the event
    /// was already routed, so this enqueue is a no-op for the caller.
    #[error("event already routed: job {existing_job_id}")]
    AlreadyRouted { existing_job_id: JobId },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// A lookup that found nothing.
#[derive(Debug, Error)]
#[error("job not found: {0}")]
pub struct JobNotFound(pub JobId);

/// Errors from the storage layer itself. Unrecoverable by the core —
/// the operator must intervene.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(String),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("row missing expected column: {0}")]
    MissingColumn(&'static str),
    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

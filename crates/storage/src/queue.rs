// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job queue: enqueue, claim, complete, and read back jobs and their
//! completion log. Every operation here is the sole contracted way to
//! mutate `job_queue` / `job_log` — callers never write those tables
//! directly.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};

use oj_core::job::{Command, EnqueueRequest, JobStatus, DEFAULT_DEDUPE_TTL_SECS, DEFAULT_MAX_ATTEMPTS};
use oj_core::{EnqueueError, Job, JobId, JobLog, JobNotFound, StorageError};

use crate::row::{job_from_row, job_log_from_row};
use crate::Storage;

/// Filter accepted by [`Storage::list_jobs`].
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub plugin: Option<String>,
    pub command: Option<Command>,
    pub status: Option<JobStatus>,
}

/// The transitive closure of a job's descendants, rooted at one job.
#[derive(Debug, Clone)]
pub struct JobTree {
    pub root_id: JobId,
    pub jobs: Vec<Job>,
}

/// Errors from a single-job lookup: either the row is missing, or the
/// store itself is unavailable.
#[derive(Debug, thiserror::Error)]
pub enum GetJobError {
    #[error(transparent)]
    NotFound(#[from] JobNotFound),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl JobTree {
    /// `true` once every job in the tree has reached a terminal status.
    pub fn is_complete(&self) -> bool {
        self.jobs.iter().all(|j| j.status.is_terminal())
    }
}

impl Storage {
    /// Create a new job, enforcing the dedupe and routing-idempotency
    /// rules. Returns the new job's id.
    pub fn enqueue(&self, req: EnqueueRequest) -> Result<JobId, EnqueueError> {
        if req.plugin.is_empty() || req.submitted_by.is_empty() {
            return Err(EnqueueError::InvalidRequest("plugin and submitted_by are required".into()));
        }

        let conn = self.conn.lock();

        if let Some(key) = &req.dedupe_key {
            let cutoff = (Utc::now() - Duration::seconds(DEFAULT_DEDUPE_TTL_SECS)).to_rfc3339();
            let existing: Option<String> = conn
                .query_row(
                    "SELECT id FROM job_queue
                     WHERE dedupe_key = ?1
                       AND (status IN ('queued', 'running')
                            OR (status = 'succeeded' AND completed_at >= ?2))
                     ORDER BY created_at DESC LIMIT 1",
                    params![key, cutoff],
                    |r| r.get(0),
                )
                .optional()
                .map_err(|e| StorageError::Sqlite(e.to_string()))?;
            if let Some(existing_id) = existing {
                return Err(EnqueueError::DedupeDrop { existing_job_id: JobId::from_string(existing_id) });
            }
        }

        let id = JobId::new();
        let now = Utc::now();
        let max_attempts = req.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);
        let payload = serde_json::to_string(&req.payload).map_err(StorageError::from)?;

        let result = conn.execute(
            "INSERT INTO job_queue
                (id, plugin, command, payload, status, attempt, max_attempts, submitted_by,
                 dedupe_key, parent_job_id, source_event_id, event_context_id, created_at)
             VALUES (?1, ?2, ?3, ?4, 'queued', 1, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                id.as_str(),
                req.plugin,
                req.command.to_string(),
                payload,
                max_attempts,
                req.submitted_by,
                req.dedupe_key,
                req.parent_job_id.as_ref().map(|p| p.as_str().to_string()),
                req.source_event_id,
                req.event_context_id.as_ref().map(|c| c.as_str().to_string()),
                now.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => Ok(id),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                let (parent_job_id, source_event_id) = match (&req.parent_job_id, &req.source_event_id) {
                    (Some(p), Some(s)) => (p.as_str().to_string(), s.clone()),
                    _ => return Err(StorageError::Sqlite(e.extended_code.to_string()).into()),
                };
                let existing_id: String = conn
                    .query_row(
                        "SELECT id FROM job_queue WHERE parent_job_id = ?1 AND source_event_id = ?2",
                        params![parent_job_id, source_event_id],
                        |r| r.get(0),
                    )
                    .map_err(|e| StorageError::Sqlite(e.to_string()))?;
                Err(EnqueueError::AlreadyRouted { existing_job_id: JobId::from_string(existing_id) })
            }
            Err(e) => Err(StorageError::Sqlite(e.to_string()).into()),
        }
    }

    /// Claim the single oldest eligible job, marking it `running`.
    /// Returns `None` when nothing is eligible.
    pub fn dequeue(&self) -> Result<Option<Job>, StorageError> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();

        let claimed: Option<String> = conn
            .query_row(
                "SELECT id FROM job_queue
                 WHERE status = 'queued' AND (next_retry_at IS NULL OR next_retry_at <= ?1)
                 ORDER BY created_at ASC, rowid ASC LIMIT 1",
                params![now],
                |r| r.get(0),
            )
            .optional()
            .map_err(|e| StorageError::Sqlite(e.to_string()))?;

        let Some(id) = claimed else { return Ok(None) };

        conn.execute(
            "UPDATE job_queue SET status = 'running', started_at = ?1 WHERE id = ?2",
            params![now, id],
        )
        .map_err(|e| StorageError::Sqlite(e.to_string()))?;

        let job = conn
            .query_row("SELECT * FROM job_queue WHERE id = ?1", params![id], job_from_row)
            .map_err(|e| StorageError::Sqlite(e.to_string()))?;
        Ok(Some(job))
    }

    /// Record a job's terminal outcome and append an immutable job-log row.
    pub fn complete_with_result(
        &self,
        job_id: &JobId,
        status: JobStatus,
        result: Option<&serde_json::Value>,
        last_error: Option<&str>,
        stderr: &str,
    ) -> Result<(), StorageError> {
        debug_assert!(status.is_terminal(), "complete_with_result requires a terminal status");

        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(|e| StorageError::Sqlite(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        let attempt: u32 = tx
            .query_row("SELECT attempt FROM job_queue WHERE id = ?1", params![job_id.as_str()], |r| r.get(0))
            .map_err(|e| StorageError::Sqlite(e.to_string()))?;

        tx.execute(
            "UPDATE job_queue SET status = ?1, completed_at = ?2, last_error = ?3 WHERE id = ?4",
            params![status.to_string(), now, last_error, job_id.as_str()],
        )
        .map_err(|e| StorageError::Sqlite(e.to_string()))?;

        let result_json = result.map(serde_json::to_string).transpose().map_err(StorageError::from)?;
        let truncated = oj_core::job::truncate_stderr(stderr);

        tx.execute(
            "INSERT INTO job_log (id, job_id, attempt, status, result, last_error, stderr, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                format!("{}-{}", job_id.as_str(), attempt),
                job_id.as_str(),
                attempt,
                status.to_string(),
                result_json,
                last_error,
                truncated,
                now,
            ],
        )
        .map_err(|e| StorageError::Sqlite(e.to_string()))?;

        tx.commit().map_err(|e| StorageError::Sqlite(e.to_string()))
    }

    /// Rewind an orphaned `running` job at startup, either back to
    /// `queued` for another attempt or to `dead` when attempts are exhausted.
    pub fn update_job_for_recovery(
        &self,
        job_id: &JobId,
        new_status: JobStatus,
        new_attempt: u32,
        next_retry_at: Option<DateTime<Utc>>,
        last_error: Option<&str>,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        let completed_at = new_status.is_terminal().then(|| Utc::now().to_rfc3339());
        conn.execute(
            "UPDATE job_queue
             SET status = ?1, attempt = ?2, next_retry_at = ?3, last_error = ?4, completed_at = ?5
             WHERE id = ?6",
            params![
                new_status.to_string(),
                new_attempt,
                next_retry_at.map(|t| t.to_rfc3339()),
                last_error,
                completed_at,
                job_id.as_str(),
            ],
        )
        .map_err(|e| StorageError::Sqlite(e.to_string()))?;
        Ok(())
    }

    pub fn find_jobs_by_status(&self, status: JobStatus) -> Result<Vec<Job>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT * FROM job_queue WHERE status = ?1 ORDER BY created_at ASC")
            .map_err(|e| StorageError::Sqlite(e.to_string()))?;
        let rows = stmt
            .query_map(params![status.to_string()], job_from_row)
            .map_err(|e| StorageError::Sqlite(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|e| StorageError::Sqlite(e.to_string()))
    }

    pub fn get_job_by_id(&self, job_id: &JobId) -> Result<Job, GetJobError> {
        let conn = self.conn.lock();
        conn.query_row("SELECT * FROM job_queue WHERE id = ?1", params![job_id.as_str()], job_from_row)
            .optional()
            .map_err(|e| StorageError::Sqlite(e.to_string()))?
            .ok_or_else(|| JobNotFound(job_id.clone()).into())
    }

    pub fn list_jobs(&self, filter: &JobFilter, limit: u32) -> Result<Vec<Job>, StorageError> {
        let conn = self.conn.lock();
        let mut sql = String::from("SELECT * FROM job_queue WHERE 1=1");
        let mut bound: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(plugin) = &filter.plugin {
            sql.push_str(" AND plugin = ?");
            bound.push(Box::new(plugin.clone()));
        }
        if let Some(command) = filter.command {
            sql.push_str(" AND command = ?");
            bound.push(Box::new(command.to_string()));
        }
        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            bound.push(Box::new(status.to_string()));
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ?");
        bound.push(Box::new(limit));

        let mut stmt = conn.prepare(&sql).map_err(|e| StorageError::Sqlite(e.to_string()))?;
        let params: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|b| b.as_ref()).collect();
        let rows = stmt
            .query_map(params.as_slice(), job_from_row)
            .map_err(|e| StorageError::Sqlite(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|e| StorageError::Sqlite(e.to_string()))
    }

    /// The transitive closure of `parent_job_id` links rooted at `root_id`.
    pub fn get_job_tree(&self, root_id: &JobId) -> Result<JobTree, StorageError> {
        let conn = self.conn.lock();
        let mut jobs = Vec::new();
        let root = conn
            .query_row("SELECT * FROM job_queue WHERE id = ?1", params![root_id.as_str()], job_from_row)
            .map_err(|e| StorageError::Sqlite(e.to_string()))?;
        jobs.push(root);

        let mut frontier = vec![root_id.as_str().to_string()];
        while !frontier.is_empty() {
            let mut next_frontier = Vec::new();
            for parent in &frontier {
                let mut stmt = conn
                    .prepare("SELECT * FROM job_queue WHERE parent_job_id = ?1")
                    .map_err(|e| StorageError::Sqlite(e.to_string()))?;
                let children = stmt
                    .query_map(params![parent], job_from_row)
                    .map_err(|e| StorageError::Sqlite(e.to_string()))?
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| StorageError::Sqlite(e.to_string()))?;
                for child in children {
                    next_frontier.push(child.id.as_str().to_string());
                    jobs.push(child);
                }
            }
            frontier = next_frontier;
        }

        Ok(JobTree { root_id: root_id.clone(), jobs })
    }

    pub fn count_outstanding_jobs(&self, plugin: &str, command: Command) -> Result<u32, StorageError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COUNT(*) FROM job_queue
             WHERE plugin = ?1 AND command = ?2 AND status IN ('queued', 'running')",
            params![plugin, command.to_string()],
            |r| r.get(0),
        )
        .map_err(|e| StorageError::Sqlite(e.to_string()))
    }

    /// Most recent terminal job for `(plugin, command, submitted_by)`,
    /// used by the scheduler to reconcile the circuit breaker.
    pub fn latest_completed_command_result(
        &self,
        plugin: &str,
        command: Command,
        submitted_by: &str,
    ) -> Result<Option<Job>, StorageError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT * FROM job_queue
             WHERE plugin = ?1 AND command = ?2 AND submitted_by = ?3
               AND status IN ('succeeded', 'failed', 'timed_out', 'dead')
             ORDER BY completed_at DESC LIMIT 1",
            params![plugin, command.to_string(), submitted_by],
            job_from_row,
        )
        .optional()
        .map_err(|e| StorageError::Sqlite(e.to_string()))
    }

    /// Fetch a job log row by id, if present. Used by the dispatcher's
    /// tests and admin inspection paths.
    pub fn get_job_log(&self, id: &str) -> Result<Option<JobLog>, StorageError> {
        let conn = self.conn.lock();
        conn.query_row("SELECT * FROM job_log WHERE id = ?1", params![id], job_log_from_row)
            .optional()
            .map_err(|e| StorageError::Sqlite(e.to_string()))
    }

    /// Delete job-log rows older than `retention`.
    pub fn prune_job_logs(&self, retention: Duration) -> Result<usize, StorageError> {
        let conn = self.conn.lock();
        let cutoff = (Utc::now() - retention).to_rfc3339();
        conn.execute("DELETE FROM job_log WHERE completed_at < ?1", params![cutoff])
            .map_err(|e| StorageError::Sqlite(e.to_string()))
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

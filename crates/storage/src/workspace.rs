// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The workspace interface: a per-job artifact directory handed to the
//! dispatcher by an external manager.
//!
//! The core never decides how a workspace is materialized on disk — it
//! only asks for one of three operations. Real implementations (plain
//! directories, git worktrees, ...) live outside this crate; we ship
//! [`NullWorkspace`] as the collaborator used when no workspace manager
//! is configured.

use std::path::PathBuf;

use oj_core::JobId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("workspace not found for job {0}")]
    NotFound(JobId),
    #[error("workspace backend error: {0}")]
    Backend(String),
}

/// A per-job working directory provider.
///
/// `clone_into` is used when a child job's workspace should start from
/// its parent's contents (two-hop pipeline steps handing off artifacts).
#[async_trait::async_trait]
pub trait Workspace: Send + Sync {
    /// Return the existing working directory for `job_id`, if one has
    /// already been created.
    async fn open(&self, job_id: &JobId) -> Result<Option<PathBuf>, WorkspaceError>;

    /// Create a fresh working directory for `job_id`.
    async fn create(&self, job_id: &JobId) -> Result<PathBuf, WorkspaceError>;

    /// Create `child_id`'s working directory seeded from `parent_id`'s.
    async fn clone_into(&self, parent_id: &JobId, child_id: &JobId) -> Result<PathBuf, WorkspaceError>;
}

/// A workspace manager that creates nothing: every job gets no working
/// directory. Used when the gateway runs without artifact handoff.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullWorkspace;

#[async_trait::async_trait]
impl Workspace for NullWorkspace {
    async fn open(&self, _job_id: &JobId) -> Result<Option<PathBuf>, WorkspaceError> {
        Ok(None)
    }

    async fn create(&self, job_id: &JobId) -> Result<PathBuf, WorkspaceError> {
        Err(WorkspaceError::NotFound(job_id.clone()))
    }

    async fn clone_into(&self, _parent_id: &JobId, child_id: &JobId) -> Result<PathBuf, WorkspaceError> {
        Err(WorkspaceError::NotFound(child_id.clone()))
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! oj-storage: the embedded relational store.
//!
//! A single SQLite database, opened with one serialized writer
//! connection, holds every durable table the gateway needs: jobs and
//! their completion log, plugin state, event context lineage, circuit
//! breakers, and schedule entry state. [`Storage`] is the sole
//! custodian of that database — every mutation goes through one of its
//! methods, each wrapped in its own transaction.

mod breakers;
mod contexts;
mod plugin_state;
mod queue;
mod row;
mod schedule;
mod schema;
pub mod workspace;

pub use queue::{GetJobError, JobFilter, JobTree};
pub use workspace::{NullWorkspace, Workspace, WorkspaceError};

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;

use oj_core::StorageError;

/// The embedded relational store.
///
/// Cheap to clone: every clone shares the same underlying connection
/// behind a mutex, which is how we enforce single-writer access
/// without any application-level locking around job state.
#[derive(Clone)]
pub struct Storage {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Storage {
    /// Open (or create) the database at `path`, applying pragmas and
    /// running migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|e| StorageError::Sqlite(e.to_string()))?;
        Self::configure(&conn)?;
        schema::migrate(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Open an in-memory database (tests, short-lived tools).
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|e| StorageError::Sqlite(e.to_string()))?;
        Self::configure(&conn)?;
        schema::migrate(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    fn configure(conn: &Connection) -> Result<(), StorageError> {
        conn.pragma_update(None, "journal_mode", "WAL").map_err(|e| StorageError::Sqlite(e.to_string()))?;
        conn.pragma_update(None, "foreign_keys", "ON").map_err(|e| StorageError::Sqlite(e.to_string()))?;
        conn.pragma_update(None, "busy_timeout", 5_000i64).map_err(|e| StorageError::Sqlite(e.to_string()))?;
        conn.pragma_update(None, "synchronous", "NORMAL").map_err(|e| StorageError::Sqlite(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! oj-core: shared domain types for the plugin orchestration gateway.
//!
//! This crate defines the data model that every other crate
//! builds on: job identity and lifecycle, event context lineage,
//! circuit breakers, schedule entries, and the dispatch/error
//! vocabulary the queue and router share. It has no storage or I/O
//! opinions of its own.

pub mod macros;

pub mod breaker;
pub mod dispatch;
pub mod error;
pub mod event_context;
pub mod id;
pub mod job;
pub mod schedule;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use breaker::{CircuitBreaker, CircuitState, DEFAULT_FAILURE_THRESHOLD, DEFAULT_RESET_AFTER_SECS};
pub use dispatch::Dispatch;
pub use error::{EnqueueError, JobNotFound, StorageError};
pub use event_context::{shallow_merge, EventContext, EventContextId};
pub use job::{
    truncate_stderr, Command, EnqueueRequest, Job, JobId, JobLog, JobStatus, DEFAULT_DEDUPE_TTL_SECS,
    DEFAULT_MAX_ATTEMPTS, STDERR_CAP_BYTES,
};
pub use schedule::{ScheduleEntryState, ScheduleEntryStatus};

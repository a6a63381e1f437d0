// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`Dispatch`]: the in-memory description of "enqueue this child job".

use serde_json::Value;

use crate::event_context::EventContextId;
use crate::job::{Command, JobId};

/// Produced by the router for each `uses` node an emitted event reaches.
///
/// Carries enough lineage for the dispatcher to create the child job,
/// a new event context, and (if configured) a cloned workspace.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub plugin: String,
    pub command: Command,
    /// The full event envelope, stored verbatim as the child job's
    /// payload so the dispatcher can decode it back into an event when
    /// the job runs.
    pub event: Value,
    /// Just the envelope's `payload` object, used to derive the child
    /// event context.
    pub event_payload: Value,
    pub pipeline_name: String,
    pub step_id: String,
    pub parent_job_id: JobId,
    pub parent_context_id: Option<EventContextId>,
    pub source_event_id: String,
}

impl Dispatch {
    /// The dedupe-free identity key used to collapse duplicate dispatches
    /// that the recursive `call` expansion may produce.
    pub fn dedupe_key(&self) -> (String, String, String, String, String) {
        (
            self.pipeline_name.clone(),
            self.step_id.clone(),
            self.plugin.clone(),
            self.command.to_string(),
            self.source_event_id.clone(),
        )
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;

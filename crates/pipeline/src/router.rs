// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Turns an emitted event into the set of child jobs it dispatches to.
//! `call` steps are already inlined into their caller's own node/edge
//! set at compile time, so every node this module reaches is a `uses`
//! node.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use oj_core::event_context::EventContextId;
use oj_core::job::JobId;
use oj_core::Dispatch;

use crate::compile::{CompiledPipeline, NodeKind};

/// One event to route: either a root trigger (no `source_pipeline`) or
/// a step completion inside a running pipeline.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub event_type: String,
    /// The full serialized event envelope (`type`, `payload`,
    /// `dedupe_key`, `source`, `timestamp`, `event_id`). Stored verbatim
    /// as a routed job's payload, so the dispatcher can later decode it
    /// back into an `EventEnvelope` when it runs that job.
    pub event: Value,
    /// Just the envelope's own `payload` object, used to derive the
    /// downstream event context (never the full envelope).
    pub event_payload: Value,
    pub event_id: String,
    pub source_pipeline: Option<String>,
    pub source_step_id: Option<String>,
    pub source_job_id: JobId,
    pub source_context_id: Option<EventContextId>,
}

/// An in-memory index over compiled pipelines, rebuilt whenever
/// pipeline declarations are (re)loaded.
#[derive(Debug, Default)]
pub struct Router {
    by_name: HashMap<String, CompiledPipeline>,
    by_trigger: HashMap<String, Vec<String>>,
}

impl Router {
    pub fn new(compiled: Vec<CompiledPipeline>) -> Self {
        let mut by_name = HashMap::new();
        let mut by_trigger: HashMap<String, Vec<String>> = HashMap::new();
        for pipeline in compiled {
            by_trigger.entry(pipeline.trigger.clone()).or_default().push(pipeline.name.clone());
            by_name.insert(pipeline.name.clone(), pipeline);
        }
        Self { by_name, by_trigger }
    }

    pub fn get_pipeline_by_name(&self, name: &str) -> Option<&CompiledPipeline> {
        self.by_name.get(name)
    }

    pub fn get_pipeline_by_trigger(&self, trigger: &str) -> Vec<&CompiledPipeline> {
        self.by_trigger
            .get(trigger)
            .map(|names| names.iter().filter_map(|n| self.by_name.get(n)).collect())
            .unwrap_or_default()
    }

    /// All dispatches this event produces, deduplicated by
    /// [`Dispatch::dedupe_key`].
    pub fn next(&self, req: &RouteRequest) -> Vec<Dispatch> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();

        match (&req.source_pipeline, &req.source_step_id) {
            (None, _) => {
                for pipeline in self.get_pipeline_by_trigger(&req.event_type) {
                    let mut visiting = HashSet::new();
                    for entry in &pipeline.entry_node_ids {
                        self.expand_node(pipeline, entry, req, &mut visiting, &mut out);
                    }
                }
            }
            (Some(pipeline_name), Some(step_id)) => {
                if let Some(pipeline) = self.by_name.get(pipeline_name) {
                    let mut visiting = HashSet::new();
                    for next_id in pipeline.successors(step_id) {
                        self.expand_node(pipeline, next_id, req, &mut visiting, &mut out);
                    }
                }
            }
            (Some(_), None) => {}
        }

        out.retain(|d| seen.insert(d.dedupe_key()));
        out
    }

    /// Dispatches reachable starting at `pipeline`'s own entry nodes,
    /// e.g. when explicitly triggering a named pipeline rather than
    /// routing a matched event type.
    pub fn get_entry_dispatches(&self, pipeline: &CompiledPipeline, req: &RouteRequest) -> Vec<Dispatch> {
        let mut out = Vec::new();
        let mut visiting = HashSet::new();
        for entry in &pipeline.entry_node_ids {
            self.expand_node(pipeline, entry, req, &mut visiting, &mut out);
        }
        out
    }

    fn expand_node(
        &self,
        pipeline: &CompiledPipeline,
        node_id: &str,
        req: &RouteRequest,
        visiting: &mut HashSet<(String, String)>,
        out: &mut Vec<Dispatch>,
    ) {
        let key = (pipeline.name.clone(), node_id.to_string());
        if !visiting.insert(key) {
            return;
        }

        let Some(node) = pipeline.node(node_id) else { return };
        let NodeKind::Uses(plugin) = &node.kind;
        out.push(Dispatch {
            plugin: plugin.clone(),
            command: oj_core::job::Command::Handle,
            event: req.event.clone(),
            event_payload: req.event_payload.clone(),
            pipeline_name: pipeline.name.clone(),
            step_id: node.id.clone(),
            parent_job_id: req.source_job_id.clone(),
            parent_context_id: req.source_context_id.clone(),
            source_event_id: req.event_id.clone(),
        });
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline declarations as parsed from YAML configuration.

use serde::{Deserialize, Serialize};

/// A single step in a pipeline's tree. Exactly one of four shapes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StepDecl {
    /// Run one plugin's `handle` command.
    Uses { uses: String },
    /// Substitute another pipeline's entry/terminal nodes at this point.
    Call { call: String },
    /// A sequential group: each step runs after the previous completes.
    Steps { steps: Vec<StepDecl> },
    /// A parallel fan-out: every branch starts from the same predecessors.
    Split { split: Vec<StepDecl> },
}

/// Whether a triggered pipeline run returns immediately or waits for
/// the whole job tree to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Async,
    Synchronous,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::Async
    }
}

oj_core::simple_display! {
    ExecutionMode {
        Async => "async",
        Synchronous => "synchronous",
    }
}

/// One named pipeline: an event trigger plus a tree of steps.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineDecl {
    pub name: String,
    pub trigger: String,
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    pub timeout: Option<u64>,
    pub steps: Vec<StepDecl>,
}

/// Parse a list of pipeline declarations from a single YAML document.
pub fn parse_decls(yaml: &str) -> Result<Vec<PipelineDecl>, serde_yaml::Error> {
    serde_yaml::from_str(yaml)
}

#[cfg(test)]
#[path = "decl_tests.rs"]
mod tests;

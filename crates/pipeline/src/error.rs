// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors raised while compiling pipeline declarations into DAGs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("duplicate pipeline name: {0}")]
    DuplicateName(String),

    #[error("pipeline {pipeline} has no steps")]
    EmptySteps { pipeline: String },

    #[error("pipeline {pipeline} calls unknown pipeline {called}")]
    UnknownCalledPipeline { pipeline: String, called: String },

    #[error("pipeline {0} has a cyclic step graph")]
    CyclicStepGraph(String),

    #[error("the cross-pipeline call graph has a cycle")]
    CyclicCallGraph,

    #[error("invalid pipeline YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! oj-pipeline: parses pipeline declarations into validated DAGs and
//! routes events through them.
//!
//! A [`decl::PipelineDecl`] is what operators author in YAML. Loading
//! it calls [`compile::compile_all`], which expands each step tree
//! into a [`compile::CompiledPipeline`] graph, fingerprints it, and
//! checks both the per-pipeline step graph and the cross-pipeline
//! `call` graph for cycles. A [`router::Router`] indexes the compiled
//! set by trigger and name and turns emitted events into
//! [`oj_core::Dispatch`]es, recursively expanding `call` nodes into
//! the called pipeline's own entry nodes.

pub mod compile;
pub mod decl;
pub mod error;
pub mod router;

pub use compile::{compile_all, CompiledPipeline, Edge, Node, NodeKind};
pub use decl::{parse_decls, ExecutionMode, PipelineDecl, StepDecl};
pub use error::CompileError;
pub use router::{RouteRequest, Router};

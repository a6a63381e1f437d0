// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compiles a list of [`PipelineDecl`]s into validated, fingerprinted
//! DAGs.

use std::collections::HashMap;

use petgraph::graph::DiGraph;
use petgraph::algo::toposort;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::decl::{ExecutionMode, PipelineDecl, StepDecl};
use crate::error::CompileError;

/// What a node does. A `call:` step never survives compilation as its
/// own node: the called pipeline's nodes are inlined at the call site,
/// so every node in a compiled graph runs a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Uses(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

/// A compiled, validated pipeline DAG, rebuilt in memory at load time.
#[derive(Debug, Clone)]
pub struct CompiledPipeline {
    pub name: String,
    pub trigger: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub entry_node_ids: Vec<String>,
    pub terminal_node_ids: Vec<String>,
    pub called_pipelines: Vec<String>,
    pub execution_mode: ExecutionMode,
    pub timeout: Option<u64>,
    pub fingerprint: String,
}

impl CompiledPipeline {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Node ids directly reachable from `id` via a declared edge.
    pub fn successors(&self, id: &str) -> Vec<&str> {
        self.edges.iter().filter(|e| e.from == id).map(|e| e.to.as_str()).collect()
    }
}

struct Builder<'a> {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    called_pipelines: Vec<String>,
    next_id: usize,
    compiled: &'a HashMap<String, CompiledPipeline>,
}

struct Segment {
    entries: Vec<String>,
    terminals: Vec<String>,
}

impl<'a> Builder<'a> {
    fn new(compiled: &'a HashMap<String, CompiledPipeline>) -> Self {
        Self { nodes: Vec::new(), edges: Vec::new(), called_pipelines: Vec::new(), next_id: 0, compiled }
    }

    fn fresh_id(&mut self) -> String {
        let id = format!("n{}", self.next_id);
        self.next_id += 1;
        id
    }

    fn expand_one(&mut self, step: &StepDecl) -> Segment {
        match step {
            StepDecl::Uses { uses } => {
                let id = self.fresh_id();
                self.nodes.push(Node { id: id.clone(), kind: NodeKind::Uses(uses.clone()) });
                Segment { entries: vec![id.clone()], terminals: vec![id] }
            }
            StepDecl::Call { call } => {
                self.called_pipelines.push(call.clone());
                // `compiled` holds every pipeline compiled so far, in call-graph
                // dependency order, so the callee is always already present.
                let callee = self.compiled.get(call).expect("called pipeline compiled before its callers");
                self.called_pipelines.extend(callee.called_pipelines.iter().cloned());
                self.inline(callee)
            }
            StepDecl::Steps { steps } => self.expand_sequence(steps),
            StepDecl::Split { split } => self.expand_split(split),
        }
    }

    /// Clone `callee`'s already-inlined node/edge set into this builder
    /// under fresh ids, so each call site gets its own independent copy
    /// (a pipeline called from two branches of a `split` runs twice).
    fn inline(&mut self, callee: &CompiledPipeline) -> Segment {
        let mut remap = HashMap::with_capacity(callee.nodes.len());
        for node in &callee.nodes {
            let new_id = self.fresh_id();
            remap.insert(node.id.clone(), new_id.clone());
            self.nodes.push(Node { id: new_id, kind: node.kind.clone() });
        }
        for edge in &callee.edges {
            self.edges.push(Edge { from: remap[&edge.from].clone(), to: remap[&edge.to].clone() });
        }
        let entries = callee.entry_node_ids.iter().map(|id| remap[id].clone()).collect();
        let terminals = callee.terminal_node_ids.iter().map(|id| remap[id].clone()).collect();
        Segment { entries, terminals }
    }

    fn expand_sequence(&mut self, steps: &[StepDecl]) -> Segment {
        let mut entries = Vec::new();
        let mut terminals = Vec::new();
        let mut prev_terminals: Vec<String> = Vec::new();

        for (i, step) in steps.iter().enumerate() {
            let seg = self.expand_one(step);
            if i == 0 {
                entries = seg.entries.clone();
            } else {
                for from in &prev_terminals {
                    for to in &seg.entries {
                        self.edges.push(Edge { from: from.clone(), to: to.clone() });
                    }
                }
            }
            prev_terminals = seg.terminals.clone();
            terminals = seg.terminals;
        }

        Segment { entries, terminals }
    }

    fn expand_split(&mut self, branches: &[StepDecl]) -> Segment {
        let mut entries = Vec::new();
        let mut terminals = Vec::new();
        for branch in branches {
            let seg = self.expand_one(branch);
            entries.extend(seg.entries);
            terminals.extend(seg.terminals);
        }
        Segment { entries, terminals }
    }
}

/// Compile every declaration in `decls` together, validating that
/// `call` targets resolve and both the per-pipeline step graph and the
/// cross-pipeline call graph are acyclic. Callees are compiled before
/// their callers so a `call:` step can inline the callee's already
/// compiled node/edge set in place.
pub fn compile_all(decls: &[PipelineDecl]) -> Result<Vec<CompiledPipeline>, CompileError> {
    let mut by_name = HashMap::new();
    for decl in decls {
        if by_name.insert(decl.name.clone(), decl).is_some() {
            return Err(CompileError::DuplicateName(decl.name.clone()));
        }
    }

    let mut direct_calls: HashMap<&str, Vec<String>> = HashMap::new();
    for decl in decls {
        let calls = collect_calls(&decl.steps);
        for called in &calls {
            if !by_name.contains_key(called.as_str()) {
                return Err(CompileError::UnknownCalledPipeline { pipeline: decl.name.clone(), called: called.clone() });
            }
        }
        direct_calls.insert(decl.name.as_str(), calls);
    }

    let order = call_graph_order(decls, &direct_calls)?;

    let mut compiled_by_name: HashMap<String, CompiledPipeline> = HashMap::with_capacity(decls.len());
    for name in &order {
        let decl = by_name[name.as_str()];
        let pipeline = compile_one(decl, &compiled_by_name)?;
        compiled_by_name.insert(decl.name.clone(), pipeline);
    }

    Ok(decls.iter().map(|d| compiled_by_name.remove(&d.name).expect("every declaration was compiled")).collect())
}

/// Every pipeline name referenced by a `call:` step, in declaration order.
fn collect_calls(steps: &[StepDecl]) -> Vec<String> {
    let mut out = Vec::new();
    collect_calls_into(steps, &mut out);
    out
}

fn collect_calls_into(steps: &[StepDecl], out: &mut Vec<String>) {
    for step in steps {
        match step {
            StepDecl::Uses { .. } => {}
            StepDecl::Call { call } => out.push(call.clone()),
            StepDecl::Steps { steps } => collect_calls_into(steps, out),
            StepDecl::Split { split } => collect_calls_into(split, out),
        }
    }
}

/// Topological order over the cross-pipeline call graph, callees
/// before callers, so compiling in this order always has the callee
/// already available to inline.
fn call_graph_order<'a>(decls: &'a [PipelineDecl], direct_calls: &HashMap<&str, Vec<String>>) -> Result<Vec<&'a str>, CompileError> {
    let mut graph = DiGraph::<&str, ()>::new();
    let mut indices = HashMap::new();
    for decl in decls {
        indices.insert(decl.name.as_str(), graph.add_node(decl.name.as_str()));
    }
    for decl in decls {
        for called in &direct_calls[decl.name.as_str()] {
            // edge callee -> caller: callee must come first in toposort order.
            graph.add_edge(indices[called.as_str()], indices[decl.name.as_str()], ());
        }
    }
    let order = toposort(&graph, None).map_err(|_| CompileError::CyclicCallGraph)?;
    Ok(order.into_iter().map(|idx| graph[idx]).collect())
}

fn compile_one(decl: &PipelineDecl, compiled_so_far: &HashMap<String, CompiledPipeline>) -> Result<CompiledPipeline, CompileError> {
    if decl.steps.is_empty() {
        return Err(CompileError::EmptySteps { pipeline: decl.name.clone() });
    }

    let mut builder = Builder::new(compiled_so_far);
    let root = builder.expand_sequence(&decl.steps);

    let mut nodes = builder.nodes;
    let mut edges = builder.edges;
    nodes.sort_by(|a, b| a.id.cmp(&b.id));
    edges.sort_by(|a, b| (a.from.clone(), a.to.clone()).cmp(&(b.from.clone(), b.to.clone())));
    edges.dedup();

    verify_node_graph_acyclic(&decl.name, &nodes, &edges)?;

    let mut entry_node_ids = root.entries;
    let mut terminal_node_ids = root.terminals;
    entry_node_ids.sort();
    entry_node_ids.dedup();
    terminal_node_ids.sort();
    terminal_node_ids.dedup();

    let mut called_pipelines = builder.called_pipelines;
    called_pipelines.sort();
    called_pipelines.dedup();

    let fingerprint = fingerprint_of(&decl.name, &nodes, &edges, &entry_node_ids, &terminal_node_ids, &called_pipelines);

    Ok(CompiledPipeline {
        name: decl.name.clone(),
        trigger: decl.trigger.clone(),
        nodes,
        edges,
        entry_node_ids,
        terminal_node_ids,
        called_pipelines,
        execution_mode: decl.execution_mode,
        timeout: decl.timeout,
        fingerprint,
    })
}

fn verify_node_graph_acyclic(pipeline_name: &str, nodes: &[Node], edges: &[Edge]) -> Result<(), CompileError> {
    let mut graph = DiGraph::<&str, ()>::new();
    let mut indices = HashMap::new();
    for node in nodes {
        indices.insert(node.id.as_str(), graph.add_node(node.id.as_str()));
    }
    for edge in edges {
        graph.add_edge(indices[edge.from.as_str()], indices[edge.to.as_str()], ());
    }
    toposort(&graph, None).map(|_| ()).map_err(|_| CompileError::CyclicStepGraph(pipeline_name.to_string()))
}

fn fingerprint_of(
    name: &str,
    nodes: &[Node],
    edges: &[Edge],
    entries: &[String],
    terminals: &[String],
    called: &[String],
) -> String {
    #[derive(Serialize)]
    struct Canonical<'a> {
        name: &'a str,
        nodes: &'a [Node],
        edges: &'a [Edge],
        entries: &'a [String],
        terminals: &'a [String],
        called: &'a [String],
    }

    let canonical = Canonical { name, nodes, edges, entries, terminals, called };
    let json = serde_json::to_vec(&canonical).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&json);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
#[path = "compile_tests.rs"]
mod tests;

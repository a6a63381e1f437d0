// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;

use oj_core::job::JobId;

use super::*;
use crate::compile::compile_all;
use crate::decl::parse_decls;

fn router_for(yaml: &str) -> Router {
    let decls = parse_decls(yaml).unwrap();
    let compiled = compile_all(&decls).unwrap();
    Router::new(compiled)
}

fn root_request(event_type: &str) -> RouteRequest {
    RouteRequest {
        event_type: event_type.to_string(),
        event: json!({"type": event_type, "payload": {"k": "v"}, "event_id": "evt-1"}),
        event_payload: json!({"k": "v"}),
        event_id: "evt-1".to_string(),
        source_pipeline: None,
        source_step_id: None,
        source_job_id: JobId::new(),
        source_context_id: None,
    }
}

#[test]
fn root_trigger_dispatches_to_entry_nodes() {
    let router = router_for(
        r#"
- name: chain
  trigger: chain.start
  steps:
    - uses: plugin-a
    - uses: plugin-b
"#,
    );
    let dispatches = router.next(&root_request("chain.start"));
    assert_eq!(dispatches.len(), 1);
    assert_eq!(dispatches[0].plugin, "plugin-a");
    assert_eq!(dispatches[0].pipeline_name, "chain");
}

#[test]
fn unmatched_trigger_dispatches_nothing() {
    let router = router_for(
        r#"
- name: chain
  trigger: chain.start
  steps:
    - uses: plugin-a
"#,
    );
    assert!(router.next(&root_request("unknown.event")).is_empty());
}

#[test]
fn step_completion_advances_to_next_node() {
    let router = router_for(
        r#"
- name: chain
  trigger: chain.start
  steps:
    - uses: plugin-a
    - uses: plugin-b
"#,
    );
    let pipeline = router.get_pipeline_by_name("chain").unwrap();
    let entry = pipeline.entry_node_ids[0].clone();

    let mut req = root_request("chain.start");
    req.source_pipeline = Some("chain".to_string());
    req.source_step_id = Some(entry);

    let dispatches = router.next(&req);
    assert_eq!(dispatches.len(), 1);
    assert_eq!(dispatches[0].plugin, "plugin-b");
}

#[test]
fn terminal_step_completion_dispatches_nothing_further() {
    let router = router_for(
        r#"
- name: chain
  trigger: chain.start
  steps:
    - uses: plugin-a
"#,
    );
    let pipeline = router.get_pipeline_by_name("chain").unwrap();
    let terminal = pipeline.terminal_node_ids[0].clone();

    let mut req = root_request("chain.start");
    req.source_pipeline = Some("chain".to_string());
    req.source_step_id = Some(terminal);

    assert!(router.next(&req).is_empty());
}

#[test]
fn call_node_expands_into_the_called_pipelines_inlined_entries() {
    let router = router_for(
        r#"
- name: caller
  trigger: caller.start
  steps:
    - call: callee
- name: callee
  trigger: callee.start
  steps:
    - uses: plugin-x
"#,
    );
    let dispatches = router.next(&root_request("caller.start"));
    assert_eq!(dispatches.len(), 1);
    assert_eq!(dispatches[0].plugin, "plugin-x");
    // The callee's node is inlined into the caller's own compiled graph,
    // so routing attributes it to "caller", not "callee".
    assert_eq!(dispatches[0].pipeline_name, "caller");
}

#[test]
fn a_call_step_followed_by_further_steps_reaches_the_later_step() {
    let router = router_for(
        r#"
- name: caller
  trigger: caller.start
  steps:
    - call: callee
    - uses: plugin-y
- name: callee
  trigger: callee.start
  steps:
    - uses: plugin-x
"#,
    );
    let pipeline = router.get_pipeline_by_name("caller").unwrap();
    let entry = pipeline.entry_node_ids[0].clone();

    let mut req = root_request("caller.start");
    req.source_pipeline = Some("caller".to_string());
    req.source_step_id = Some(entry);

    let dispatches = router.next(&req);
    assert_eq!(dispatches.len(), 1);
    assert_eq!(dispatches[0].plugin, "plugin-y");
    assert_eq!(dispatches[0].pipeline_name, "caller");
}

#[test]
fn splitting_into_the_same_called_pipeline_twice_inlines_two_independent_copies() {
    let router = router_for(
        r#"
- name: fanout
  trigger: fanout.start
  steps:
    - split:
        - call: shared
        - call: shared
- name: shared
  trigger: shared.start
  steps:
    - uses: plugin-x
"#,
    );
    let dispatches = router.next(&root_request("fanout.start"));
    // Each split branch gets its own inlined copy of `shared`, with a
    // distinct step id, so both run rather than collapsing into one.
    assert_eq!(dispatches.len(), 2);
    assert_ne!(dispatches[0].step_id, dispatches[1].step_id);
}

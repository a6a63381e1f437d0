// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use std::time::Duration;

use oj_core::job::{Command, EnqueueRequest, JobStatus};
use oj_pipeline::{compile_all, parse_decls, Router};
use oj_storage::{NullWorkspace, Storage};

use super::*;
use crate::adapter::TokioProcessAdapter;
use crate::hub::EventHub;
use crate::registry::{InMemoryRegistry, PluginSpec};

fn script(dir: &tempfile::TempDir, name: &str, body: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}

fn empty_router() -> Arc<Router> {
    Arc::new(Router::new(Vec::new()))
}

fn dispatcher_with(registry: InMemoryRegistry, router: Arc<Router>) -> (Storage, Dispatcher<TokioProcessAdapter>) {
    let storage = Storage::open_in_memory().unwrap();
    let dispatcher = Dispatcher::new(
        storage.clone(),
        Arc::new(registry),
        router,
        TokioProcessAdapter,
        Arc::new(EventHub::default()),
        Arc::new(NullWorkspace),
    );
    (storage, dispatcher)
}

#[tokio::test]
async fn dispatch_once_returns_false_on_empty_queue() {
    let (_storage, dispatcher) = dispatcher_with(InMemoryRegistry::default(), empty_router());
    assert!(!dispatcher.dispatch_once().await.unwrap());
}

#[tokio::test]
async fn successful_invocation_completes_job_and_persists_state_updates() {
    let dir = tempfile::tempdir().unwrap();
    let entrypoint = script(&dir, "plugin.sh", "cat >/dev/null\necho '{\"status\":\"ok\",\"state_updates\":{\"cursor\":42}}'");

    let spec = PluginSpec::new("poller", entrypoint).commands(vec![Command::Poll]);
    let (storage, dispatcher) = dispatcher_with(InMemoryRegistry::new([spec]), empty_router());

    let job_id = storage.enqueue(EnqueueRequest::new("poller", Command::Poll, "test")).unwrap();
    assert!(dispatcher.dispatch_once().await.unwrap());

    let job = storage.get_job_by_id(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Succeeded);

    let state = storage.get_plugin_state("poller").unwrap();
    assert_eq!(state["cursor"], 42);
}

#[tokio::test]
async fn unsupported_command_fails_without_invoking_the_plugin() {
    let spec = PluginSpec::new("poller", "/no/such/binary").commands(vec![Command::Health]);
    let (storage, dispatcher) = dispatcher_with(InMemoryRegistry::new([spec]), empty_router());

    let job_id = storage.enqueue(EnqueueRequest::new("poller", Command::Poll, "test")).unwrap();
    assert!(dispatcher.dispatch_once().await.unwrap());

    let job = storage.get_job_by_id(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.last_error.unwrap().contains("does not support"));
}

#[tokio::test]
async fn plugin_reported_error_marks_the_job_failed_with_raw_result_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let entrypoint = script(&dir, "plugin.sh", "cat >/dev/null\necho '{\"status\":\"error\",\"error\":\"boom\"}'");

    let spec = PluginSpec::new("poller", entrypoint).commands(vec![Command::Poll]);
    let (storage, dispatcher) = dispatcher_with(InMemoryRegistry::new([spec]), empty_router());

    let job_id = storage.enqueue(EnqueueRequest::new("poller", Command::Poll, "test")).unwrap();
    dispatcher.dispatch_once().await.unwrap();

    let job = storage.get_job_by_id(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.last_error.as_deref(), Some("boom"));
}

#[tokio::test]
async fn timeout_marks_job_timed_out() {
    let dir = tempfile::tempdir().unwrap();
    let entrypoint = script(&dir, "plugin.sh", "trap '' TERM\ncat >/dev/null\nsleep 30");

    let mut overrides = std::collections::HashMap::new();
    overrides.insert(Command::Poll, 1u64);
    let spec = PluginSpec::new("slow", entrypoint).commands(vec![Command::Poll]).timeout_overrides(overrides);
    let (storage, dispatcher) = dispatcher_with(InMemoryRegistry::new([spec]), empty_router());

    let job_id = storage.enqueue(EnqueueRequest::new("slow", Command::Poll, "test")).unwrap();
    dispatcher.dispatch_once().await.unwrap();

    let job = storage.get_job_by_id(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::TimedOut);
}

#[tokio::test]
async fn emitted_event_is_routed_to_the_matching_pipeline_entry() {
    let dir = tempfile::tempdir().unwrap();
    let source_entrypoint = script(
        &dir,
        "source.sh",
        "cat >/dev/null\necho '{\"status\":\"ok\",\"events\":[{\"type\":\"poll.completed\",\"payload\":{}}]}'",
    );
    let target_entrypoint = script(&dir, "target.sh", "cat >/dev/null\necho '{\"status\":\"ok\"}'");

    let yaml = "
- name: relay
  trigger: poll.completed
  steps:
    - uses: target
";
    let decls = parse_decls(yaml).unwrap();
    let compiled = compile_all(&decls).unwrap();
    let router = Arc::new(Router::new(compiled));

    let registry = InMemoryRegistry::new([
        PluginSpec::new("source", source_entrypoint).commands(vec![Command::Poll]),
        PluginSpec::new("target", target_entrypoint).commands(vec![Command::Handle]),
    ]);
    let (storage, dispatcher) = dispatcher_with(registry, router);

    storage.enqueue(EnqueueRequest::new("source", Command::Poll, "test")).unwrap();
    assert!(dispatcher.dispatch_once().await.unwrap());
    assert!(dispatcher.dispatch_once().await.unwrap());

    let jobs = storage.list_jobs(&Default::default(), 10).unwrap();
    assert!(jobs.iter().any(|j| j.plugin == "target" && j.status == JobStatus::Succeeded));
}

#[tokio::test]
async fn wait_for_job_tree_returns_once_the_only_job_completes() {
    let dir = tempfile::tempdir().unwrap();
    let entrypoint = script(&dir, "plugin.sh", "cat >/dev/null\necho '{\"status\":\"ok\"}'");

    let spec = PluginSpec::new("poller", entrypoint).commands(vec![Command::Poll]);
    let (storage, dispatcher) = dispatcher_with(InMemoryRegistry::new([spec]), empty_router());
    let job_id = storage.enqueue(EnqueueRequest::new("poller", Command::Poll, "test")).unwrap();

    let dispatcher = Arc::new(dispatcher);
    let waiter = {
        let dispatcher = dispatcher.clone();
        let job_id = job_id.clone();
        tokio::spawn(async move { dispatcher.wait_for_job_tree(&job_id, Duration::from_secs(5)).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(dispatcher.dispatch_once().await.unwrap());

    let tree = waiter.await.unwrap().unwrap();
    assert!(tree.is_complete());
}

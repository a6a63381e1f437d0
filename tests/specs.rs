// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios exercising the queue, scheduler, dispatcher,
//! router, and event hub together rather than in isolation.

use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use oj_core::job::{Command, EnqueueRequest, JobStatus};
use oj_core::JobId;
use oj_engine::{Dispatcher, EventHub, InMemoryRegistry, PluginSpec, ScheduleDecl, Scheduler, TokioProcessAdapter};
use oj_pipeline::{compile_all, parse_decls, Router};
use oj_storage::{NullWorkspace, Storage};

fn script(dir: &tempfile::TempDir, name: &str, body: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}

fn empty_router() -> Arc<Router> {
    Arc::new(Router::new(Vec::new()))
}

#[tokio::test]
async fn scheduled_poll_happy_path() {
    let dir = tempfile::tempdir().unwrap();
    let entrypoint = script(&dir, "echo.sh", "cat >/dev/null\necho '{\"status\":\"ok\",\"state_updates\":{\"last_run\":\"T\"}}'");

    let storage = Storage::open_in_memory().unwrap();
    let registry = Arc::new(InMemoryRegistry::new([PluginSpec::new("echo", entrypoint).commands(vec![Command::Poll])]));
    let hub = Arc::new(EventHub::default());
    let scheduler = Scheduler::new(storage.clone(), registry.clone(), hub.clone(), "oj-gateway");

    scheduler.tick(&[ScheduleDecl::new("echo", "default", Command::Poll, "1m")]).await.unwrap();

    let jobs = storage.list_jobs(&Default::default(), 10).unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].dedupe_key.as_deref(), Some("echo:poll:default"));

    let dispatcher = Dispatcher::new(storage.clone(), registry, empty_router(), TokioProcessAdapter, hub, Arc::new(NullWorkspace));
    assert!(dispatcher.dispatch_once().await.unwrap());

    let job = storage.get_job_by_id(&jobs[0].id).unwrap();
    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(storage.get_plugin_state("echo").unwrap()["last_run"], "T");
}

#[tokio::test]
async fn two_hop_pipeline_propagates_context_into_the_child_handle_request() {
    let dir = tempfile::tempdir().unwrap();
    let plugin_a = script(
        &dir,
        "plugin-a.sh",
        r#"cat >/dev/null
echo '{"status":"ok","events":[{"type":"chain.start","payload":{"origin_channel_id":"chan-1","message":"hello"}}]}'"#,
    );
    let plugin_b = script(&dir, "plugin-b.sh", "cat >/dev/null\necho '{\"status\":\"ok\"}'");

    let yaml = "
- name: chain
  trigger: chain.start
  steps:
    - uses: plugin-b
";
    let compiled = compile_all(&parse_decls(yaml).unwrap()).unwrap();
    let router = Arc::new(Router::new(compiled));

    let storage = Storage::open_in_memory().unwrap();
    let registry = Arc::new(InMemoryRegistry::new([
        PluginSpec::new("plugin-a", plugin_a).commands(vec![Command::Poll]),
        PluginSpec::new("plugin-b", plugin_b).commands(vec![Command::Handle]),
    ]));
    let dispatcher = Dispatcher::new(storage.clone(), registry, router, TokioProcessAdapter, Arc::new(EventHub::default()), Arc::new(NullWorkspace));

    let root_id = storage.enqueue(EnqueueRequest::new("plugin-a", Command::Poll, "test")).unwrap();
    assert!(dispatcher.dispatch_once().await.unwrap());
    assert!(dispatcher.dispatch_once().await.unwrap());

    let jobs = storage.list_jobs(&Default::default(), 10).unwrap();
    let children: Vec<_> = jobs.iter().filter(|j| j.plugin == "plugin-b").collect();
    assert_eq!(children.len(), 1);
    let child = children[0];
    assert_eq!(child.parent_job_id.as_ref(), Some(&root_id));
    assert_eq!(child.status, JobStatus::Succeeded);

    let context = storage.get_event_context(child.event_context_id.as_ref().unwrap()).unwrap().unwrap();
    assert_eq!(context.accumulated_json["origin_channel_id"], "chan-1");
    assert_eq!(context.accumulated_json["message"], "hello");
}

#[tokio::test]
async fn timeout_with_forced_kill_completes_within_the_grace_window() {
    let dir = tempfile::tempdir().unwrap();
    let entrypoint = script(&dir, "spin.sh", "trap '' TERM\ncat >/dev/null\nsleep 30");

    let mut overrides = HashMap::new();
    overrides.insert(Command::Poll, 1u64);
    let storage = Storage::open_in_memory().unwrap();
    let registry = Arc::new(InMemoryRegistry::new([PluginSpec::new("spinner", entrypoint).commands(vec![Command::Poll]).timeout_overrides(overrides)]));
    let dispatcher = Dispatcher::new(storage.clone(), registry.clone(), empty_router(), TokioProcessAdapter, Arc::new(EventHub::default()), Arc::new(NullWorkspace));

    let job_id = storage.enqueue(EnqueueRequest::new("spinner", Command::Poll, "test")).unwrap();

    let started = Instant::now();
    dispatcher.dispatch_once().await.unwrap();
    let elapsed = started.elapsed();
    assert!(elapsed > Duration::from_secs(1) && elapsed < Duration::from_secs(8), "elapsed={elapsed:?}");

    let job = storage.get_job_by_id(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::TimedOut);

    let ok_entrypoint = script(&dir, "ok.sh", "cat >/dev/null\necho '{\"status\":\"ok\"}'");
    let next_registry = Arc::new(InMemoryRegistry::new([PluginSpec::new("spinner", ok_entrypoint).commands(vec![Command::Poll])]));
    let next_dispatcher = Dispatcher::new(storage.clone(), next_registry, empty_router(), TokioProcessAdapter, Arc::new(EventHub::default()), Arc::new(NullWorkspace));
    storage.enqueue(EnqueueRequest::new("spinner", Command::Poll, "test")).unwrap();
    assert!(next_dispatcher.dispatch_once().await.unwrap());
}

#[tokio::test]
async fn dedupe_drops_redundant_enqueues_while_active_or_recently_succeeded() {
    let storage = Storage::open_in_memory().unwrap();

    let first = storage.enqueue(EnqueueRequest::new("echo", Command::Poll, "test").dedupe_key("K")).unwrap();
    let dropped = storage.enqueue(EnqueueRequest::new("echo", Command::Poll, "test").dedupe_key("K"));
    match dropped {
        Err(oj_core::EnqueueError::DedupeDrop { existing_job_id }) => assert_eq!(existing_job_id, first),
        other => panic!("expected DedupeDrop, got {other:?}"),
    }
    assert_eq!(storage.list_jobs(&Default::default(), 10).unwrap().len(), 1);

    storage.dequeue().unwrap();
    storage.complete_with_result(&first, JobStatus::Succeeded, None, None, "").unwrap();

    let dropped_after_success = storage.enqueue(EnqueueRequest::new("echo", Command::Poll, "test").dedupe_key("K"));
    assert!(matches!(dropped_after_success, Err(oj_core::EnqueueError::DedupeDrop { .. })));

    let second = storage.enqueue(EnqueueRequest::new("echo", Command::Poll, "test").dedupe_key("K2")).unwrap();
    storage.dequeue().unwrap();
    storage.complete_with_result(&second, JobStatus::Failed, None, Some("boom"), "").unwrap();

    let succeeds_after_failure = storage.enqueue(EnqueueRequest::new("echo", Command::Poll, "test").dedupe_key("K2"));
    assert!(succeeds_after_failure.is_ok());
}

#[tokio::test]
async fn crash_recovery_requeues_or_kills_orphaned_running_jobs() {
    let storage = Storage::open_in_memory().unwrap();
    let registry = Arc::new(InMemoryRegistry::default());
    let scheduler = Scheduler::new(storage.clone(), registry, Arc::new(EventHub::default()), "oj-gateway");

    let retryable = storage.enqueue(EnqueueRequest::new("echo", Command::Poll, "test")).unwrap();
    storage.dequeue().unwrap();

    let exhausted = storage.enqueue(EnqueueRequest::new("echo", Command::Poll, "test").max_attempts(Some(3))).unwrap();
    storage.dequeue().unwrap();
    storage.update_job_for_recovery(&exhausted, JobStatus::Running, 3, None, None).unwrap();

    scheduler.recover_orphans().unwrap();

    let retryable = storage.get_job_by_id(&retryable).unwrap();
    assert_eq!(retryable.status, JobStatus::Queued);
    assert_eq!(retryable.attempt, 2);
    assert!(retryable.next_retry_at.is_none());

    let exhausted = storage.get_job_by_id(&exhausted).unwrap();
    assert_eq!(exhausted.status, JobStatus::Dead);
    assert_eq!(exhausted.attempt, 4);
    assert!(exhausted.last_error.is_some());
}

#[tokio::test]
async fn synchronous_pipeline_wait_returns_once_the_tree_completes_and_times_out_on_a_hang() {
    let dir = tempfile::tempdir().unwrap();
    let plugin_a = script(
        &dir,
        "plugin-a.sh",
        r#"cat >/dev/null
echo '{"status":"ok","events":[{"type":"chain.start","payload":{}}]}'"#,
    );
    let plugin_b = script(&dir, "plugin-b.sh", "cat >/dev/null\necho '{\"status\":\"ok\"}'");

    let yaml = "
- name: chain
  trigger: chain.start
  steps:
    - uses: plugin-b
";
    let compiled = compile_all(&parse_decls(yaml).unwrap()).unwrap();
    let router = Arc::new(Router::new(compiled));

    let storage = Storage::open_in_memory().unwrap();
    let registry = Arc::new(InMemoryRegistry::new([
        PluginSpec::new("plugin-a", plugin_a).commands(vec![Command::Poll]),
        PluginSpec::new("plugin-b", plugin_b).commands(vec![Command::Handle]),
    ]));
    let dispatcher = Arc::new(Dispatcher::new(storage.clone(), registry, router, TokioProcessAdapter, Arc::new(EventHub::default()), Arc::new(NullWorkspace)));

    let root_id = storage.enqueue(EnqueueRequest::new("plugin-a", Command::Poll, "test")).unwrap();

    let waiter = {
        let dispatcher = dispatcher.clone();
        let root_id = root_id.clone();
        tokio::spawn(async move { dispatcher.wait_for_job_tree(&root_id, Duration::from_secs(5)).await })
    };

    let started = Instant::now();
    assert!(dispatcher.dispatch_once().await.unwrap());
    assert!(dispatcher.dispatch_once().await.unwrap());
    let tree = waiter.await.unwrap().unwrap();
    assert!(tree.is_complete());
    assert_eq!(tree.jobs.len(), 2);
    assert!(started.elapsed() < Duration::from_secs(5));

    let hang_entrypoint = script(&dir, "hang.sh", "trap '' TERM\ncat >/dev/null\nsleep 300");
    let hang_registry = Arc::new(InMemoryRegistry::new([PluginSpec::new("hanger", hang_entrypoint).commands(vec![Command::Poll])]));
    let hang_dispatcher = Arc::new(Dispatcher::new(storage.clone(), hang_registry, empty_router(), TokioProcessAdapter, Arc::new(EventHub::default()), Arc::new(NullWorkspace)));
    let hang_id = storage.enqueue(EnqueueRequest::new("hanger", Command::Poll, "test")).unwrap();

    let hang_dispatcher_for_task = hang_dispatcher.clone();
    tokio::spawn(async move { let _ = hang_dispatcher_for_task.dispatch_once().await; });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = Instant::now();
    let result = hang_dispatcher.wait_for_job_tree(&hang_id, Duration::from_secs(1)).await;
    assert!(result.is_err(), "expected a timeout, job is still running");
    assert!(started.elapsed() < Duration::from_secs(2));
}

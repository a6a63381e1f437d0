// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;

use oj_core::job::{Command, JobStatus};
use oj_core::EnqueueRequest;

use super::*;

fn req(plugin: &str) -> EnqueueRequest {
    EnqueueRequest::new(plugin, Command::Poll, "test")
}

#[test]
fn enqueue_then_dequeue_round_trips() {
    let storage = Storage::open_in_memory().unwrap();
    let id = storage.enqueue(req("echo")).unwrap();

    let job = storage.dequeue().unwrap().unwrap();
    assert_eq!(job.id, id);
    assert_eq!(job.status, JobStatus::Running);
    assert!(job.started_at.is_some());
}

#[test]
fn dequeue_is_fifo_by_created_at_then_rowid() {
    let storage = Storage::open_in_memory().unwrap();
    let first = storage.enqueue(req("a")).unwrap();
    let second = storage.enqueue(req("b")).unwrap();

    assert_eq!(storage.dequeue().unwrap().unwrap().id, first);
    assert_eq!(storage.dequeue().unwrap().unwrap().id, second);
    assert!(storage.dequeue().unwrap().is_none());
}

#[test]
fn dedupe_drops_while_prior_job_is_active() {
    let storage = Storage::open_in_memory().unwrap();
    let first = storage.enqueue(req("echo").dedupe_key("echo:poll:default")).unwrap();

    let err = storage.enqueue(req("echo").dedupe_key("echo:poll:default")).unwrap_err();
    match err {
        EnqueueError::DedupeDrop { existing_job_id } => assert_eq!(existing_job_id, first),
        other => panic!("expected DedupeDrop, got {other:?}"),
    }
}

#[test]
fn dedupe_allows_enqueue_after_prior_job_failed() {
    let storage = Storage::open_in_memory().unwrap();
    let first = storage.enqueue(req("echo").dedupe_key("k")).unwrap();
    storage.dequeue().unwrap();
    storage.complete_with_result(&first, JobStatus::Failed, None, Some("boom"), "").unwrap();

    let second = storage.enqueue(req("echo").dedupe_key("k")).unwrap();
    assert_ne!(first, second);
}

#[test]
fn dedupe_blocks_within_ttl_after_success() {
    let storage = Storage::open_in_memory().unwrap();
    let first = storage.enqueue(req("echo").dedupe_key("k")).unwrap();
    storage.dequeue().unwrap();
    storage.complete_with_result(&first, JobStatus::Succeeded, Some(&json!({"ok": true})), None, "").unwrap();

    let err = storage.enqueue(req("echo").dedupe_key("k")).unwrap_err();
    assert!(matches!(err, EnqueueError::DedupeDrop { .. }));
}

#[test]
fn routing_same_source_event_to_same_parent_is_idempotent() {
    let storage = Storage::open_in_memory().unwrap();
    let parent = storage.enqueue(req("a")).unwrap();

    let child_req = || {
        EnqueueRequest::new("b", Command::Handle, "route")
            .parent_job_id(Some(parent.clone()))
            .source_event_id("evt-1")
    };

    let first_child = storage.enqueue(child_req()).unwrap();
    let err = storage.enqueue(child_req()).unwrap_err();
    match err {
        EnqueueError::AlreadyRouted { existing_job_id } => assert_eq!(existing_job_id, first_child),
        other => panic!("expected AlreadyRouted, got {other:?}"),
    }
}

#[test]
fn complete_with_result_writes_job_log_row() {
    let storage = Storage::open_in_memory().unwrap();
    let id = storage.enqueue(req("echo")).unwrap();
    storage.dequeue().unwrap();
    storage.complete_with_result(&id, JobStatus::Succeeded, Some(&json!({"a": 1})), None, "hi").unwrap();

    let log = storage.get_job_log(&format!("{id}-1")).unwrap().unwrap();
    assert_eq!(log.status, JobStatus::Succeeded);
    assert_eq!(log.stderr, "hi");
    assert_eq!(log.result.unwrap(), json!({"a": 1}));

    let job = storage.get_job_by_id(&id).unwrap();
    assert_eq!(job.status, JobStatus::Succeeded);
    assert!(job.completed_at.is_some());
}

#[test]
fn update_job_for_recovery_requeues_under_max_attempts() {
    let storage = Storage::open_in_memory().unwrap();
    let id = storage.enqueue(req("echo")).unwrap();
    storage.dequeue().unwrap();

    storage.update_job_for_recovery(&id, JobStatus::Queued, 2, None, None).unwrap();

    let job = storage.get_job_by_id(&id).unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.attempt, 2);
    assert!(job.next_retry_at.is_none());
}

#[test]
fn update_job_for_recovery_marks_dead_when_exhausted() {
    let storage = Storage::open_in_memory().unwrap();
    let id = storage.enqueue(req("echo").max_attempts(Some(1))).unwrap();
    storage.dequeue().unwrap();

    storage.update_job_for_recovery(&id, JobStatus::Dead, 2, None, Some("recovery: attempts exhausted")).unwrap();

    let job = storage.get_job_by_id(&id).unwrap();
    assert_eq!(job.status, JobStatus::Dead);
    assert!(job.completed_at.is_some());
    assert_eq!(job.last_error.as_deref(), Some("recovery: attempts exhausted"));
}

#[test]
fn find_jobs_by_status_matches_only_that_status() {
    let storage = Storage::open_in_memory().unwrap();
    storage.enqueue(req("a")).unwrap();
    let running = storage.enqueue(req("b")).unwrap();
    storage.dequeue().unwrap();

    let running_jobs = storage.find_jobs_by_status(JobStatus::Running).unwrap();
    assert_eq!(running_jobs.len(), 1);
    assert_eq!(running_jobs[0].id, running);
}

#[test]
fn get_job_tree_returns_transitive_closure() {
    let storage = Storage::open_in_memory().unwrap();
    let root = storage.enqueue(req("a")).unwrap();
    let child = storage
        .enqueue(EnqueueRequest::new("b", Command::Handle, "route").parent_job_id(Some(root.clone())).source_event_id("e1"))
        .unwrap();
    let grandchild = storage
        .enqueue(EnqueueRequest::new("c", Command::Handle, "route").parent_job_id(Some(child.clone())).source_event_id("e2"))
        .unwrap();

    let tree = storage.get_job_tree(&root).unwrap();
    let ids: Vec<_> = tree.jobs.iter().map(|j| j.id.clone()).collect();
    assert!(ids.contains(&root));
    assert!(ids.contains(&child));
    assert!(ids.contains(&grandchild));
    assert!(!tree.is_complete());
}

#[test]
fn count_outstanding_jobs_counts_queued_and_running() {
    let storage = Storage::open_in_memory().unwrap();
    storage.enqueue(req("a")).unwrap();
    storage.enqueue(req("a")).unwrap();
    storage.dequeue().unwrap();

    assert_eq!(storage.count_outstanding_jobs("a", Command::Poll).unwrap(), 2);
}

#[test]
fn latest_completed_command_result_picks_most_recent_terminal() {
    let storage = Storage::open_in_memory().unwrap();
    let first = storage.enqueue(req("a")).unwrap();
    storage.dequeue().unwrap();
    storage.complete_with_result(&first, JobStatus::Failed, None, Some("e"), "").unwrap();

    let latest = storage.latest_completed_command_result("a", Command::Poll, "test").unwrap().unwrap();
    assert_eq!(latest.id, first);
}

#[test]
fn list_jobs_filters_by_plugin_and_status() {
    let storage = Storage::open_in_memory().unwrap();
    storage.enqueue(req("a")).unwrap();
    storage.enqueue(req("b")).unwrap();

    let filter = JobFilter { plugin: Some("a".to_string()), ..Default::default() };
    let jobs = storage.list_jobs(&filter, 10).unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].plugin, "a");
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The dispatcher: claim → spawn → timeout → collect → merge state →
//! route events → complete, plus synchronous tree waits.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Notify;

use oj_core::job::{Command, EnqueueRequest, JobStatus};
use oj_core::{shallow_merge, EventContext, EventContextId, Job, JobId};
use oj_pipeline::{RouteRequest, Router};
use oj_storage::{JobTree, Storage, Workspace};
use oj_wire::{EventEnvelope, ProtocolRequest};

use crate::adapter::{PluginAdapter, PluginOutcome};
use crate::error::{DispatchError, WaitError};
use crate::hub::EventHub;
use crate::registry::PluginRegistry;

/// How often the dispatcher polls the queue when it finds nothing to do.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct Dispatcher<A> {
    storage: Storage,
    registry: Arc<dyn PluginRegistry>,
    router: Arc<Router>,
    adapter: A,
    hub: Arc<EventHub>,
    workspace: Arc<dyn Workspace>,
    completion: Arc<Notify>,
}

impl<A: PluginAdapter> Dispatcher<A> {
    pub fn new(
        storage: Storage,
        registry: Arc<dyn PluginRegistry>,
        router: Arc<Router>,
        adapter: A,
        hub: Arc<EventHub>,
        workspace: Arc<dyn Workspace>,
    ) -> Self {
        Self { storage, registry, router, adapter, hub, workspace, completion: Arc::new(Notify::new()) }
    }

    /// Run the poll loop until `shutdown` resolves. A single bad job
    /// never stops the loop; only the loop observing shutdown does.
    pub async fn run(&self, poll_interval: Duration, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
                _ = async {
                    match self.dispatch_once().await {
                        Ok(true) => {}
                        Ok(false) => tokio::time::sleep(poll_interval).await,
                        Err(e) => {
                            tracing::warn!(error = %e, "dispatcher cycle failed");
                            tokio::time::sleep(poll_interval).await;
                        }
                    }
                } => {}
            }
        }
    }

    /// Claim and run exactly one job. Returns `Ok(false)` when the
    /// queue had nothing eligible.
    pub async fn dispatch_once(&self) -> Result<bool, DispatchError> {
        let Some(job) = self.storage.dequeue()? else {
            return Ok(false);
        };

        self.hub.publish("job.started", serde_json::json!({"job_id": job.id.as_str(), "plugin": job.plugin}));
        let started = std::time::Instant::now();

        let outcome = self.run_job(&job).await;
        self.finish_job(&job, outcome, started.elapsed()).await?;
        self.completion.notify_waiters();
        Ok(true)
    }

    async fn run_job(&self, job: &Job) -> JobOutcome {
        let Some(spec) = self.registry.get(&job.plugin) else {
            return JobOutcome::Failed { error: DispatchError::UnknownPlugin(job.plugin.clone()).to_string(), result: None };
        };
        if !spec.supports(job.command) {
            let error = DispatchError::UnsupportedCommand { plugin: job.plugin.clone(), command: job.command.to_string() };
            return JobOutcome::Failed { error: error.to_string(), result: None };
        }

        let plugin_state = match self.storage.get_plugin_state(&job.plugin) {
            Ok(v) => v,
            Err(e) => return JobOutcome::Failed { error: e.to_string(), result: None },
        };

        let own_context = match &job.event_context_id {
            Some(id) => match self.storage.get_event_context(id) {
                Ok(ctx) => ctx,
                Err(e) => return JobOutcome::Failed { error: e.to_string(), result: None },
            },
            None => None,
        };
        let context = own_context.as_ref().map(|c| c.accumulated_json.clone()).unwrap_or_else(|| Value::Object(Default::default()));

        let workspace_dir = match self.resolve_workspace(job).await {
            Ok(path) => path,
            Err(e) => return JobOutcome::Failed { error: e.to_string(), result: None },
        };

        let timeout_secs = spec.timeout_secs(job.command);
        let deadline_at = chrono::Utc::now() + chrono::Duration::seconds(timeout_secs as i64);

        let mut request = ProtocolRequest::new(
            job.id.as_str(),
            job.command,
            spec.config.clone(),
            plugin_state,
            context.clone(),
            workspace_dir.map(|p| p.to_string_lossy().into_owned()).unwrap_or_default(),
            deadline_at,
        );

        if job.command == Command::Handle {
            match serde_json::from_value::<EventEnvelope>(job.payload.clone()) {
                Ok(mut event) => {
                    event.payload = shallow_merge(Some(&context), &event.payload);
                    request = request.with_event(event);
                }
                Err(e) => return JobOutcome::Failed { error: format!("job payload is not a valid event: {e}"), result: None },
            }
        }

        let outcome = self.adapter.invoke(&job.plugin, &spec.entrypoint, &request, Duration::from_secs(timeout_secs)).await;

        match outcome {
            Ok(PluginOutcome::TimedOut { stderr }) => {
                JobOutcome::TimedOut { error: format!("plugin timed out after {timeout_secs}s"), stderr }
            }
            Ok(PluginOutcome::ProtocolError { message, raw_stdout, stderr }) => {
                JobOutcome::Failed { error: message, result: Some((raw_stdout, stderr)) }
            }
            Ok(PluginOutcome::Completed { response, raw_stdout, stderr }) => {
                if !response.is_ok() {
                    return JobOutcome::Failed { error: response.error.unwrap_or_default(), result: Some((raw_stdout, stderr)) };
                }

                if let Some(updates) = response.state_updates_object() {
                    if let Err(e) = self.storage.update_plugin_state(&job.plugin, &Value::Object(updates.clone())) {
                        return JobOutcome::Failed { error: e.to_string(), result: Some((raw_stdout, stderr)) };
                    }
                }

                for event in response.events() {
                    let mut event = event.clone();
                    event.normalize();
                    if let Err(e) = self.route_event(job, own_context.as_ref(), &event).await {
                        return JobOutcome::Failed { error: e.to_string(), result: Some((raw_stdout, stderr)) };
                    }
                }

                JobOutcome::Succeeded { result: raw_stdout, stderr }
            }
            Err(e) => JobOutcome::Failed { error: e.to_string(), result: None },
        }
    }

    async fn resolve_workspace(&self, job: &Job) -> Result<Option<std::path::PathBuf>, DispatchError> {
        let existing = self
            .workspace
            .open(&job.id)
            .await
            .map_err(|e| DispatchError::Storage(oj_core::StorageError::Sqlite(e.to_string())))?;
        if existing.is_some() {
            return Ok(existing);
        }
        if let Some(parent_id) = &job.parent_job_id {
            if let Ok(path) = self.workspace.clone_into(parent_id, &job.id).await {
                return Ok(Some(path));
            }
        }
        match self.workspace.create(&job.id).await {
            Ok(path) => Ok(Some(path)),
            Err(_) => Ok(None),
        }
    }

    async fn route_event(
        &self,
        source_job: &Job,
        source_context: Option<&EventContext>,
        event: &EventEnvelope,
    ) -> Result<(), DispatchError> {
        let event_id = event.event_id.clone().unwrap_or_default();
        let event_json = serde_json::to_value(event).expect("EventEnvelope always serializes");
        let request = RouteRequest {
            event_type: event.event_type.clone(),
            event: event_json,
            event_payload: event.payload.clone(),
            event_id: event_id.clone(),
            source_pipeline: source_context.map(|c| c.pipeline_name.clone()),
            source_step_id: source_context.map(|c| c.step_id.clone()),
            source_job_id: source_job.id.clone(),
            source_context_id: source_job.event_context_id.clone(),
        };

        for dispatch in self.router.next(&request) {
            if !event.payload.is_object() {
                return Err(DispatchError::NonObjectEventPayload { step_id: dispatch.step_id.clone() });
            }

            let context_id = EventContextId::new();
            let parent_accumulated = match &dispatch.parent_context_id {
                Some(id) => self.storage.get_event_context(id)?.map(|c| c.accumulated_json),
                None => None,
            };
            let context = EventContext::derive(
                context_id.clone(),
                dispatch.parent_context_id.clone(),
                parent_accumulated.as_ref(),
                dispatch.pipeline_name.clone(),
                dispatch.step_id.clone(),
                &dispatch.event_payload,
            );
            self.storage.insert_event_context(&context)?;

            let req = EnqueueRequest::new(dispatch.plugin.clone(), dispatch.command, "route")
                .payload(dispatch.event.clone())
                .parent_job_id(Some(dispatch.parent_job_id.clone()))
                .event_context_id(Some(context_id))
                .source_event_id(dispatch.source_event_id.clone());

            match self.storage.enqueue(req) {
                Ok(child_id) => {
                    let _ = self.workspace.clone_into(&source_job.id, &child_id).await;
                    self.hub.publish(
                        "router.enqueued",
                        serde_json::json!({"parent_job_id": source_job.id.as_str(), "job_id": child_id.as_str(), "pipeline": dispatch.pipeline_name}),
                    );
                }
                Err(oj_core::EnqueueError::AlreadyRouted { .. }) => {}
                Err(oj_core::EnqueueError::DedupeDrop { .. }) => {}
                Err(oj_core::EnqueueError::Storage(e)) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn finish_job(&self, job: &Job, outcome: JobOutcome, duration: Duration) -> Result<(), DispatchError> {
        let (status, result, error, stderr, event_name) = match outcome {
            JobOutcome::Succeeded { result, stderr } => {
                let value = serde_json::from_slice(&result).ok();
                (JobStatus::Succeeded, value, None, stderr, "job.completed")
            }
            JobOutcome::Failed { error, result } => {
                let (raw, stderr) = result.unwrap_or_default();
                let value = serde_json::from_slice(&raw).ok();
                (JobStatus::Failed, value, Some(error), stderr, "job.failed")
            }
            JobOutcome::TimedOut { error, stderr } => (JobStatus::TimedOut, None, Some(error), stderr, "job.timed_out"),
        };

        self.storage.complete_with_result(&job.id, status, result.as_ref(), error.as_deref(), &stderr)?;
        self.hub.publish(
            event_name,
            serde_json::json!({"job_id": job.id.as_str(), "plugin": job.plugin, "duration_ms": duration.as_millis() as u64}),
        );
        Ok(())
    }

    /// Wait until every job in `root_id`'s tree is terminal, or fail
    /// with a timeout after `timeout`.
    pub async fn wait_for_job_tree(&self, root_id: &JobId, timeout: Duration) -> Result<JobTree, WaitError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let tree = self.storage.get_job_tree(root_id)?;
            if tree.is_complete() {
                return Ok(tree);
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(WaitError::Timeout(root_id.as_str().to_string()));
            }

            let _ = tokio::time::timeout(remaining, self.completion.notified()).await;
        }
    }
}

enum JobOutcome {
    Succeeded { result: Vec<u8>, stderr: String },
    Failed { error: String, result: Option<(Vec<u8>, String)> },
    TimedOut { error: String, stderr: String },
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;

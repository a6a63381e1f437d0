// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawns a plugin executable for one invocation and enforces the
//! graceful-then-forced termination contract.

use std::time::Duration;

use async_trait::async_trait;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};

use oj_core::truncate_stderr;
use oj_wire::{decode_response, ProtocolRequest, ProtocolResponse};

use crate::error::DispatchError;

/// Grace period between a graceful termination signal and a forced one.
pub const TERMINATION_GRACE: Duration = Duration::from_secs(5);

/// How one plugin invocation ended.
#[derive(Debug)]
pub enum PluginOutcome {
    Completed { response: ProtocolResponse, raw_stdout: Vec<u8>, stderr: String },
    ProtocolError { message: String, raw_stdout: Vec<u8>, stderr: String },
    TimedOut { stderr: String },
}

/// Runs a single plugin invocation over stdin/stdout.
#[async_trait]
pub trait PluginAdapter: Send + Sync {
    async fn invoke(
        &self,
        plugin: &str,
        entrypoint: &str,
        request: &ProtocolRequest,
        timeout: Duration,
    ) -> Result<PluginOutcome, DispatchError>;
}

/// Spawns the plugin's entrypoint with no CLI arguments over
/// `tokio::process`, races its exit against `timeout`, and on timeout
/// sends a graceful termination signal, waits [`TERMINATION_GRACE`],
/// then forces termination.
#[derive(Debug, Default)]
pub struct TokioProcessAdapter;

#[async_trait]
impl PluginAdapter for TokioProcessAdapter {
    async fn invoke(
        &self,
        plugin: &str,
        entrypoint: &str,
        request: &ProtocolRequest,
        timeout: Duration,
    ) -> Result<PluginOutcome, DispatchError> {
        let mut cmd = Command::new(entrypoint);
        cmd.stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| DispatchError::Spawn { plugin: plugin.to_string(), source })?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = serde_json::to_vec(request).unwrap_or_default();
            let _ = stdin.write_all(&payload).await;
            let _ = stdin.shutdown().await;
        }

        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();

        tokio::select! {
            exited = child.wait() => {
                let status = exited.map_err(|source| DispatchError::Spawn { plugin: plugin.to_string(), source })?;
                read_remaining(&mut child, &mut stdout_buf, &mut stderr_buf).await;
                let _ = status;
                interpret(&stdout_buf, &stderr_buf)
            }
            _ = tokio::time::sleep(timeout) => {
                terminate(plugin, &mut child).await;
                read_remaining(&mut child, &mut stdout_buf, &mut stderr_buf).await;
                Ok(PluginOutcome::TimedOut { stderr: truncate_stderr(&String::from_utf8_lossy(&stderr_buf)) })
            }
        }
    }
}

async fn read_remaining(child: &mut Child, stdout_buf: &mut Vec<u8>, stderr_buf: &mut Vec<u8>) {
    if let Some(mut stdout) = child.stdout.take() {
        let _ = stdout.read_to_end(stdout_buf).await;
    }
    if let Some(mut stderr) = child.stderr.take() {
        let _ = stderr.read_to_end(stderr_buf).await;
    }
}

fn interpret(stdout_buf: &[u8], stderr_buf: &[u8]) -> Result<PluginOutcome, DispatchError> {
    let stderr = truncate_stderr(&String::from_utf8_lossy(stderr_buf));
    match decode_response(stdout_buf) {
        Ok(response) => Ok(PluginOutcome::Completed { response, raw_stdout: stdout_buf.to_vec(), stderr }),
        Err(e) => Ok(PluginOutcome::ProtocolError { message: e.to_string(), raw_stdout: stdout_buf.to_vec(), stderr }),
    }
}

/// Send a graceful termination signal, wait [`TERMINATION_GRACE`], then
/// force termination if the process is still alive.
async fn terminate(plugin: &str, child: &mut Child) {
    if let Some(pid) = child.id() {
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            tracing::warn!(plugin, error = %e, "failed to send SIGTERM to timed-out plugin");
        }
    }

    if tokio::time::timeout(TERMINATION_GRACE, child.wait()).await.is_ok() {
        return;
    }

    if let Some(pid) = child.id() {
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            tracing::warn!(plugin, error = %e, "failed to send SIGKILL to timed-out plugin");
        }
    }
    let _ = child.wait().await;
}

#[cfg(test)]
#[path = "adapter_tests.rs"]
mod tests;

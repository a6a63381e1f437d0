// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the scheduler and dispatcher loops.

use oj_core::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("plugin {0} is not registered")]
    UnknownPlugin(String),
    #[error("plugin {plugin} does not support command {command}")]
    UnsupportedCommand { plugin: String, command: String },
    #[error("failed to spawn plugin {plugin}: {source}")]
    Spawn { plugin: String, source: std::io::Error },
    #[error("plugin response could not be decoded: {0}")]
    Protocol(#[from] oj_wire::DecodeError),
    #[error("event payload for step {step_id} was not a JSON object")]
    NonObjectEventPayload { step_id: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("timed out waiting for job tree {0} to complete")]
    Timeout(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

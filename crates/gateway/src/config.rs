// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The gateway's own startup declarations: where the store lives, which
//! plugins are registered, and which recurring invocations the
//! scheduler ticks over.
//!
//! This is deliberately the simplest thing that could wire a real
//! deployment together. It does not resolve includes, seal checksums,
//! or discover plugins by scanning a directory — a production
//! configuration layer is expected to sit in front of this and produce
//! the same shape.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;

use oj_core::job::Command;
use oj_engine::PluginSpec;

#[derive(Debug, Deserialize)]
pub struct GatewayConfig {
    pub db_path: PathBuf,
    pub pipelines_path: PathBuf,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default)]
    pub plugins: Vec<PluginManifest>,
    #[serde(default)]
    pub schedules: Vec<ScheduleManifest>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

fn default_service_name() -> String {
    "oj-gateway".to_string()
}

fn default_poll_interval_secs() -> u64 {
    1
}

fn default_tick_interval_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize)]
pub struct PluginManifest {
    pub name: String,
    pub entrypoint: String,
    #[serde(default)]
    pub commands: Vec<Command>,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub timeout_overrides: HashMap<Command, u64>,
}

impl From<PluginManifest> for PluginSpec {
    fn from(m: PluginManifest) -> Self {
        PluginSpec::new(m.name, m.entrypoint)
            .commands(m.commands)
            .config(m.config)
            .max_attempts(m.max_attempts)
            .timeout_overrides(m.timeout_overrides)
    }
}

#[derive(Debug, Deserialize)]
pub struct ScheduleManifest {
    pub plugin: String,
    pub schedule_id: String,
    pub command: Command,
    pub every: String,
    #[serde(default)]
    pub jitter: Option<String>,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl From<ScheduleManifest> for oj_engine::ScheduleDecl {
    fn from(m: ScheduleManifest) -> Self {
        let mut decl = oj_engine::ScheduleDecl::new(m.plugin, m.schedule_id, m.command, m.every).payload(m.payload).max_attempts(m.max_attempts);
        if let Some(jitter) = m.jitter {
            decl = decl.jitter(jitter);
        }
        decl
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The plugin registry: what the dispatcher and scheduler know about a
//! declared plugin, without ever loading its code in-process.
//!
//! Manifest discovery and trust validation live outside this crate;
//! callers hand us an already-validated [`PluginSpec`] per plugin.

use std::collections::HashMap;

use serde_json::Value;

use oj_core::job::Command;

/// Everything the core needs to spawn and interpret one plugin.
#[derive(Debug, Clone)]
pub struct PluginSpec {
    pub name: String,
    pub entrypoint: String,
    pub commands: Vec<Command>,
    pub config: Value,
    pub max_attempts: Option<u32>,
    pub timeout_overrides: HashMap<Command, u64>,
}

impl PluginSpec {
    pub fn new(name: impl Into<String>, entrypoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entrypoint: entrypoint.into(),
            commands: Vec::new(),
            config: Value::Object(Default::default()),
            max_attempts: None,
            timeout_overrides: HashMap::new(),
        }
    }

    pub fn supports(&self, command: Command) -> bool {
        self.commands.contains(&command)
    }

    pub fn timeout_secs(&self, command: Command) -> u64 {
        self.timeout_overrides.get(&command).copied().unwrap_or_else(|| command.default_timeout_secs())
    }

    oj_core::setters! {
        into { entrypoint: String, config: Value }
        set {
            commands: Vec<Command>,
            max_attempts: Option<u32>,
            timeout_overrides: HashMap<Command, u64>
        }
    }
}

/// Read-only lookup of declared plugins, keyed by name.
pub trait PluginRegistry: Send + Sync {
    fn get(&self, name: &str) -> Option<PluginSpec>;
}

/// A registry backed by an in-memory map, built once at startup from
/// whatever configuration layer loaded the plugin manifests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    plugins: HashMap<String, PluginSpec>,
}

impl InMemoryRegistry {
    pub fn new(plugins: impl IntoIterator<Item = PluginSpec>) -> Self {
        Self { plugins: plugins.into_iter().map(|p| (p.name.clone(), p)).collect() }
    }
}

impl PluginRegistry for InMemoryRegistry {
    fn get(&self, name: &str) -> Option<PluginSpec> {
        self.plugins.get(name).cloned()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;

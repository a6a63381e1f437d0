// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-plugin persisted state: an opaque JSON object each plugin
//! invocation receives and can request updates to.

use rusqlite::{params, OptionalExtension};
use serde_json::Value;

use oj_core::{shallow_merge, StorageError};

use crate::Storage;

impl Storage {
    /// The plugin's current state object, or an empty object if none
    /// has been recorded yet.
    pub fn get_plugin_state(&self, plugin: &str) -> Result<Value, StorageError> {
        let conn = self.conn.lock();
        let raw: Option<String> = conn
            .query_row("SELECT state FROM plugin_state WHERE plugin = ?1", params![plugin], |r| r.get(0))
            .optional()
            .map_err(|e| StorageError::Sqlite(e.to_string()))?;
        match raw {
            Some(s) => serde_json::from_str(&s).map_err(StorageError::from),
            None => Ok(Value::Object(Default::default())),
        }
    }

    /// Shallow-merge `updates` into the plugin's state and persist the
    /// result. Callers are expected to have already confirmed `updates`
    /// is a non-empty JSON object.
    pub fn update_plugin_state(&self, plugin: &str, updates: &Value) -> Result<Value, StorageError> {
        let conn = self.conn.lock();
        let current: Option<String> = conn
            .query_row("SELECT state FROM plugin_state WHERE plugin = ?1", params![plugin], |r| r.get(0))
            .optional()
            .map_err(|e| StorageError::Sqlite(e.to_string()))?;
        let current_value = current.map(|s| serde_json::from_str(&s)).transpose().map_err(StorageError::from)?;
        let merged = shallow_merge(current_value.as_ref(), updates);
        let serialized = serde_json::to_string(&merged).map_err(StorageError::from)?;

        conn.execute(
            "INSERT INTO plugin_state (plugin, state) VALUES (?1, ?2)
             ON CONFLICT(plugin) DO UPDATE SET state = excluded.state",
            params![plugin, serialized],
        )
        .map_err(|e| StorageError::Sqlite(e.to_string()))?;

        Ok(merged)
    }
}

#[cfg(test)]
#[path = "plugin_state_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event context: the accumulated payload carried along a pipeline path.

use serde_json::{Map, Value};

crate::define_id! {
    /// Unique identifier for an event context node.
    pub struct EventContextId;
}

/// A per-lineage accumulated JSON object.
///
/// Each context's `accumulated_json` is the parent's accumulated object
/// with the step's `updates` shallow-merged on top: new keys from
/// `updates` overwrite parent keys of the same name, nested values are
/// replaced wholesale rather than deep-merged.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EventContext {
    pub id: EventContextId,
    pub parent_id: Option<EventContextId>,
    pub pipeline_name: String,
    pub step_id: String,
    pub accumulated_json: Value,
}

impl EventContext {
    /// Build a new context from a parent's accumulated JSON plus this
    /// step's `updates` object (shallow merge).
    pub fn derive(
        id: EventContextId,
        parent_id: Option<EventContextId>,
        parent_accumulated: Option<&Value>,
        pipeline_name: impl Into<String>,
        step_id: impl Into<String>,
        updates: &Value,
    ) -> Self {
        let accumulated_json = shallow_merge(parent_accumulated, updates);
        Self { id, parent_id, pipeline_name: pipeline_name.into(), step_id: step_id.into(), accumulated_json }
    }
}

/// Shallow-merge `updates` on top of `base`: top-level keys from
/// `updates` win; keys only present in `base` are preserved unchanged;
/// nested objects/arrays are replaced, never merged recursively.
pub fn shallow_merge(base: Option<&Value>, updates: &Value) -> Value {
    let mut merged = match base {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    if let Value::Object(updates) = updates {
        for (k, v) in updates {
            merged.insert(k.clone(), v.clone());
        }
    }
    Value::Object(merged)
}

#[cfg(test)]
#[path = "event_context_tests.rs"]
mod tests;

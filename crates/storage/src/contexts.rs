// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event context storage: the per-lineage accumulated JSON tree.

use rusqlite::{params, OptionalExtension};

use oj_core::{EventContext, EventContextId, StorageError};

use crate::Storage;

impl Storage {
    /// Persist a newly derived event context.
    pub fn insert_event_context(&self, ctx: &EventContext) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        let accumulated = serde_json::to_string(&ctx.accumulated_json).map_err(StorageError::from)?;
        conn.execute(
            "INSERT INTO event_context (id, parent_id, pipeline_name, step_id, accumulated_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                ctx.id.as_str(),
                ctx.parent_id.as_ref().map(|p| p.as_str().to_string()),
                ctx.pipeline_name,
                ctx.step_id,
                accumulated,
            ],
        )
        .map_err(|e| StorageError::Sqlite(e.to_string()))?;
        Ok(())
    }

    pub fn get_event_context(&self, id: &EventContextId) -> Result<Option<EventContext>, StorageError> {
        let conn = self.conn.lock();
        conn.query_row("SELECT * FROM event_context WHERE id = ?1", params![id.as_str()], context_from_row)
            .optional()
            .map_err(|e| StorageError::Sqlite(e.to_string()))
    }
}

fn context_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventContext> {
    let id: String = row.get("id")?;
    let parent_id: Option<String> = row.get("parent_id")?;
    let pipeline_name: String = row.get("pipeline_name")?;
    let step_id: String = row.get("step_id")?;
    let accumulated_json: String = row.get("accumulated_json")?;

    let value = serde_json::from_str(&accumulated_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(EventContext {
        id: EventContextId::from_string(id),
        parent_id: parent_id.map(EventContextId::from_string),
        pipeline_name,
        step_id,
        accumulated_json: value,
    })
}

#[cfg(test)]
#[path = "contexts_tests.rs"]
mod tests;

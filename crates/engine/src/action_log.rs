// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Action Log service (spec §4.2): wraps the append-only store with the
//! `record` / `complete` contract. Each call appends a full snapshot line;
//! `complete` is "idempotent" in the sense that replaying it with the same
//! result converges to the same final state, since the log replays to
//! last-write-wins per entry id.

use std::sync::Arc;

use undoable_core::{ActionCategory, ActionLogEntry, ActionLogEntryId, ActionResult, ActionSpec};
use undoable_storage::ActionLogStore;

use crate::error::EngineError;

pub struct ActionLogService {
    store: Arc<ActionLogStore>,
}

impl ActionLogService {
    pub fn new(store: Arc<ActionLogStore>) -> Self {
        Self { store }
    }

    /// Records a pending entry and returns its id. MUST be called (and
    /// durably appended) before the tool executes, so the entry exists even
    /// if the process crashes mid-invocation (spec §4.2 contract).
    pub fn record(&self, spec: ActionSpec, now_ms: u64) -> Result<ActionLogEntryId, EngineError> {
        let entry = ActionLogEntry {
            id: ActionLogEntryId::new(),
            run_id: spec.run_id,
            tool: spec.tool,
            category: spec.category,
            params: spec.params,
            approval: spec.approval,
            undoable: spec.undoable,
            undo_data: spec.undo_data,
            started_at_ms: now_ms,
            completed_at_ms: None,
            result: None,
        };
        self.store.append(&entry)?;
        Ok(entry.id)
    }

    pub fn complete(&self, entry_id: &ActionLogEntryId, result: ActionResult, now_ms: u64) -> Result<(), EngineError> {
        let entries = self.store.load_all()?;
        let pending = entries
            .into_iter()
            .rev()
            .find(|e| &e.id == entry_id)
            .ok_or_else(|| EngineError::Core(undoable_core::CoreError::NotFound(entry_id.to_string())))?;
        let completed = ActionLogEntry {
            completed_at_ms: Some(now_ms),
            result: Some(result),
            ..pending
        };
        self.store.append(&completed)?;
        Ok(())
    }

    /// Appends a new entry recording the reversal of a prior one (spec §4.8:
    /// "category `compensation`"). Compensations are themselves completed
    /// immediately since the reversal already ran by the time this is called.
    pub fn record_compensation(
        &self,
        reversed: &ActionLogEntry,
        category: ActionCategory,
        outcome: ActionResult,
        now_ms: u64,
    ) -> Result<ActionLogEntryId, EngineError> {
        let entry = ActionLogEntry {
            id: ActionLogEntryId::new(),
            run_id: reversed.run_id.clone(),
            tool: format!("undo:{}", reversed.tool),
            category,
            params: serde_json::json!({ "reverses": reversed.id.as_str() }),
            approval: undoable_core::ApprovalDecision::AutoApproved,
            undoable: false,
            undo_data: None,
            started_at_ms: now_ms,
            completed_at_ms: Some(now_ms),
            result: Some(outcome),
        };
        self.store.append(&entry)?;
        Ok(entry.id)
    }

    /// Latest recorded state per entry id, oldest-first by the id's first
    /// appearance, as the Undo Service needs (spec §4.8: "iterates the
    /// Action Log in reverse").
    pub fn latest_states(&self) -> Result<Vec<ActionLogEntry>, EngineError> {
        let all = self.store.load_all()?;
        let mut order: Vec<ActionLogEntryId> = Vec::new();
        let mut latest: std::collections::HashMap<ActionLogEntryId, ActionLogEntry> = std::collections::HashMap::new();
        for entry in all {
            if !latest.contains_key(&entry.id) {
                order.push(entry.id.clone());
            }
            latest.insert(entry.id.clone(), entry);
        }
        Ok(order.into_iter().filter_map(|id| latest.remove(&id)).collect())
    }

    pub fn for_run(&self, run_id: &str) -> Result<Vec<ActionLogEntry>, EngineError> {
        Ok(self
            .latest_states()?
            .into_iter()
            .filter(|e| e.run_id.as_deref() == Some(run_id))
            .collect())
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run Manager (spec §4.6): thin CRUD over Runs with guarded transitions,
//! backed by either persistence policy from `undoable-storage`.

use std::sync::Arc;

use undoable_core::{BusEvent, Run, RunId, RunStatus};
use undoable_storage::RunStore;

use crate::bus::EventBus;
use crate::error::EngineError;

pub struct CreateRunSpec {
    pub owner: String,
    pub instruction: String,
    pub agent_id: Option<String>,
    pub job_id: Option<String>,
}

pub struct RunManager {
    store: Arc<dyn RunStore>,
    bus: Arc<EventBus>,
}

impl RunManager {
    pub fn new(store: Arc<dyn RunStore>, bus: Arc<EventBus>) -> Self {
        Self { store, bus }
    }

    pub fn create(&self, spec: CreateRunSpec, now_ms: u64) -> Result<Run, EngineError> {
        let mut run = Run::new(spec.owner, spec.instruction, now_ms);
        run.agent_id = spec.agent_id;
        run.job_id = spec.job_id;
        self.store.upsert(&run)?;
        self.publish_status(&run);
        Ok(run)
    }

    pub fn get_by_id(&self, id: &RunId) -> Result<Run, EngineError> {
        self.store
            .get(id)?
            .ok_or_else(|| EngineError::RunNotFound(id.as_str().to_string()))
    }

    pub fn list(&self) -> Result<Vec<Run>, EngineError> {
        Ok(self.store.list()?)
    }

    pub fn list_by_job_id(&self, job_id: &str) -> Result<Vec<Run>, EngineError> {
        Ok(self.store.list_by_job_id(job_id)?)
    }

    /// Transitions `id` to `new_status`, rejecting moves `RunStatus::can_advance_to`
    /// disallows. `actor` is currently unused beyond documenting intent at the
    /// call site (no audit-log fan-out for transitions themselves — the
    /// Action Log records tool effects, not status changes).
    pub fn update_status(&self, id: &RunId, new_status: RunStatus, _actor: &str, now_ms: u64) -> Result<Run, EngineError> {
        let mut run = self.get_by_id(id)?;
        if !run.status.can_advance_to(new_status) {
            return Err(undoable_core::CoreError::InvalidTransition {
                from: run.status.to_string(),
                to: new_status.to_string(),
            }
            .into());
        }
        if new_status == RunStatus::Paused {
            run.paused_from = Some(run.status);
        }
        run.status = new_status;
        run.updated_at_ms = now_ms;
        self.store.upsert(&run)?;
        self.publish_status(&run);
        Ok(run)
    }

    pub fn delete(&self, id: &RunId) -> Result<(), EngineError> {
        self.store.delete(id)?;
        Ok(())
    }

    fn publish_status(&self, run: &Run) {
        self.bus.publish(&format!("run.{}", run.id.as_str()), BusEvent::StatusChange { status: run.status });
    }
}

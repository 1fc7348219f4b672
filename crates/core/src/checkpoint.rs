// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint — per-run serialised state snapshot (spec §3, §4.4).

use crate::plan::StepResult;
use crate::run::{RunId, RunStatus};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Phase the run was in when the checkpoint was written. Coarser than
/// `RunStatus` would suggest is necessary, but kept distinct from it so a
/// checkpoint can describe "mid-shadow, step 3 of 7" without overloading
/// the Run's own status field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Plan,
    Shadow,
    ApprovalRequired,
    Apply,
    Undo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub run_id: RunId,
    pub status: RunStatus,
    pub phase: Phase,
    #[serde(default)]
    pub completed_step_ids: HashSet<String>,
    #[serde(default)]
    pub failed_step_ids: HashSet<String>,
    #[serde(default)]
    pub step_results: HashMap<String, StepResult>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub saved_at_ms: u64,
}

impl Checkpoint {
    pub fn new(run_id: RunId, status: RunStatus, phase: Phase, now_ms: u64) -> Self {
        Self {
            run_id,
            status,
            phase,
            completed_step_ids: HashSet::new(),
            failed_step_ids: HashSet::new(),
            step_results: HashMap::new(),
            metadata: serde_json::Value::Null,
            saved_at_ms: now_ms,
        }
    }

    pub fn record_step(&mut self, result: StepResult) {
        if result.success {
            self.completed_step_ids.insert(result.step_id.clone());
        } else {
            self.failed_step_ids.insert(result.step_id.clone());
        }
        self.step_results.insert(result.step_id.clone(), result);
    }
}

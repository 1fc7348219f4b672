// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PlanGraph, Step and StepResult (spec §3).

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Schema version currently accepted from a `PlanProducer`.
pub const PLAN_SCHEMA_VERSION: u32 = 1;

/// A single step in a plan, as produced by an external `PlanProducer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub tool: String,
    pub intent: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub reversible: bool,
    /// Ids of preceding steps this step depends on.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// A validated DAG of steps produced by an external `PlanProducer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanGraph {
    pub schema_version: u32,
    pub instruction: String,
    pub agent_id: String,
    pub steps: Vec<Step>,
}

impl PlanGraph {
    /// Validate schema version, unique step ids, and that `depends_on` only
    /// references strictly preceding steps (so the dependency graph is
    /// acyclic by construction). Spec §3 PlanGraph invariant / §8 property 5.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.schema_version != PLAN_SCHEMA_VERSION {
            return Err(CoreError::InvalidPlan(format!(
                "unsupported schema version {}",
                self.schema_version
            )));
        }
        if self.steps.is_empty() {
            return Err(CoreError::InvalidPlan("plan has no steps".into()));
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for (idx, step) in self.steps.iter().enumerate() {
            if !seen.insert(step.id.as_str()) {
                return Err(CoreError::InvalidPlan(format!("duplicate step id {:?}", step.id)));
            }
            for dep in &step.depends_on {
                if !seen.contains(dep.as_str()) {
                    return Err(CoreError::InvalidPlan(format!(
                        "step {:?} (position {idx}) depends on {:?}, which is not a preceding step",
                        step.id, dep
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }
}

/// Result of executing (or skipping) one step during the shadow phase.
/// Carried verbatim into `BusEvent::StepResult` on the wire (spec §6 "wire
/// boundary" rule), so field names are camelCase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step_id: String,
    pub tool: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl StepResult {
    pub fn ok(step_id: impl Into<String>, tool: impl Into<String>, output: serde_json::Value, duration: Duration) -> Self {
        Self {
            step_id: step_id.into(),
            tool: tool.into(),
            success: true,
            output: Some(output),
            error: None,
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub fn skipped(step_id: impl Into<String>, tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            tool: tool.into(),
            success: false,
            output: None,
            error: Some(reason.into()),
            duration_ms: 0,
        }
    }

    pub fn failed(step_id: impl Into<String>, tool: impl Into<String>, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            step_id: step_id.into(),
            tool: tool.into(),
            success: false,
            output: None,
            error: Some(error.into()),
            duration_ms: duration.as_millis() as u64,
        }
    }
}

/// Map of step id -> result, plus the set of ids that failed (as opposed to
/// skipped), used by the shadow phase to decide which dependents to skip.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepResults(pub HashMap<String, StepResult>);

impl StepResults {
    pub fn has_failed_ancestor(&self, step: &Step) -> Option<&str> {
        step.depends_on
            .iter()
            .find(|dep| matches!(self.0.get(dep.as_str()), Some(r) if !r.success))
            .map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, deps: &[&str]) -> Step {
        Step {
            id: id.to_string(),
            tool: "noop".into(),
            intent: "test".into(),
            params: serde_json::Value::Null,
            capabilities: vec![],
            reversible: true,
            depends_on: deps.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn plan(steps: Vec<Step>) -> PlanGraph {
        PlanGraph { schema_version: PLAN_SCHEMA_VERSION, instruction: "do it".into(), agent_id: "a1".into(), steps }
    }

    #[test]
    fn rejects_forward_dependency() {
        let p = plan(vec![step("s1", &["s2"]), step("s2", &[])]);
        assert!(p.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let p = plan(vec![step("s1", &[]), step("s1", &[])]);
        assert!(p.validate().is_err());
    }

    #[test]
    fn accepts_valid_chain() {
        let p = plan(vec![step("s1", &[]), step("s2", &["s1"])]);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn rejects_wrong_schema_version() {
        let mut p = plan(vec![step("s1", &[])]);
        p.schema_version = 2;
        assert!(p.validate().is_err());
    }
}

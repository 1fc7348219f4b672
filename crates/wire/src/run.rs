// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run DTOs for `POST/GET /runs...` (spec §6).

use serde::{Deserialize, Serialize};
use undoable_core::{Run, RunStatus};

use crate::time::iso8601;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDto {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub owner: String,
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub status: RunStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Run> for RunDto {
    fn from(run: &Run) -> Self {
        Self {
            id: run.id.as_str().to_string(),
            job_id: run.job_id.clone(),
            owner: run.owner.clone(),
            instruction: run.instruction.clone(),
            agent_id: run.agent_id.clone(),
            status: run.status,
            created_at: iso8601(run.created_at_ms),
            updated_at: iso8601(run.updated_at_ms),
        }
    }
}

/// `POST /runs` request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRunRequest {
    pub instruction: String,
    #[serde(default)]
    pub agent_id: Option<String>,
}

/// `GET /runs?jobId=` query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListRunsQuery {
    #[serde(default, rename = "jobId")]
    pub job_id: Option<String>,
}

/// `POST /runs/:id/:action` path action (spec §6: `pause, resume, cancel, apply, undo`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunAction {
    Pause,
    Resume,
    Cancel,
    Apply,
    Undo,
}

impl std::str::FromStr for RunAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pause" => Ok(Self::Pause),
            "resume" => Ok(Self::Resume),
            "cancel" => Ok(Self::Cancel),
            "apply" => Ok(Self::Apply),
            "undo" => Ok(Self::Undo),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_actions() {
        assert_eq!("pause".parse::<RunAction>(), Ok(RunAction::Pause));
        assert_eq!("undo".parse::<RunAction>(), Ok(RunAction::Undo));
        assert!("bogus".parse::<RunAction>().is_err());
    }

    #[test]
    fn run_dto_serializes_with_camel_case_keys() {
        let dto = RunDto {
            id: "run-1".into(),
            job_id: Some("job-1".into()),
            owner: "alice".into(),
            instruction: "do it".into(),
            agent_id: Some("agent-1".into()),
            status: undoable_core::RunStatus::Planning,
            created_at: "2026-01-01T00:00:00Z".into(),
            updated_at: "2026-01-01T00:00:00Z".into(),
        };
        let value = serde_json::to_value(&dto).expect("serialize");
        assert_eq!(value["jobId"], "job-1");
        assert_eq!(value["agentId"], "agent-1");
        assert_eq!(value["createdAt"], "2026-01-01T00:00:00Z");
        assert_eq!(value["updatedAt"], "2026-01-01T00:00:00Z");
        assert!(value.get("job_id").is_none());
        assert!(value.get("agent_id").is_none());
    }

    #[test]
    fn create_run_request_accepts_camel_case_agent_id() {
        let req: CreateRunRequest =
            serde_json::from_value(serde_json::json!({"instruction": "do it", "agentId": "agent-1"})).expect("deserialize");
        assert_eq!(req.agent_id.as_deref(), Some("agent-1"));
    }
}

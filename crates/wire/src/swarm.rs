// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Swarm workflow/orchestration DTOs for `/workflows...` (spec §6, §4.9).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use undoable_core::{NodeStatus, SwarmEdge, SwarmNode, SwarmWorkflow};
use undoable_engine::{OrchestrationSnapshot, OrchestrationStatus, OrchestratorOptions};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwarmWorkflowDto {
    pub id: String,
    pub name: String,
    pub nodes: Vec<SwarmNode>,
    pub edges: Vec<SwarmEdge>,
}

impl From<&SwarmWorkflow> for SwarmWorkflowDto {
    fn from(wf: &SwarmWorkflow) -> Self {
        Self {
            id: wf.id.as_str().to_string(),
            name: wf.name.clone(),
            nodes: wf.nodes.clone(),
            edges: wf.edges.clone(),
        }
    }
}

/// `POST /workflows` request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkflowRequest {
    pub name: String,
    pub nodes: Vec<SwarmNode>,
    pub edges: Vec<SwarmEdge>,
}

/// `PATCH /workflows/:id` request body: every field optional, only present
/// fields are applied (spec §6 workflow CRUD).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWorkflowRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub nodes: Option<Vec<SwarmNode>>,
    #[serde(default)]
    pub edges: Option<Vec<SwarmEdge>>,
}

/// `POST /workflows/:id/run` request body. Fields default to
/// `OrchestratorOptions::default()`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunWorkflowRequest {
    #[serde(default)]
    pub allow_concurrent: Option<bool>,
    #[serde(default)]
    pub max_parallel: Option<usize>,
    #[serde(default)]
    pub fail_fast: Option<bool>,
}

impl From<RunWorkflowRequest> for OrchestratorOptions {
    fn from(req: RunWorkflowRequest) -> Self {
        let default = OrchestratorOptions::default();
        Self {
            allow_concurrent: req.allow_concurrent.unwrap_or(default.allow_concurrent),
            max_parallel: req.max_parallel.unwrap_or(default.max_parallel),
            fail_fast: req.fail_fast.unwrap_or(default.fail_fast),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunWorkflowResponse {
    pub orchestration_id: String,
    pub launched: Vec<String>,
    pub skipped: Vec<SkippedNodeDto>,
    pub pending_nodes: Vec<String>,
}

impl From<&OrchestrationSnapshot> for RunWorkflowResponse {
    fn from(snap: &OrchestrationSnapshot) -> Self {
        Self {
            orchestration_id: snap.id.as_str().to_string(),
            launched: snap.launched.keys().cloned().collect(),
            skipped: snap
                .skipped
                .iter()
                .map(|(node_id, reason)| SkippedNodeDto { node_id: node_id.clone(), reason: reason.clone() })
                .collect(),
            pending_nodes: snap.pending_nodes.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationStatusDto {
    Running,
    Completed,
    Failed,
}

impl From<OrchestrationStatus> for OrchestrationStatusDto {
    fn from(status: OrchestrationStatus) -> Self {
        match status {
            OrchestrationStatus::Running => Self::Running,
            OrchestrationStatus::Completed => Self::Completed,
            OrchestrationStatus::Failed => Self::Failed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationSnapshotDto {
    pub orchestration_id: String,
    pub workflow_id: String,
    pub status: OrchestrationStatusDto,
    pub node_status: HashMap<String, NodeStatus>,
    pub launched: HashMap<String, String>,
    pub skipped: Vec<SkippedNodeDto>,
    pub pending_nodes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedNodeDto {
    pub node_id: String,
    pub reason: String,
}

impl From<&OrchestrationSnapshot> for OrchestrationSnapshotDto {
    fn from(snap: &OrchestrationSnapshot) -> Self {
        Self {
            orchestration_id: snap.id.as_str().to_string(),
            workflow_id: snap.workflow_id.as_str().to_string(),
            status: snap.status.into(),
            node_status: snap.node_status.clone(),
            launched: snap.launched.clone(),
            skipped: snap
                .skipped
                .iter()
                .map(|(node_id, reason)| SkippedNodeDto { node_id: node_id.clone(), reason: reason.clone() })
                .collect(),
            pending_nodes: snap.pending_nodes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use undoable_core::{OrchestrationId, WorkflowId};

    #[test]
    fn run_workflow_response_serializes_with_camel_case_keys() {
        let snap = OrchestrationSnapshot {
            id: OrchestrationId::from_string("orch-1"),
            workflow_id: WorkflowId::from_string("wf-1"),
            status: OrchestrationStatus::Running,
            node_status: HashMap::new(),
            launched: HashMap::from([("n1".to_string(), "run-1".to_string())]),
            skipped: vec![("n2".to_string(), "dependency failed".to_string())],
            pending_nodes: vec!["n3".to_string()],
        };

        let response = RunWorkflowResponse::from(&snap);
        let value = serde_json::to_value(&response).expect("serialize response");
        assert_eq!(value["orchestrationId"], "orch-1");
        assert_eq!(value["pendingNodes"][0], "n3");
        assert_eq!(value["skipped"][0]["nodeId"], "n2");
        assert!(value.get("orchestration_id").is_none());
        assert!(value.get("pending_nodes").is_none());

        let dto = OrchestrationSnapshotDto::from(&snap);
        let value = serde_json::to_value(&dto).expect("serialize snapshot");
        assert_eq!(value["orchestrationId"], "orch-1");
        assert_eq!(value["workflowId"], "wf-1");
        assert_eq!(value["nodeStatus"], serde_json::json!({}));
        assert_eq!(value["pendingNodes"][0], "n3");
        assert!(value.get("node_status").is_none());
        assert!(value.get("pending_nodes").is_none());
    }

    #[test]
    fn run_workflow_request_accepts_camel_case_keys() {
        let req: RunWorkflowRequest = serde_json::from_value(serde_json::json!({
            "allowConcurrent": true,
            "maxParallel": 4,
            "failFast": false,
        }))
        .expect("deserialize");
        assert_eq!(req.allow_concurrent, Some(true));
        assert_eq!(req.max_parallel, Some(4));
        assert_eq!(req.fail_fast, Some(false));
    }
}

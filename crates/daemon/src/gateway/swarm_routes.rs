// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/swarm/workflows...` handlers (spec §4.9, §6).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use undoable_core::{Clock, OrchestrationId, SwarmWorkflow, WorkflowId};
use undoable_wire::{
    CreateWorkflowRequest, OrchestrationSnapshotDto, RunWorkflowRequest, RunWorkflowResponse, SwarmWorkflowDto,
    UpdateWorkflowRequest,
};

use crate::error::DaemonError;

use super::SharedState;

pub async fn list_workflows<C: Clock + Send + Sync + 'static>(
    State(state): State<SharedState<C>>,
) -> Json<Vec<SwarmWorkflowDto>> {
    Json(state.swarm.list_workflows().iter().map(SwarmWorkflowDto::from).collect())
}

pub async fn create_workflow<C: Clock + Send + Sync + 'static>(
    State(state): State<SharedState<C>>,
    Json(req): Json<CreateWorkflowRequest>,
) -> Result<(StatusCode, Json<SwarmWorkflowDto>), DaemonError> {
    if req.name.trim().is_empty() {
        return Err(DaemonError::Validation("workflow name must not be empty".to_string()));
    }
    let workflow = SwarmWorkflow { id: WorkflowId::new(), name: req.name, nodes: req.nodes, edges: req.edges };
    let workflow = state.swarm.upsert_workflow(workflow)?;
    Ok((StatusCode::CREATED, Json(SwarmWorkflowDto::from(&workflow))))
}

pub async fn get_workflow<C: Clock + Send + Sync + 'static>(
    State(state): State<SharedState<C>>,
    Path(id): Path<String>,
) -> Result<Json<SwarmWorkflowDto>, DaemonError> {
    let workflow = state.swarm.get_workflow(&WorkflowId::from_string(id))?;
    Ok(Json(SwarmWorkflowDto::from(&workflow)))
}

pub async fn update_workflow<C: Clock + Send + Sync + 'static>(
    State(state): State<SharedState<C>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateWorkflowRequest>,
) -> Result<Json<SwarmWorkflowDto>, DaemonError> {
    let workflow_id = WorkflowId::from_string(id);
    let mut workflow = state.swarm.get_workflow(&workflow_id)?;
    if let Some(name) = req.name {
        workflow.name = name;
    }
    if let Some(nodes) = req.nodes {
        workflow.nodes = nodes;
    }
    if let Some(edges) = req.edges {
        workflow.edges = edges;
    }
    let workflow = state.swarm.upsert_workflow(workflow)?;
    Ok(Json(SwarmWorkflowDto::from(&workflow)))
}

pub async fn delete_workflow<C: Clock + Send + Sync + 'static>(
    State(state): State<SharedState<C>>,
    Path(id): Path<String>,
) -> Result<StatusCode, DaemonError> {
    state.swarm.remove_workflow(&WorkflowId::from_string(id))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn run_workflow<C: Clock + Send + Sync + 'static>(
    State(state): State<SharedState<C>>,
    Path(id): Path<String>,
    Json(req): Json<RunWorkflowRequest>,
) -> Result<(StatusCode, Json<RunWorkflowResponse>), DaemonError> {
    let workflow_id = WorkflowId::from_string(id);
    let orchestration_id = state.swarm.start(&workflow_id, req.into()).await?;
    let snapshot = state.swarm.get_orchestration(&orchestration_id)?;
    Ok((StatusCode::CREATED, Json(RunWorkflowResponse::from(&snapshot))))
}

pub async fn get_orchestration<C: Clock + Send + Sync + 'static>(
    State(state): State<SharedState<C>>,
    Path((_workflow_id, orchestration_id)): Path<(String, String)>,
) -> Result<Json<OrchestrationSnapshotDto>, DaemonError> {
    let snapshot = state.swarm.get_orchestration(&OrchestrationId::from_string(orchestration_id))?;
    Ok(Json(OrchestrationSnapshotDto::from(&snapshot)))
}

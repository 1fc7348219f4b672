// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/runs...` handlers (spec §4.7, §6). Run creation and action dispatch
//! kick the Run Executor off on a detached task; the HTTP response reflects
//! the Run's state at the moment of the call, not the eventual outcome —
//! callers that need the rest of the walk subscribe to `/runs/:id/events`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use undoable_core::{Clock, RunId, RunStatus};
use undoable_engine::{CreateRunSpec, UndoTarget};
use undoable_wire::{CreateRunRequest, ListRunsQuery, RunAction, RunDto};

use crate::error::DaemonError;

use super::SharedState;

pub async fn create_run<C: Clock + Send + Sync + 'static>(
    State(state): State<SharedState<C>>,
    Json(req): Json<CreateRunRequest>,
) -> Result<(StatusCode, Json<RunDto>), DaemonError> {
    if req.instruction.trim().is_empty() {
        return Err(DaemonError::Validation("instruction must not be empty".to_string()));
    }
    let now = state.clock.epoch_ms();
    let run = state.run_manager.create(
        CreateRunSpec { owner: "api".to_string(), instruction: req.instruction, agent_id: req.agent_id, job_id: None },
        now,
    )?;

    let executor = state.executor.clone();
    let run_id = run.id.clone();
    tokio::spawn(async move {
        if let Err(err) = executor.run(run_id.clone()).await {
            tracing::warn!(run_id = %run_id, error = %err, "run did not reach applied");
        }
    });

    Ok((StatusCode::CREATED, Json(RunDto::from(&run))))
}

pub async fn list_runs<C: Clock + Send + Sync + 'static>(
    State(state): State<SharedState<C>>,
    Query(query): Query<ListRunsQuery>,
) -> Result<Json<Vec<RunDto>>, DaemonError> {
    let runs = match query.job_id {
        Some(job_id) => state.run_manager.list_by_job_id(&job_id)?,
        None => state.run_manager.list()?,
    };
    Ok(Json(runs.iter().map(RunDto::from).collect()))
}

pub async fn get_run<C: Clock + Send + Sync + 'static>(
    State(state): State<SharedState<C>>,
    Path(id): Path<String>,
) -> Result<Json<RunDto>, DaemonError> {
    let run = state.run_manager.get_by_id(&RunId::from_string(id))?;
    Ok(Json(RunDto::from(&run)))
}

pub async fn run_action<C: Clock + Send + Sync + 'static>(
    State(state): State<SharedState<C>>,
    Path((id, action)): Path<(String, String)>,
) -> Result<Json<RunDto>, DaemonError> {
    let run_id = RunId::from_string(id);
    let action: RunAction = action
        .parse()
        .map_err(|_| DaemonError::Validation(format!("unknown run action: {action}")))?;

    let run = match action {
        RunAction::Pause => state.executor.pause(&run_id)?,
        RunAction::Resume => state.executor.resume(&run_id)?,
        RunAction::Cancel => state.executor.cancel(&run_id)?,
        RunAction::Apply => {
            if !state.executor.resolve_approval(&run_id, true) {
                return Err(DaemonError::Conflict(format!("run {} has no pending approval", run_id.as_str())));
            }
            state.run_manager.get_by_id(&run_id)?
        }
        RunAction::Undo => start_undo(&state, &run_id)?,
    };
    Ok(Json(RunDto::from(&run)))
}

/// Transitions the run to `undoing` and spawns the reversal; `UndoService`
/// walks the Action Log independently of the Run Executor's own lifecycle
/// (spec §4.8: undo is a property of the log, not a tool re-invocation).
fn start_undo<C: Clock + Send + Sync + 'static>(
    state: &SharedState<C>,
    run_id: &RunId,
) -> Result<undoable_core::Run, DaemonError> {
    let now = state.clock.epoch_ms();
    let run = state.run_manager.update_status(run_id, RunStatus::Undoing, "gateway", now)?;

    let undo = state.undo.clone();
    let run_manager = state.run_manager.clone();
    let clock = state.clock.clone();
    let run_id = run_id.clone();
    tokio::spawn(async move {
        let outcome = undo.undo(UndoTarget::Run(run_id.as_str().to_string())).await;
        let now = clock.epoch_ms();
        let next = match outcome {
            Ok(o) if o.error.is_none() => RunStatus::Undone,
            _ => RunStatus::Failed,
        };
        if let Err(err) = run_manager.update_status(&run_id, next, "undo-service", now) {
            tracing::warn!(run_id = %run_id, error = %err, "failed to record undo outcome");
        }
    });

    Ok(run)
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/scheduler/jobs...` handlers (spec §4.5, §6).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use undoable_core::{Clock, JobId};
use undoable_wire::{CreateJobRequest, ScheduledJobDto, UpdateJobRequest};

use crate::error::DaemonError;

use super::SharedState;

pub async fn list_jobs<C: Clock + Send + Sync + 'static>(
    State(state): State<SharedState<C>>,
) -> Json<Vec<ScheduledJobDto>> {
    let jobs = state.scheduler.list().await;
    Json(jobs.iter().map(ScheduledJobDto::from).collect())
}

pub async fn create_job<C: Clock + Send + Sync + 'static>(
    State(state): State<SharedState<C>>,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<ScheduledJobDto>), DaemonError> {
    if req.name.trim().is_empty() {
        return Err(DaemonError::Validation("job name must not be empty".to_string()));
    }
    let job = state.scheduler.add(req.into()).await?;
    Ok((StatusCode::CREATED, Json(ScheduledJobDto::from(&job))))
}

pub async fn get_job<C: Clock + Send + Sync + 'static>(
    State(state): State<SharedState<C>>,
    Path(id): Path<String>,
) -> Result<Json<ScheduledJobDto>, DaemonError> {
    let job_id = JobId::from_string(id);
    match state.scheduler.get(&job_id).await {
        Some(job) => Ok(Json(ScheduledJobDto::from(&job))),
        None => Err(DaemonError::NotFound(format!("job {} not found", job_id.as_str()))),
    }
}

pub async fn update_job<C: Clock + Send + Sync + 'static>(
    State(state): State<SharedState<C>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateJobRequest>,
) -> Result<Json<ScheduledJobDto>, DaemonError> {
    let job_id = JobId::from_string(id);
    let job = state
        .scheduler
        .update(&job_id, |job| {
            if let Some(name) = req.name.clone() {
                job.name = name;
            }
            if let Some(enabled) = req.enabled {
                job.enabled = enabled;
            }
            if let Some(schedule) = req.schedule.clone() {
                job.schedule = schedule;
            }
            if let Some(payload) = req.payload.clone() {
                job.payload = payload;
            }
            if let Some(delete_after_run) = req.delete_after_run {
                job.delete_after_run = delete_after_run;
            }
        })
        .await?;
    Ok(Json(ScheduledJobDto::from(&job)))
}

pub async fn delete_job<C: Clock + Send + Sync + 'static>(
    State(state): State<SharedState<C>>,
    Path(id): Path<String>,
) -> Result<StatusCode, DaemonError> {
    state.scheduler.remove(&JobId::from_string(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

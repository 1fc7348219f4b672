// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduled-job DTOs for `/jobs...` (spec §6).

use serde::{Deserialize, Serialize};
use undoable_core::{JobPayload, Schedule, ScheduledJob};
use undoable_engine::CreateJobSpec;

use crate::time::iso8601_opt;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStateDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_duration_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub consecutive_errors: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledJobDto {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub schedule: Schedule,
    pub payload: JobPayload,
    pub delete_after_run: bool,
    pub state: JobStateDto,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&ScheduledJob> for ScheduledJobDto {
    fn from(job: &ScheduledJob) -> Self {
        Self {
            id: job.id.as_str().to_string(),
            name: job.name.clone(),
            enabled: job.enabled,
            schedule: job.schedule.clone(),
            payload: job.payload.clone(),
            delete_after_run: job.delete_after_run,
            state: JobStateDto {
                next_run_at: iso8601_opt(job.state.next_run_at_ms),
                running_at: iso8601_opt(job.state.running_at_ms),
                last_run_at: iso8601_opt(job.state.last_run_at_ms),
                last_status: job.state.last_status.clone(),
                last_duration_ms: job.state.last_duration_ms,
                last_error: job.state.last_error.clone(),
                consecutive_errors: job.state.consecutive_errors,
            },
            created_at: iso8601_opt(Some(job.created_at_ms)).unwrap_or_default(),
            updated_at: iso8601_opt(Some(job.updated_at_ms)).unwrap_or_default(),
        }
    }
}

/// `POST/PATCH /jobs` request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub schedule: Schedule,
    pub payload: JobPayload,
    #[serde(default)]
    pub delete_after_run: bool,
}

fn default_true() -> bool {
    true
}

impl From<CreateJobRequest> for CreateJobSpec {
    fn from(req: CreateJobRequest) -> Self {
        CreateJobSpec {
            name: req.name,
            enabled: req.enabled,
            schedule: req.schedule,
            payload: req.payload,
            delete_after_run: req.delete_after_run,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateJobRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub schedule: Option<Schedule>,
    #[serde(default)]
    pub payload: Option<JobPayload>,
    #[serde(default)]
    pub delete_after_run: Option<bool>,
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP/SSE wire DTOs shared by the gateway (`undoabled`) and its clients
//! (`undoable` CLI). Domain types live in `undoable-core`/`undoable-engine`;
//! this crate only adapts them to the wire boundary — RFC3339 timestamps,
//! camelCase JSON, and request/response envelopes (spec §6).

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod error;
pub mod health;
pub mod operation;
pub mod run;
pub mod scheduler;
pub mod settings;
pub mod sse;
pub mod swarm;
pub mod time;

pub use error::{ErrorKind, ErrorResponse};
pub use health::{HealthCheckDto, HealthResponse, ReadyResponse};
pub use operation::{OperationMode, OperationStatusResponse, PatchOperationRequest, DAEMON_OPERATION_MODE_BLOCK};
pub use run::{CreateRunRequest, ListRunsQuery, RunAction, RunDto};
pub use scheduler::{CreateJobRequest, JobStateDto, ScheduledJobDto, UpdateJobRequest};
pub use settings::{AuthMode, BindMode, DaemonSettingsDto, PatchSettingsRequest, SettingsResponse};
pub use sse::{SseEnvelope, HEARTBEAT_FRAME};
pub use swarm::{
    CreateWorkflowRequest, OrchestrationSnapshotDto, OrchestrationStatusDto, RunWorkflowRequest, RunWorkflowResponse,
    SkippedNodeDto, SwarmWorkflowDto, UpdateWorkflowRequest,
};

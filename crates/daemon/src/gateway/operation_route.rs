// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/control/operation` handlers and the operation-mode gate (spec §4.10):
//! `drain`/`paused` block write-creating requests with `423` + the
//! `DAEMON_OPERATION_MODE_BLOCK` code, but never the endpoint that restores
//! `normal` itself, or any read (`GET`).

use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use undoable_core::Clock;
use undoable_wire::{OperationStatusResponse, PatchOperationRequest};

use crate::error::DaemonError;

use super::SharedState;

const CONTROL_OPERATION_PATH: &str = "/control/operation";

pub async fn operation_gate<C: Clock + Send + Sync + 'static>(
    State(state): State<SharedState<C>>,
    req: Request,
    next: Next,
) -> Result<Response, DaemonError> {
    let exempt = req.method() == Method::GET || req.uri().path() == CONTROL_OPERATION_PATH;
    if !exempt && !state.env.operation.mode().admits_writes() {
        return Err(DaemonError::OperationModeBlock {
            reason: state.env.operation.reason().unwrap_or_else(|| format!("mode is {:?}", state.env.operation.mode())),
        });
    }
    Ok(next.run(req).await)
}

pub async fn get_operation<C: Clock + Send + Sync + 'static>(
    State(state): State<SharedState<C>>,
) -> Json<OperationStatusResponse> {
    Json(status(&state))
}

pub async fn patch_operation<C: Clock + Send + Sync + 'static>(
    State(state): State<SharedState<C>>,
    Json(req): Json<PatchOperationRequest>,
) -> Json<OperationStatusResponse> {
    let now = state.clock.epoch_ms();
    state.env.operation.set(req.mode, req.reason, now);
    Json(status(&state))
}

fn status<C: Clock>(state: &SharedState<C>) -> OperationStatusResponse {
    OperationStatusResponse {
        mode: state.env.operation.mode(),
        reason: state.env.operation.reason(),
        updated_at: undoable_wire::time::iso8601(state.env.operation.updated_at_ms()),
    }
}

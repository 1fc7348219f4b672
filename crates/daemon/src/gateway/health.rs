// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/health`, `/ready` and `/settings/daemon` handlers (spec §6).

use axum::extract::State;
use axum::Json;
use undoable_core::Clock;
use undoable_wire::{HealthCheckDto, HealthResponse, PatchSettingsRequest, ReadyResponse, SettingsResponse};

use crate::error::DaemonError;
use crate::settings::DaemonSettings;

use super::SharedState;

fn checks<C: Clock>(state: &SharedState<C>) -> Vec<HealthCheckDto> {
    let home_ok = state.env.home.root().exists();
    vec![HealthCheckDto {
        name: "state_dir".to_string(),
        ok: home_ok,
        detail: (!home_ok).then(|| format!("{} does not exist", state.env.home.root().display())),
    }]
}

pub async fn health<C: Clock + Send + Sync + 'static>(State(state): State<SharedState<C>>) -> Json<HealthResponse> {
    let checks = checks(&state);
    let ready = checks.iter().all(|c| c.ok);
    Json(HealthResponse {
        status: if ready { "ok".to_string() } else { "degraded".to_string() },
        ready,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: state.started_at.elapsed().as_secs(),
        checks,
    })
}

pub async fn ready<C: Clock + Send + Sync + 'static>(State(state): State<SharedState<C>>) -> Json<ReadyResponse> {
    let checks = checks(&state);
    let ready = checks.iter().all(|c| c.ok);
    Json(ReadyResponse { ready, checks })
}

pub async fn get_settings<C: Clock + Send + Sync + 'static>(
    State(state): State<SharedState<C>>,
) -> Result<Json<SettingsResponse>, DaemonError> {
    let desired = DaemonSettings::load(&state.env.home.settings_file())?;
    let effective = &state.env.settings;
    let restart_required = desired.restart_required_against(effective);
    Ok(Json(SettingsResponse { desired: desired.to_dto(), effective: effective.to_dto(), restart_required }))
}

pub async fn patch_settings<C: Clock + Send + Sync + 'static>(
    State(state): State<SharedState<C>>,
    Json(req): Json<PatchSettingsRequest>,
) -> Result<Json<SettingsResponse>, DaemonError> {
    let path = state.env.home.settings_file();
    let mut desired = DaemonSettings::load(&path)?;
    if let Some(bind_mode) = req.bind_mode {
        desired.bind_mode = bind_mode;
    }
    if let Some(host) = req.host {
        desired.host = host;
    }
    if let Some(port) = req.port {
        desired.port = port;
    }
    if let Some(auth_mode) = req.auth_mode {
        desired.auth_mode = auth_mode;
    }
    if let Some(token) = req.token {
        desired.token = if token.is_empty() { None } else { Some(token) };
    }
    if let Some(policy) = req.security_policy {
        desired.security_policy = Some(policy);
    }
    desired.save(&path)?;

    let effective = &state.env.settings;
    let restart_required = desired.restart_required_against(effective);
    Ok(Json(SettingsResponse { desired: desired.to_dto(), effective: effective.to_dto(), restart_required }))
}

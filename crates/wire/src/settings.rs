// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/settings/daemon` DTOs (spec §6 `daemon-settings.json`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindMode {
    Loopback,
    Lan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    None,
    Token,
}

/// Fields that persist to `daemon-settings.json` and round-trip through the
/// wire verbatim (casing handled by `#[serde(rename_all)]` at this boundary
/// only; the daemon's in-memory representation may differ — see
/// `undoabled::settings::DaemonSettings`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonSettingsDto {
    pub bind_mode: BindMode,
    pub host: String,
    pub port: u16,
    pub auth_mode: AuthMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_policy: Option<serde_json::Value>,
}

/// `GET /settings/daemon` response and the shape `PATCH` returns back.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    /// Settings as last written (may differ from `effective` until restart).
    pub desired: DaemonSettingsDto,
    /// Settings the running process is actually bound/authenticating with.
    pub effective: DaemonSettingsDto,
    /// True when `desired != effective` and a restart is needed to apply it
    /// (bind host/port changes are not hot-reloadable; auth changes are).
    pub restart_required: bool,
}

/// `PATCH /settings/daemon` request body — every field optional, merged onto
/// the currently desired settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchSettingsRequest {
    #[serde(default)]
    pub bind_mode: Option<BindMode>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub auth_mode: Option<AuthMode>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub security_policy: Option<serde_json::Value>,
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/health` and `/ready` DTOs (spec §6).

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckDto {
    pub name: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub ready: bool,
    pub version: String,
    /// Seconds since process start.
    pub uptime: u64,
    pub checks: Vec<HealthCheckDto>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub checks: Vec<HealthCheckDto>,
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/control/operation` DTOs (spec §6, §4.10 operation-mode gate).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    Normal,
    Drain,
    Paused,
}

impl OperationMode {
    /// True when write-creating requests (spec §4.10) must be admitted.
    pub fn admits_writes(&self) -> bool {
        matches!(self, OperationMode::Normal)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStatusResponse {
    pub mode: OperationMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatchOperationRequest {
    pub mode: OperationMode,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Error code carried by the 423 response body when the operation-mode gate
/// blocks a request (spec §7).
pub const DAEMON_OPERATION_MODE_BLOCK: &str = "DAEMON_OPERATION_MODE_BLOCK";

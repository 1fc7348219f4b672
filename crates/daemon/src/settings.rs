// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `daemon-settings.json` (spec §6): the daemon's own idea of how it should
//! bind and authenticate, independent of the wire DTO shape in
//! `undoable_wire::settings`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use undoable_storage::atomic::write_atomic;
use undoable_wire::{AuthMode, BindMode, DaemonSettingsDto};

use crate::error::DaemonError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonSettings {
    pub bind_mode: BindMode,
    pub host: String,
    pub port: u16,
    pub auth_mode: AuthMode,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub security_policy: Option<serde_json::Value>,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            bind_mode: BindMode::Loopback,
            host: "127.0.0.1".to_string(),
            port: 4590,
            auth_mode: AuthMode::None,
            token: None,
            security_policy: None,
        }
    }
}

impl DaemonSettings {
    pub fn load(path: &Path) -> Result<Self, DaemonError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read(path)?;
        Ok(serde_json::from_slice(&raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), DaemonError> {
        let bytes = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &bytes)?;
        Ok(())
    }

    pub fn to_dto(&self) -> DaemonSettingsDto {
        DaemonSettingsDto {
            bind_mode: self.bind_mode,
            host: self.host.clone(),
            port: self.port,
            auth_mode: self.auth_mode,
            token: self.token.clone(),
            security_policy: self.security_policy.clone(),
        }
    }

    /// Bind/auth fields that differ from `effective` require a restart to
    /// take hold, since the `TcpListener` is already bound (spec §6.1 note
    /// via SPEC_FULL.md §4.11: settings persist atomically but the running
    /// bind is fixed at process start).
    pub fn restart_required_against(&self, effective: &DaemonSettings) -> bool {
        self.bind_mode != effective.bind_mode || self.host != effective.host || self.port != effective.port
    }
}

pub fn settings_path(state_dir_root: &std::path::Path) -> PathBuf {
    state_dir_root.join("daemon-settings.json")
}

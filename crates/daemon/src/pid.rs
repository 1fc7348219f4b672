// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `daemon.pid.json` (spec §6): advisory, mode 0600. The CLI's `daemon
//! status`/`daemon stop` read this file rather than guessing the port.

use std::path::Path;

use serde::{Deserialize, Serialize};
use undoable_storage::atomic::write_atomic;

use crate::error::DaemonError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PidFile {
    pub pid: u32,
    pub port: u16,
    pub started_at_ms: u64,
}

impl PidFile {
    pub fn write(path: &Path, pid: u32, port: u16, started_at_ms: u64) -> Result<(), DaemonError> {
        let body = Self { pid, port, started_at_ms };
        let bytes = serde_json::to_vec_pretty(&body)?;
        write_atomic(path, &bytes)?;
        set_owner_only_permissions(path)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Option<Self>, DaemonError> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read(path)?;
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    pub fn remove(path: &Path) -> Result<(), DaemonError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// True if `pid` names a running process (best-effort via signal 0;
    /// only meaningful on unix).
    #[cfg(unix)]
    pub fn process_is_alive(&self) -> bool {
        // SAFETY: `kill(pid, 0)` sends no signal, only probes existence and
        // permission; it has no memory-safety preconditions.
        unsafe { libc::kill(self.pid as libc::pid_t, 0) == 0 }
    }

    #[cfg(not(unix))]
    pub fn process_is_alive(&self) -> bool {
        true
    }
}

#[cfg(unix)]
fn set_owner_only_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    let perms = std::fs::Permissions::from_mode(0o600);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}

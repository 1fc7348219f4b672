// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate (spec §6
//! "Environment variables consumed by the core").

use undoable_engine::ApprovalMode;
use undoable_storage::HomeLayout;

use crate::error::DaemonError;

/// Resolve `<home>/.undoable/`, honoring `UNDOABLE_STATE_DIR` before falling
/// back to the platform home directory (spec §6).
pub fn home_layout() -> Result<HomeLayout, DaemonError> {
    if let Ok(dir) = std::env::var("UNDOABLE_STATE_DIR") {
        return Ok(HomeLayout::new(dir));
    }
    HomeLayout::discover().ok_or(DaemonError::NoHomeDir)
}

/// Bind port: `NRN_PORT` takes precedence over `UNDOABLE_DAEMON_PORT`; both
/// are overridden by an explicit `--port` CLI flag.
pub fn port() -> Option<u16> {
    std::env::var("NRN_PORT")
        .ok()
        .or_else(|| std::env::var("UNDOABLE_DAEMON_PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
}

/// Bind host: `NRN_HOST` takes precedence over `UNDOABLE_DAEMON_HOST`.
pub fn host() -> Option<String> {
    std::env::var("NRN_HOST").ok().or_else(|| std::env::var("UNDOABLE_DAEMON_HOST").ok())
}

/// Bearer token for gateway auth. Loopback-only admission applies when unset
/// (spec §4.10, §8 invariant 8).
pub fn auth_token() -> Option<String> {
    std::env::var("UNDOABLE_JWT_SECRET").ok().filter(|s| !s.is_empty())
}

/// `tracing_subscriber::EnvFilter` directive, default `info`.
pub fn log_level() -> String {
    std::env::var("UNDOABLE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
}

/// Approval Gate mode (spec §4.3). Defaults to `always`, the safest choice
/// when the operator hasn't opted into auto-approval.
pub fn approval_mode() -> ApprovalMode {
    match std::env::var("UNDOABLE_APPROVAL_MODE").as_deref() {
        Ok("auto_safe") | Ok("auto-safe") => ApprovalMode::AutoSafe,
        Ok("never_ask") | Ok("never-ask") => ApprovalMode::NeverAsk,
        _ => ApprovalMode::Always,
    }
}

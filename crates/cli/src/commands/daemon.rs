// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `undoable daemon start|stop|status` (spec §6 CLI surface). The daemon
//! speaks HTTP, not the length-prefixed IPC protocol a richer CLI might use,
//! so lifecycle management here is pid-file-and-process-signal based: find
//! the binary, spawn it detached, poll `daemon.pid.json` until the process
//! reports alive (or the wait budget runs out).

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use clap::Subcommand;
use undoabled::pid::PidFile;

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start the daemon in the background.
    Start {
        /// Bind port override, forwarded to the daemon.
        #[arg(long)]
        port: Option<u16>,
        /// Emit machine-readable JSON instead of text.
        #[arg(long)]
        json: bool,
        /// How long to wait for the daemon to report ready.
        #[arg(long, default_value_t = 3000)]
        wait_ms: u64,
    },
    /// Stop the running daemon.
    Stop {
        #[arg(long)]
        json: bool,
        /// How long to wait for the process to exit.
        #[arg(long, default_value_t = 3000)]
        wait_ms: u64,
    },
    /// Report whether the daemon is running.
    Status {
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(command: DaemonCommand) -> Result<()> {
    match command {
        DaemonCommand::Start { port, json, wait_ms } => start(port, json, wait_ms).await,
        DaemonCommand::Stop { json, wait_ms } => stop(json, wait_ms).await,
        DaemonCommand::Status { json } => status(json).await,
    }
}

async fn start(port: Option<u16>, json: bool, wait_ms: u64) -> Result<()> {
    let home = undoabled::env::home_layout().map_err(|e| anyhow!("{e}"))?;
    std::fs::create_dir_all(home.root())?;

    if let Some(existing) = PidFile::read(&home.pid_file())? {
        if existing.process_is_alive() {
            return print_running(json, existing).await;
        }
    }

    let binary = find_daemon_binary()?;
    let mut cmd = Command::new(&binary);
    if let Some(port) = port {
        cmd.arg("--port").arg(port.to_string());
    }
    cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
    cmd.spawn().map_err(|e| anyhow!("failed to spawn {}: {e}", binary.display()))?;

    let deadline = Instant::now() + Duration::from_millis(wait_ms);
    loop {
        if let Some(pid_file) = PidFile::read(&home.pid_file())? {
            if pid_file.process_is_alive() {
                return print_running(json, pid_file).await;
            }
        }
        if Instant::now() >= deadline {
            return Err(anyhow!("daemon did not report ready within {wait_ms}ms"));
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

async fn stop(json: bool, wait_ms: u64) -> Result<()> {
    let home = undoabled::env::home_layout().map_err(|e| anyhow!("{e}"))?;
    let Some(pid_file) = PidFile::read(&home.pid_file())? else {
        return print_not_running(json);
    };
    if !pid_file.process_is_alive() {
        PidFile::remove(&home.pid_file())?;
        return print_not_running(json);
    }

    send_terminate(pid_file.pid)?;

    let deadline = Instant::now() + Duration::from_millis(wait_ms);
    loop {
        match PidFile::read(&home.pid_file())? {
            Some(current) if current.process_is_alive() => {
                if Instant::now() >= deadline {
                    return Err(anyhow!("daemon did not stop within {wait_ms}ms"));
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            _ => break,
        }
    }

    if json {
        println!("{}", serde_json::json!({ "status": "stopped" }));
    } else {
        println!("Daemon stopped");
    }
    Ok(())
}

async fn status(json: bool) -> Result<()> {
    let home = undoabled::env::home_layout().map_err(|e| anyhow!("{e}"))?;
    match PidFile::read(&home.pid_file())? {
        Some(pid_file) if pid_file.process_is_alive() => print_running(json, pid_file).await,
        _ => print_not_running(json),
    }
}

async fn print_running(json: bool, pid_file: PidFile) -> Result<()> {
    let reachable = probe_health(pid_file.port).await;
    if json {
        println!(
            "{}",
            serde_json::json!({
                "status": "running",
                "pid": pid_file.pid,
                "port": pid_file.port,
                "reachable": reachable,
            })
        );
    } else {
        println!("Status: running");
        println!("PID: {}", pid_file.pid);
        println!("Port: {}", pid_file.port);
        if !reachable {
            println!("Warning: pid file present but gateway is not responding on /health");
        }
    }
    Ok(())
}

fn print_not_running(json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::json!({ "status": "not_running" }));
    } else {
        println!("Daemon not running");
    }
    Ok(())
}

/// Best-effort liveness probe against the gateway's `/health` route; a
/// missing daemon process already answered the question, this just tells
/// the operator whether the HTTP side came up too.
async fn probe_health(port: u16) -> bool {
    let url = format!("http://127.0.0.1:{port}/health");
    let client = match reqwest::Client::builder().timeout(Duration::from_millis(500)).build() {
        Ok(c) => c,
        Err(_) => return false,
    };
    client.get(url).send().await.map(|resp| resp.status().is_success()).unwrap_or(false)
}

#[cfg(unix)]
fn send_terminate(pid: u32) -> Result<()> {
    // SAFETY: `kill` with SIGTERM has no memory-safety preconditions; a
    // stale pid simply fails with ESRCH, which we treat as already-stopped.
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(anyhow!("failed to signal pid {pid}: {err}"));
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn send_terminate(_pid: u32) -> Result<()> {
    Err(anyhow!("stopping the daemon is only supported on unix"))
}

/// Looks for `undoabled` next to the running `undoable` binary first (the
/// common case: both installed side by side), then falls back to a bare
/// `PathBuf` so `Command::spawn` resolves it via `PATH`.
fn find_daemon_binary() -> Result<PathBuf> {
    if let Ok(current_exe) = std::env::current_exe() {
        if let Some(dir) = current_exe.parent() {
            let sibling = dir.join(daemon_binary_name());
            if sibling.exists() {
                return Ok(sibling);
            }
        }
    }
    Ok(PathBuf::from(daemon_binary_name()))
}

#[cfg(windows)]
fn daemon_binary_name() -> &'static str {
    "undoabled.exe"
}

#[cfg(not(windows))]
fn daemon_binary_name() -> &'static str {
    "undoabled"
}

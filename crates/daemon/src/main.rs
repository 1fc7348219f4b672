// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `undoabled`: binds the HTTP gateway, starts the scheduler's timer loop,
//! and runs until a shutdown signal arrives.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use fs2::FileExt;
use undoable_adapters::ToolRegistry;
use undoable_core::SystemClock;
use undoable_engine::{
    ActionLogService, EventBus, RunExecutor, RunManager, Scheduler, SchedulerConfig, SwarmOrchestrator, UndoService,
};
use undoable_storage::{ActionLogStore, CheckpointStore, FileRunStore, SchedulerStore};
use undoabled::adapters::{EmptyToolRegistry, UnconfiguredPlanProducer};
use undoabled::gateway::{build_router, AppState};
use undoabled::settings::DaemonSettings;
use undoabled::{env, pid, Environment};

#[derive(Parser, Debug)]
#[command(name = "undoabled", about = "Undoable agent-runtime daemon")]
struct Cli {
    /// Bind port override, takes precedence over settings/env.
    #[arg(long)]
    port: Option<u16>,

    /// Bind host override.
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(env::log_level()))
        .init();

    let home = env::home_layout()?;
    std::fs::create_dir_all(home.root())?;
    std::fs::create_dir_all(home.checkpoints_dir())?;
    std::fs::create_dir_all(home.workspace_dir())?;

    let pid_path = home.pid_file();
    let lock_file = acquire_single_instance_lock(&pid_path)?;

    let mut settings = DaemonSettings::load(&home.settings_file())?;
    if let Some(host) = cli.host.or_else(env::host) {
        settings.host = host;
    }
    if let Some(port) = cli.port.or_else(env::port) {
        settings.port = port;
    }
    if let Some(token) = env::auth_token() {
        settings.token = Some(token);
    }
    settings.save(&home.settings_file())?;

    let clock = SystemClock;
    let now = clock.epoch_ms();
    let environment = Environment::new(home.clone(), settings, now);
    let bind_addr: SocketAddr = environment.bind_addr().parse()?;

    let run_store = Arc::new(FileRunStore::new(home.runs_file()));
    let checkpoints = Arc::new(CheckpointStore::new(home.checkpoints_dir()));
    let action_log_store = Arc::new(ActionLogStore::new(home.action_log_file()));
    let scheduler_store = Arc::new(SchedulerStore::new(home.scheduler_file()));

    let bus = Arc::new(EventBus::new());
    let run_manager = Arc::new(RunManager::new(run_store, bus.clone()));
    let action_log = Arc::new(ActionLogService::new(action_log_store));
    let producer: Arc<dyn undoable_adapters::PlanProducer> = Arc::new(UnconfiguredPlanProducer);
    let tools: Arc<dyn ToolRegistry> = Arc::new(EmptyToolRegistry);

    let executor = Arc::new(RunExecutor::new(
        checkpoints,
        action_log.clone(),
        run_manager.clone(),
        bus.clone(),
        producer,
        tools,
        env::approval_mode(),
        home.workspace_dir(),
        clock,
    ));
    let scheduler =
        Arc::new(Scheduler::new(scheduler_store, bus.clone(), run_manager.clone(), clock, SchedulerConfig::default())?);
    let swarm = Arc::new(SwarmOrchestrator::new(run_manager.clone(), executor.clone(), bus.clone(), clock));
    let undo = Arc::new(UndoService::new(action_log.clone(), clock));

    let state = Arc::new(AppState {
        env: environment,
        run_manager,
        executor,
        scheduler: scheduler.clone(),
        swarm,
        undo,
        action_log,
        bus,
        clock,
        started_at: Instant::now(),
    });

    let missed = scheduler.start().await?;
    if !missed.is_empty() {
        tracing::info!(count = missed.len(), "recovered missed scheduler jobs on startup");
    }
    tokio::spawn(run_timer_loop(scheduler));

    pid::PidFile::write(&pid_path, std::process::id(), bind_addr.port(), now)?;

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "undoabled listening");

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pid::PidFile::remove(&pid_path)?;
    drop(lock_file);
    Ok(())
}

/// Runs the Scheduler's dispatch loop: tick, then sleep for the delay it
/// reports (capped by `SchedulerConfig::max_timer_delay_ms`), forever.
async fn run_timer_loop<C: undoable_core::Clock + Send + Sync + 'static>(scheduler: Arc<Scheduler<C>>) {
    loop {
        let delay_ms = scheduler.next_wake_delay_ms().await.max(50) as u64;
        tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
        if let Err(err) = scheduler.tick().await {
            tracing::warn!(error = %err, "scheduler tick failed");
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(_) => return,
        };
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Takes an exclusive advisory lock on the pid file so two `undoabled`
/// processes never bind the same state directory concurrently. The lock is
/// held for the process lifetime by leaking the file handle into the
/// caller's scope (dropped, and released, on clean shutdown).
fn acquire_single_instance_lock(pid_path: &std::path::Path) -> anyhow::Result<std::fs::File> {
    let file = std::fs::OpenOptions::new().create(true).write(true).open(pid_path)?;
    file.try_lock_exclusive().map_err(|_| anyhow::anyhow!("another undoabled instance already holds {}", pid_path.display()))?;
    Ok(file)
}

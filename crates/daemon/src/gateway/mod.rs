// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The HTTP gateway (C10, spec §4.10, §6). Router construction is grounded
//! in `examples/jdsingh122918-forge/src/factory/{server.rs,api.rs}`'s
//! `AppState`/`SharedState` + `Router::route` table style; the admission and
//! operation-mode gates are original to this spec (the teacher's `ojd`
//! speaks a length-prefixed IPC protocol, not HTTP).

mod auth;
mod health;
mod operation_route;
mod runs;
mod scheduler_routes;
mod sse;
mod swarm_routes;

use std::sync::Arc;
use std::time::Instant;

use axum::middleware;
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use undoable_core::Clock;
use undoable_engine::{ActionLogService, EventBus, RunExecutor, RunManager, Scheduler, SwarmOrchestrator, UndoService};

use crate::environment::Environment;

pub struct AppState<C: Clock> {
    pub env: Environment,
    pub run_manager: Arc<RunManager>,
    pub executor: Arc<RunExecutor<C>>,
    pub scheduler: Arc<Scheduler<C>>,
    pub swarm: Arc<SwarmOrchestrator<C>>,
    pub undo: Arc<UndoService<C>>,
    pub action_log: Arc<ActionLogService>,
    pub bus: Arc<EventBus>,
    pub clock: C,
    pub started_at: Instant,
}

pub type SharedState<C> = Arc<AppState<C>>;

pub fn build_router<C: Clock + Send + Sync + 'static>(state: SharedState<C>) -> Router {
    let public = Router::new().route("/health", get(health::health)).route("/ready", get(health::ready));

    let guarded = Router::new()
        .route("/settings/daemon", get(health::get_settings).patch(health::patch_settings))
        .route("/control/operation", get(operation_route::get_operation).patch(operation_route::patch_operation))
        .route("/runs", post(runs::create_run).get(runs::list_runs))
        .route("/runs/:id", get(runs::get_run))
        .route("/runs/:id/events", get(sse::run_events))
        .route("/runs/:id/:action", post(runs::run_action))
        .route(
            "/scheduler/jobs",
            get(scheduler_routes::list_jobs).post(scheduler_routes::create_job),
        )
        .route(
            "/scheduler/jobs/:id",
            get(scheduler_routes::get_job)
                .patch(scheduler_routes::update_job)
                .delete(scheduler_routes::delete_job),
        )
        .route(
            "/swarm/workflows",
            get(swarm_routes::list_workflows).post(swarm_routes::create_workflow),
        )
        .route(
            "/swarm/workflows/:id",
            get(swarm_routes::get_workflow).patch(swarm_routes::update_workflow).delete(swarm_routes::delete_workflow),
        )
        .route("/swarm/workflows/:id/run", post(swarm_routes::run_workflow))
        .route(
            "/swarm/workflows/:id/orchestrations/:oid",
            get(swarm_routes::get_orchestration),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), operation_route::operation_gate::<C>))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::admission_gate::<C>));

    public.merge(guarded).layer(CorsLayer::permissive()).with_state(state)
}

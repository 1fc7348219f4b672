// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Swarm Orchestrator (C9, spec §4.9): a DAG walker over `SwarmWorkflow`s
//! that materialises nodes as Runs and drives downstream unlocking as runs
//! complete.
//!
//! DAG construction, cycle detection and descendant/dependent queries live
//! on `SwarmWorkflow` itself (`undoable_core::swarm`, grounded in
//! `examples/jdsingh122918-forge/src/dag/{builder,scheduler}.rs`'s
//! wave-computation approach); this module owns only the orchestration-run
//! state machine: which nodes are ready, which are launched, and how a
//! completion event unlocks descendants. Per spec §2's dependency order
//! (`C9 ← {C6, C7, C5, C1}`), the orchestrator drives the Run Executor
//! directly rather than just creating Runs and leaving them for someone
//! else to launch, unlike the Scheduler (C5), which only enqueues.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use undoable_core::{Clock, NodeStatus, OrchestrationId, Run, RunId, RunStatus, SwarmNode, SwarmWorkflow, WorkflowId};

use crate::bus::EventBus;
use crate::error::EngineError;
use crate::run_executor::RunExecutor;
use crate::run_manager::{CreateRunSpec, RunManager};

/// Options a single `start()` call is launched with (spec §4.9 Start).
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorOptions {
    pub allow_concurrent: bool,
    pub max_parallel: usize,
    pub fail_fast: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self { allow_concurrent: false, max_parallel: 2, fail_fast: false }
    }
}

/// Overall status of one in-flight (or finished) workflow execution (spec
/// §4.9 Observability: "`{running, completed, failed}`").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestrationStatus {
    Running,
    Completed,
    Failed,
}

/// Queryable snapshot of one orchestration, returned by `get_orchestration`.
#[derive(Debug, Clone)]
pub struct OrchestrationSnapshot {
    pub id: OrchestrationId,
    pub workflow_id: WorkflowId,
    pub status: OrchestrationStatus,
    pub node_status: HashMap<String, NodeStatus>,
    /// node id -> run id, for nodes that were actually launched.
    pub launched: HashMap<String, String>,
    /// node id -> skip reason, for nodes never launched.
    pub skipped: Vec<(String, String)>,
    pub pending_nodes: Vec<String>,
}

struct OrchestrationState {
    workflow: SwarmWorkflow,
    options: OrchestratorOptions,
    status: OrchestrationStatus,
    node_status: HashMap<String, NodeStatus>,
    launched: HashMap<String, String>,
    skipped: Vec<(String, String)>,
    remaining_deps: HashMap<String, usize>,
    /// Unlocked nodes waiting for a free `max_parallel` slot, FIFO so launch
    /// order stays deterministic (spec §5: "Scheduler dispatch order ...
    /// follows job array order"; the orchestrator mirrors that here).
    ready_queue: VecDeque<String>,
    active: usize,
}

fn job_id_for(node_id: &str) -> String {
    format!("swarm-node-{node_id}")
}

/// DAG walker over `SwarmWorkflow` definitions (spec §4.9). Cheaply
/// `Clone`-able: every field is an `Arc` (or, for the clock, already
/// `Clone + Send + Sync`), so a spawned per-node task can hold its own copy
/// and call back into orchestration state without a circular `Arc<Self>`.
pub struct SwarmOrchestrator<C: Clock> {
    run_manager: Arc<RunManager>,
    executor: Arc<RunExecutor<C>>,
    #[allow(dead_code)]
    bus: Arc<EventBus>,
    clock: C,
    workflows: Arc<Mutex<HashMap<WorkflowId, SwarmWorkflow>>>,
    orchestrations: Arc<Mutex<HashMap<OrchestrationId, OrchestrationState>>>,
}

impl<C: Clock> Clone for SwarmOrchestrator<C> {
    fn clone(&self) -> Self {
        Self {
            run_manager: self.run_manager.clone(),
            executor: self.executor.clone(),
            bus: self.bus.clone(),
            clock: self.clock.clone(),
            workflows: self.workflows.clone(),
            orchestrations: self.orchestrations.clone(),
        }
    }
}

impl<C: Clock> SwarmOrchestrator<C> {
    pub fn new(run_manager: Arc<RunManager>, executor: Arc<RunExecutor<C>>, bus: Arc<EventBus>, clock: C) -> Self {
        Self {
            run_manager,
            executor,
            bus,
            clock,
            workflows: Arc::new(Mutex::new(HashMap::new())),
            orchestrations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Validates the DAG (spec §3 invariant: "cycle insertion is rejected")
    /// before admitting the definition.
    pub fn upsert_workflow(&self, workflow: SwarmWorkflow) -> Result<SwarmWorkflow, EngineError> {
        workflow.validate_acyclic()?;
        self.workflows.lock().insert(workflow.id.clone(), workflow.clone());
        Ok(workflow)
    }

    pub fn get_workflow(&self, id: &WorkflowId) -> Result<SwarmWorkflow, EngineError> {
        self.workflows.lock().get(id).cloned().ok_or_else(|| EngineError::WorkflowNotFound(id.to_string()))
    }

    pub fn list_workflows(&self) -> Vec<SwarmWorkflow> {
        self.workflows.lock().values().cloned().collect()
    }

    pub fn remove_workflow(&self, id: &WorkflowId) -> Result<(), EngineError> {
        self.workflows.lock().remove(id).map(|_| ()).ok_or_else(|| EngineError::WorkflowNotFound(id.to_string()))
    }

    /// **Start** (spec §4.9): compute the initial ready set (roots only,
    /// since nothing has completed yet) subject to the disabled/active-run
    /// skip rules, then launch up to `options.max_parallel` of them.
    pub async fn start(&self, workflow_id: &WorkflowId, options: OrchestratorOptions) -> Result<OrchestrationId, EngineError> {
        let workflow = self.get_workflow(workflow_id)?;
        let orchestration_id = OrchestrationId::new();

        let mut remaining_deps = HashMap::new();
        let mut node_status = HashMap::new();
        for node in &workflow.nodes {
            remaining_deps.insert(node.id.clone(), workflow.direct_dependencies(&node.id).len());
            node_status.insert(node.id.clone(), NodeStatus::Pending);
        }

        let mut state = OrchestrationState {
            workflow: workflow.clone(),
            options,
            status: OrchestrationStatus::Running,
            node_status,
            launched: HashMap::new(),
            skipped: Vec::new(),
            remaining_deps,
            ready_queue: VecDeque::new(),
            active: 0,
        };

        let roots: Vec<String> = workflow.roots().into_iter().map(|s| s.to_string()).collect();
        for root in &roots {
            self.consider_node(&mut state, root);
        }

        self.orchestrations.lock().insert(orchestration_id.clone(), state);
        self.drain_ready_queue(&orchestration_id);
        self.finalize_if_idle(&orchestration_id);

        Ok(orchestration_id)
    }

    pub fn get_orchestration(&self, id: &OrchestrationId) -> Result<OrchestrationSnapshot, EngineError> {
        let orchestrations = self.orchestrations.lock();
        let state = orchestrations.get(id).ok_or_else(|| EngineError::OrchestrationNotFound(id.to_string()))?;
        let pending_nodes =
            state.node_status.iter().filter(|(_, s)| matches!(s, NodeStatus::Pending)).map(|(k, _)| k.clone()).collect();
        Ok(OrchestrationSnapshot {
            id: id.clone(),
            workflow_id: state.workflow.id.clone(),
            status: state.status,
            node_status: state.node_status.clone(),
            launched: state.launched.clone(),
            skipped: state.skipped.clone(),
            pending_nodes,
        })
    }

    /// Decide whether `node_id` is disabled, already has an active run (when
    /// `!allow_concurrent`), or is genuinely ready to launch, updating
    /// `state` in place (spec §4.9 Start's two skip reasons).
    fn consider_node(&self, state: &mut OrchestrationState, node_id: &str) {
        let Some(node) = state.workflow.node(node_id).cloned() else { return };

        if !node.enabled {
            state.node_status.insert(node_id.to_string(), NodeStatus::Skipped);
            state.skipped.push((node_id.to_string(), "node is disabled".into()));
            return;
        }

        if !state.options.allow_concurrent {
            let job_id = job_id_for(node_id);
            let has_active = self
                .run_manager
                .list_by_job_id(&job_id)
                .map(|runs| runs.iter().any(|r| !r.status.is_terminal()))
                .unwrap_or(false);
            if has_active {
                state.node_status.insert(node_id.to_string(), NodeStatus::Skipped);
                state.skipped.push((node_id.to_string(), "node already has an active run".into()));
                return;
            }
        }

        state.node_status.insert(node_id.to_string(), NodeStatus::Ready);
        state.ready_queue.push_back(node_id.to_string());
    }

    /// Launch queued nodes until either the queue drains or `max_parallel`
    /// concurrently-running nodes are in flight.
    fn drain_ready_queue(&self, orch_id: &OrchestrationId) {
        loop {
            let to_launch = {
                let mut orchestrations = self.orchestrations.lock();
                let Some(state) = orchestrations.get_mut(orch_id) else { return };
                if state.active >= state.options.max_parallel {
                    return;
                }
                let Some(node_id) = state.ready_queue.pop_front() else { return };
                match state.workflow.node(&node_id).cloned() {
                    Some(node) => {
                        state.active += 1;
                        state.node_status.insert(node_id.clone(), NodeStatus::Running);
                        Some((node_id, node))
                    }
                    None => None,
                }
            };
            if let Some((node_id, node)) = to_launch {
                self.launch_node(orch_id.clone(), node_id, node);
            }
        }
    }

    /// Creates the node's Run (synthetic `jobId = swarm-node-<id>`, spec
    /// §4.9) and spawns a task that drives it through the Run Executor to
    /// completion, reporting back via `on_node_finished`.
    fn launch_node(&self, orch_id: OrchestrationId, node_id: String, node: SwarmNode) {
        let now = self.clock.epoch_ms();
        let created = self.run_manager.create(
            CreateRunSpec {
                owner: "swarm".into(),
                instruction: node.instruction_template.clone(),
                agent_id: node.agent_id.clone(),
                job_id: Some(job_id_for(&node_id)),
            },
            now,
        );

        let run = match created {
            Ok(run) => run,
            Err(e) => {
                tracing::warn!(node_id = %node_id, error = %e, "swarm node failed to create its run");
                self.on_node_finished(&orch_id, &node_id, false);
                return;
            }
        };

        {
            let mut orchestrations = self.orchestrations.lock();
            if let Some(state) = orchestrations.get_mut(&orch_id) {
                state.launched.insert(node_id.clone(), run.id.as_str().to_string());
            }
        }

        let this = self.clone();
        let run_id = run.id.clone();
        tokio::spawn(async move {
            this.run_node_to_completion(orch_id, node_id, run_id).await;
        });
    }

    async fn run_node_to_completion(&self, orch_id: OrchestrationId, node_id: String, run_id: RunId) {
        let success = matches!(
            self.executor.run(run_id).await,
            Ok(Run { status: RunStatus::Applied, .. }) | Ok(Run { status: RunStatus::Completed, .. })
        );
        self.on_node_finished(&orch_id, &node_id, success);
    }

    /// **Progress** (spec §4.9): on completion, decrement descendants'
    /// dependency counts and admit any that are newly unlocked; on failure,
    /// block the whole downstream branch only under `fail_fast`.
    fn on_node_finished(&self, orch_id: &OrchestrationId, node_id: &str, success: bool) {
        {
            let mut orchestrations = self.orchestrations.lock();
            let Some(state) = orchestrations.get_mut(orch_id) else { return };
            state.active = state.active.saturating_sub(1);

            if success {
                state.node_status.insert(node_id.to_string(), NodeStatus::Completed);
                let dependents: Vec<String> =
                    state.workflow.direct_dependents(node_id).into_iter().map(|s| s.to_string()).collect();
                for dep in dependents {
                    if let Some(remaining) = state.remaining_deps.get_mut(&dep) {
                        *remaining = remaining.saturating_sub(1);
                    }
                    if state.remaining_deps.get(&dep).copied() == Some(0) {
                        self.consider_node(state, &dep);
                    }
                }
            } else {
                state.node_status.insert(node_id.to_string(), NodeStatus::Failed);
                if state.options.fail_fast {
                    let descendants: Vec<String> =
                        state.workflow.descendants(node_id).into_iter().map(|s| s.to_string()).collect();
                    for d in descendants {
                        let entry = state.node_status.entry(d).or_insert(NodeStatus::Pending);
                        if !matches!(entry, NodeStatus::Completed | NodeStatus::Failed) {
                            *entry = NodeStatus::Blocked;
                        }
                    }
                    state.status = OrchestrationStatus::Failed;
                }
            }

            Self::finalize_locked(state);
        }

        self.drain_ready_queue(orch_id);
        self.finalize_if_idle(orch_id);
    }

    fn finalize_if_idle(&self, orch_id: &OrchestrationId) {
        let mut orchestrations = self.orchestrations.lock();
        if let Some(state) = orchestrations.get_mut(orch_id) {
            Self::finalize_locked(state);
        }
    }

    fn finalize_locked(state: &mut OrchestrationState) {
        if state.active == 0 && state.ready_queue.is_empty() && state.status == OrchestrationStatus::Running {
            let any_bad = state.node_status.values().any(|s| matches!(s, NodeStatus::Failed | NodeStatus::Blocked));
            state.status = if any_bad { OrchestrationStatus::Failed } else { OrchestrationStatus::Completed };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::tempdir;
    use undoable_adapters::stub::{EchoTool, FailingTool, StubPlanProducer, StubToolRegistry};
    use undoable_core::{ActionCategory, FakeClock, PlanGraph, Step, SwarmEdge, PLAN_SCHEMA_VERSION};
    use undoable_storage::{ActionLogStore, CheckpointStore, MemoryRunStore};

    use crate::action_log::ActionLogService;
    use crate::approval::ApprovalMode;

    fn node(id: &str, enabled: bool) -> SwarmNode {
        SwarmNode {
            id: id.into(),
            enabled,
            schedule: None,
            agent_id: None,
            instruction_template: format!("do {id}"),
            job_id: None,
        }
    }

    fn one_step_plan(tool: &str) -> PlanGraph {
        PlanGraph {
            schema_version: PLAN_SCHEMA_VERSION,
            instruction: "do it".into(),
            agent_id: "a1".into(),
            steps: vec![Step {
                id: "s1".into(),
                tool: tool.into(),
                intent: "run".into(),
                params: serde_json::json!({}),
                capabilities: vec![],
                reversible: false,
                depends_on: vec![],
            }],
        }
    }

    fn harness(
        tool: &str,
        succeeds: bool,
    ) -> (SwarmOrchestrator<FakeClock>, Arc<RunManager>, tempfile::TempDir) {
        let dir = tempdir().expect("tempdir");
        let bus = Arc::new(EventBus::new());
        let run_manager = Arc::new(RunManager::new(Arc::new(MemoryRunStore::new()), bus.clone()));
        let checkpoints = Arc::new(CheckpointStore::new(dir.path().join("checkpoints")));
        let action_log = Arc::new(ActionLogService::new(Arc::new(ActionLogStore::new(dir.path().join("action-log.jsonl")))));
        let producer = Arc::new(StubPlanProducer::new(one_step_plan(tool)));
        let mut tools = StubToolRegistry::new();
        if succeeds {
            tools.register(Box::new(EchoTool::new(tool, ActionCategory::Read)));
        } else {
            tools.register(Box::new(FailingTool::new(tool, ActionCategory::Read, "boom")));
        }
        let executor = Arc::new(RunExecutor::new(
            checkpoints,
            action_log,
            run_manager.clone(),
            bus.clone(),
            producer,
            Arc::new(tools),
            ApprovalMode::NeverAsk,
            PathBuf::from(dir.path()),
            FakeClock::new(0),
        ));
        let orchestrator = SwarmOrchestrator::new(run_manager.clone(), executor, bus, FakeClock::new(0));
        (orchestrator, run_manager, dir)
    }

    async fn wait_for_terminal<C: Clock>(orch: &SwarmOrchestrator<C>, id: &OrchestrationId) -> OrchestrationSnapshot {
        for _ in 0..200 {
            let snap = orch.get_orchestration(id).expect("snapshot");
            if snap.status != OrchestrationStatus::Running {
                return snap;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        orch.get_orchestration(id).expect("snapshot after timeout")
    }

    #[tokio::test]
    async fn disabled_node_is_skipped_with_reason() {
        let (orch, _mgr, _dir) = harness("echo", true);
        let workflow = SwarmWorkflow { id: WorkflowId::new(), name: "w".into(), nodes: vec![node("a", false)], edges: vec![] };
        orch.upsert_workflow(workflow.clone()).expect("upsert");

        let id = orch.start(&workflow.id, OrchestratorOptions::default()).await.expect("start");
        let snap = wait_for_terminal(&orch, &id).await;
        assert_eq!(snap.skipped, vec![("a".to_string(), "node is disabled".to_string())]);
        assert_eq!(snap.status, OrchestrationStatus::Completed);
    }

    #[tokio::test]
    async fn node_with_active_run_is_skipped() {
        let (orch, run_manager, _dir) = harness("echo", true);
        let workflow = SwarmWorkflow { id: WorkflowId::new(), name: "w".into(), nodes: vec![node("a", true)], edges: vec![] };
        orch.upsert_workflow(workflow.clone()).expect("upsert");

        run_manager
            .create(
                CreateRunSpec {
                    owner: "someone-else".into(),
                    instruction: "already running".into(),
                    agent_id: None,
                    job_id: Some("swarm-node-a".into()),
                },
                0,
            )
            .expect("pre-existing active run");

        let id = orch
            .start(&workflow.id, OrchestratorOptions { allow_concurrent: false, ..Default::default() })
            .await
            .expect("start");
        let snap = wait_for_terminal(&orch, &id).await;
        assert_eq!(snap.skipped, vec![("a".to_string(), "node already has an active run".to_string())]);
    }

    #[tokio::test]
    async fn diamond_dag_respects_max_parallel_and_unlocks_in_order() {
        // spec §8 scenario 5: a,b -> c -> d, maxParallel=2.
        let (orch, _mgr, _dir) = harness("echo", true);
        let workflow = SwarmWorkflow {
            id: WorkflowId::new(),
            name: "diamond".into(),
            nodes: vec![node("a", true), node("b", true), node("c", true), node("d", true)],
            edges: vec![
                SwarmEdge { from: "a".into(), to: "c".into() },
                SwarmEdge { from: "b".into(), to: "c".into() },
                SwarmEdge { from: "c".into(), to: "d".into() },
            ],
        };
        orch.upsert_workflow(workflow.clone()).expect("upsert");

        let id = orch
            .start(&workflow.id, OrchestratorOptions { allow_concurrent: false, max_parallel: 2, fail_fast: false })
            .await
            .expect("start");

        let snap = wait_for_terminal(&orch, &id).await;
        assert_eq!(snap.status, OrchestrationStatus::Completed);
        assert_eq!(snap.node_status["a"], NodeStatus::Completed);
        assert_eq!(snap.node_status["b"], NodeStatus::Completed);
        assert_eq!(snap.node_status["c"], NodeStatus::Completed);
        assert_eq!(snap.node_status["d"], NodeStatus::Completed);
        assert_eq!(snap.launched.len(), 4);
    }

    #[tokio::test]
    async fn fail_fast_blocks_descendants_of_a_failed_node() {
        let (orch, _mgr, _dir) = harness("echo", false);
        let workflow = SwarmWorkflow {
            id: WorkflowId::new(),
            name: "chain".into(),
            nodes: vec![node("a", true), node("b", true)],
            edges: vec![SwarmEdge { from: "a".into(), to: "b".into() }],
        };
        orch.upsert_workflow(workflow.clone()).expect("upsert");

        let id = orch
            .start(&workflow.id, OrchestratorOptions { allow_concurrent: false, max_parallel: 2, fail_fast: true })
            .await
            .expect("start");

        let snap = wait_for_terminal(&orch, &id).await;
        assert_eq!(snap.status, OrchestrationStatus::Failed);
        assert_eq!(snap.node_status["a"], NodeStatus::Failed);
        assert_eq!(snap.node_status["b"], NodeStatus::Blocked);
        assert!(!snap.launched.contains_key("b"));
    }

    #[tokio::test]
    async fn never_launches_a_node_before_its_predecessors_complete() {
        // spec §8 invariant 7.
        let (orch, _mgr, _dir) = harness("echo", true);
        let workflow = SwarmWorkflow {
            id: WorkflowId::new(),
            name: "chain".into(),
            nodes: vec![node("a", true), node("b", true)],
            edges: vec![SwarmEdge { from: "a".into(), to: "b".into() }],
        };
        orch.upsert_workflow(workflow.clone()).expect("upsert");

        let id = orch.start(&workflow.id, OrchestratorOptions::default()).await.expect("start");

        // Immediately after start, only `a` may have launched; `b` must not
        // have a run yet no matter how fast `a` finishes this tick.
        let snap = orch.get_orchestration(&id).expect("snapshot");
        assert!(!snap.launched.contains_key("b") || snap.node_status["a"] == NodeStatus::Completed);

        let snap = wait_for_terminal(&orch, &id).await;
        assert_eq!(snap.status, OrchestrationStatus::Completed);
    }
}

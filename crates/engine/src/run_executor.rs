// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run Executor (spec §4.7): drives a single Run through plan -> shadow ->
//! approval_required -> apply, and on request, undo. Tool invocation happens
//! once, during shadow; apply commits the already-captured step outcomes to
//! the Action Log rather than re-invoking tools, since the `Tool` trait (C7's
//! external collaborator) exposes a single `invoke`, not separate dry-run and
//! commit entry points.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use undoable_adapters::{PlanContext, PlanProducer, Tool, ToolContext, ToolRegistry};
use undoable_core::{
    ActionCategory, ActionResult, ActionSpec, ApprovalDecision, BusEvent, Checkpoint, Clock,
    PlanGraph, Phase, Run, RunId, RunStatus, Step, StepResult, StepResults, UndoData,
};
use undoable_storage::CheckpointStore;

use crate::action_log::ActionLogService;
use crate::approval::{approval_channel, decide, ApprovalMode, ApprovalRequest, DEFAULT_APPROVAL_TIMEOUT};
use crate::bus::EventBus;
use crate::error::EngineError;
use crate::run_manager::RunManager;

/// Category and reversal data captured for one successfully-executed step,
/// carried from shadow into the approval gate and apply phase.
#[derive(Debug, Clone)]
pub struct ExecutedStep {
    pub category: ActionCategory,
    pub undo_data: Option<UndoData>,
    pub reversible: bool,
}

/// Outcome of the shadow phase: every step's result, plus the executed-step
/// metadata apply needs for steps that actually ran a tool.
#[derive(Debug, Clone, Default)]
pub struct ShadowOutcome {
    pub step_results: StepResults,
    pub executed: HashMap<String, ExecutedStep>,
}

impl ShadowOutcome {
    /// Step ids whose tool category requires a user decision under `mode`.
    pub fn pending_approvals(&self, mode: ApprovalMode) -> Vec<String> {
        let mut ids: Vec<String> = self
            .executed
            .iter()
            .filter(|(_, meta)| decide(meta.category, mode) == crate::approval::GateDecision::RequireUser)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort_unstable();
        ids
    }
}

/// Per-run cooperative control: cancellation plus the orthogonal pause gate.
struct RunControl {
    cancel: CancellationToken,
    paused: AtomicBool,
    resume: Notify,
}

impl RunControl {
    fn new() -> Self {
        Self { cancel: CancellationToken::new(), paused: AtomicBool::new(false), resume: Notify::new() }
    }

    async fn wait_while_paused(&self) {
        while self.paused.load(Ordering::SeqCst) {
            self.resume.notified().await;
        }
    }
}

pub struct RunExecutor<C: Clock> {
    checkpoints: Arc<CheckpointStore>,
    action_log: Arc<ActionLogService>,
    run_manager: Arc<RunManager>,
    bus: Arc<EventBus>,
    producer: Arc<dyn PlanProducer>,
    tools: Arc<dyn ToolRegistry>,
    approval_mode: ApprovalMode,
    approval_timeout: Duration,
    workspace_dir: PathBuf,
    clock: C,
    controls: Mutex<HashMap<String, Arc<RunControl>>>,
    pending_approvals: Mutex<HashMap<String, ApprovalRequest>>,
}

impl<C: Clock> RunExecutor<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        checkpoints: Arc<CheckpointStore>,
        action_log: Arc<ActionLogService>,
        run_manager: Arc<RunManager>,
        bus: Arc<EventBus>,
        producer: Arc<dyn PlanProducer>,
        tools: Arc<dyn ToolRegistry>,
        approval_mode: ApprovalMode,
        workspace_dir: PathBuf,
        clock: C,
    ) -> Self {
        Self {
            checkpoints,
            action_log,
            run_manager,
            bus,
            producer,
            tools,
            approval_mode,
            approval_timeout: DEFAULT_APPROVAL_TIMEOUT,
            workspace_dir,
            clock,
            controls: Mutex::new(HashMap::new()),
            pending_approvals: Mutex::new(HashMap::new()),
        }
    }

    fn topic(run_id: &RunId) -> String {
        format!("run.{}", run_id.as_str())
    }

    fn now(&self) -> u64 {
        self.clock.epoch_ms()
    }

    fn control_for(&self, run_id: &RunId) -> Arc<RunControl> {
        self.controls
            .lock()
            .entry(run_id.as_str().to_string())
            .or_insert_with(|| Arc::new(RunControl::new()))
            .clone()
    }

    /// Drives `run_id` through plan, shadow, the approval gate (if needed)
    /// and apply. Returns the final Run once it reaches `applied`, or an
    /// error once it reaches `failed`/`cancelled`.
    pub async fn run(&self, run_id: RunId) -> Result<Run, EngineError> {
        let control = self.control_for(&run_id);
        let result = self.run_inner(&run_id, &control).await;
        self.controls.lock().remove(run_id.as_str());
        result
    }

    async fn run_inner(&self, run_id: &RunId, control: &Arc<RunControl>) -> Result<Run, EngineError> {
        let plan = self.plan(run_id).await?;
        let shadow = self.shadow(run_id, &plan, control).await?;
        self.gate_and_apply(run_id, &plan, shadow, control).await
    }

    /// **plan**: request a PlanGraph from the external producer and validate
    /// it before admitting it to the rest of the pipeline.
    pub async fn plan(&self, run_id: &RunId) -> Result<PlanGraph, EngineError> {
        let run = self.run_manager.get_by_id(run_id)?;
        self.run_manager.update_status(run_id, RunStatus::Planning, "executor", self.now())?;

        let ctx = PlanContext {
            instruction: run.instruction.clone(),
            agent_id: run.agent_id.clone(),
            extra: serde_json::Value::Null,
        };
        let plan = match self.producer.produce_plan(ctx).await {
            Ok(plan) => plan,
            Err(e) => {
                self.fail(run_id, &e.to_string()).await?;
                return Err(EngineError::Producer(e));
            }
        };
        if let Err(e) = plan.validate() {
            self.fail(run_id, &e.to_string()).await?;
            return Err(EngineError::Core(e));
        }

        self.run_manager.update_status(run_id, RunStatus::Planned, "executor", self.now())?;
        self.checkpoints.save(&Checkpoint::new(run_id.clone(), RunStatus::Planned, Phase::Plan, self.now()))?;
        Ok(plan)
    }

    /// **shadow**: invoke each step's tool in declared order, skipping steps
    /// whose dependency failed without blocking independent peers.
    pub async fn shadow(
        &self,
        run_id: &RunId,
        plan: &PlanGraph,
        control: &Arc<RunControl>,
    ) -> Result<ShadowOutcome, EngineError> {
        self.run_manager.update_status(run_id, RunStatus::Shadowing, "executor", self.now())?;

        let mut outcome = ShadowOutcome::default();
        let mut checkpoint = Checkpoint::new(run_id.clone(), RunStatus::Shadowing, Phase::Shadow, self.now());

        for step in &plan.steps {
            if control.cancel.is_cancelled() {
                self.run_manager.update_status(run_id, RunStatus::Cancelled, "executor", self.now())?;
                return Err(EngineError::Cancelled);
            }
            control.wait_while_paused().await;

            if let Some(dep) = outcome.step_results.has_failed_ancestor(step) {
                let result = StepResult::skipped(&step.id, &step.tool, format!("dependency \"{dep}\" failed"));
                self.publish_step_result(run_id, result.clone());
                checkpoint.record_step(result.clone());
                outcome.step_results.0.insert(step.id.clone(), result);
                continue;
            }

            let result = self.run_step(run_id, step, control, &mut outcome).await;
            self.publish_step_result(run_id, result.clone());
            checkpoint.record_step(result.clone());
            outcome.step_results.0.insert(step.id.clone(), result);
            self.checkpoints.save(&checkpoint)?;
        }

        self.run_manager.update_status(run_id, RunStatus::Shadowed, "executor", self.now())?;
        Ok(outcome)
    }

    async fn run_step(
        &self,
        run_id: &RunId,
        step: &Step,
        control: &Arc<RunControl>,
        outcome: &mut ShadowOutcome,
    ) -> StepResult {
        let Some(tool) = self.tools.get(&step.tool) else {
            return StepResult::failed(&step.id, &step.tool, format!("unknown tool: {}", step.tool), Duration::ZERO);
        };
        self.bus.publish(&Self::topic(run_id), BusEvent::ToolCall { step_id: step.id.clone(), tool: step.tool.clone() });

        let ctx = ToolContext {
            step_id: step.id.clone(),
            params: step.params.clone(),
            workspace_dir: self.workspace_dir.clone(),
        };
        let started = Instant::now();
        let invocation = tool.invoke(ctx);
        let outcome_or_cancel = tokio::select! {
            biased;
            _ = control.cancel.cancelled() => None,
            res = invocation => Some(res),
        };

        match outcome_or_cancel {
            None => StepResult::skipped(&step.id, &step.tool, "cancelled"),
            Some(Ok(tool_outcome)) => {
                outcome.executed.insert(
                    step.id.clone(),
                    ExecutedStep {
                        category: tool.category(),
                        undo_data: tool_outcome.undo_data.clone(),
                        reversible: step.reversible,
                    },
                );
                StepResult::ok(&step.id, &step.tool, tool_outcome.output, started.elapsed())
            }
            Some(Err(e)) => StepResult::failed(&step.id, &step.tool, e.to_string(), started.elapsed()),
        }
    }

    fn publish_step_result(&self, run_id: &RunId, result: StepResult) {
        self.bus.publish(&Self::topic(run_id), BusEvent::StepResult { result });
    }

    async fn fail(&self, run_id: &RunId, message: &str) -> Result<(), EngineError> {
        self.run_manager.update_status(run_id, RunStatus::Failed, "executor", self.now())?;
        self.bus.publish(&Self::topic(run_id), BusEvent::Error { message: message.to_string() });
        Ok(())
    }

    /// **approval_required** (if needed) then **apply**.
    async fn gate_and_apply(
        &self,
        run_id: &RunId,
        plan: &PlanGraph,
        shadow: ShadowOutcome,
        control: &Arc<RunControl>,
    ) -> Result<Run, EngineError> {
        let pending = shadow.pending_approvals(self.approval_mode);
        let mut approvals: HashMap<String, ApprovalDecision> =
            shadow.executed.keys().map(|id| (id.clone(), ApprovalDecision::AutoApproved)).collect();

        if !pending.is_empty() {
            self.run_manager.update_status(run_id, RunStatus::ApprovalRequired, "executor", self.now())?;
            let (req, handle) = approval_channel();
            self.pending_approvals.lock().insert(run_id.as_str().to_string(), req);
            self.bus.publish(&Self::topic(run_id), BusEvent::Phase { phase: "approval_required".into() });

            let decision = handle.wait(self.approval_timeout).await;
            self.pending_approvals.lock().remove(run_id.as_str());

            match decision {
                Ok(true) => {
                    for id in &pending {
                        approvals.insert(id.clone(), ApprovalDecision::UserApproved);
                    }
                }
                Ok(false) => {
                    self.fail(run_id, "approval denied").await?;
                    return Err(EngineError::ApprovalDenied);
                }
                Err(e) => {
                    self.fail(run_id, &e.to_string()).await?;
                    return Err(e);
                }
            }
        }

        self.apply(run_id, plan, shadow, approvals, control).await
    }

    /// Resolve a pending approval raised for `run_id`. A run with no pending
    /// approval (already resolved, timed out, or never required one) yields
    /// `RunNotFound`-shaped behavior via a no-op: callers should check state
    /// via the Run Manager first.
    pub fn resolve_approval(&self, run_id: &RunId, approved: bool) -> bool {
        match self.pending_approvals.lock().remove(run_id.as_str()) {
            Some(req) => {
                req.resolve(approved);
                true
            }
            None => false,
        }
    }

    /// **apply**: commit each successfully-shadowed step to the Action Log.
    async fn apply(
        &self,
        run_id: &RunId,
        plan: &PlanGraph,
        shadow: ShadowOutcome,
        approvals: HashMap<String, ApprovalDecision>,
        control: &Arc<RunControl>,
    ) -> Result<Run, EngineError> {
        if control.cancel.is_cancelled() {
            self.run_manager.update_status(run_id, RunStatus::Cancelled, "executor", self.now())?;
            return Err(EngineError::Cancelled);
        }

        self.run_manager.update_status(run_id, RunStatus::Applying, "executor", self.now())?;
        let mut checkpoint = Checkpoint::new(run_id.clone(), RunStatus::Applying, Phase::Apply, self.now());

        for step in &plan.steps {
            let Some(meta) = shadow.executed.get(&step.id) else { continue };
            let result = shadow
                .step_results
                .0
                .get(&step.id)
                .cloned()
                .unwrap_or_else(|| StepResult::skipped(&step.id, &step.tool, "missing shadow result"));
            let approval = approvals.get(&step.id).copied().unwrap_or(ApprovalDecision::AutoApproved);
            let undoable = meta.reversible && meta.undo_data.is_some();

            let entry_id = self.action_log.record(
                ActionSpec {
                    run_id: Some(run_id.as_str().to_string()),
                    tool: step.tool.clone(),
                    category: meta.category,
                    params: step.params.clone(),
                    approval,
                    undoable,
                    undo_data: meta.undo_data.clone(),
                },
                self.now(),
            )?;
            self.action_log.complete(
                &entry_id,
                ActionResult { success: result.success, output: result.output.clone(), error: result.error.clone() },
                self.now(),
            )?;
            checkpoint.record_step(result);
            self.checkpoints.save(&checkpoint)?;
        }

        let run = self.run_manager.update_status(run_id, RunStatus::Applied, "executor", self.now())?;
        self.checkpoints.remove(run_id.as_str())?;
        self.bus.publish(&Self::topic(run_id), BusEvent::Done);
        Ok(run)
    }

    /// Cancels an in-flight run: transitions it to `cancelled` and signals
    /// whatever phase is currently running.
    pub fn cancel(&self, run_id: &RunId) -> Result<Run, EngineError> {
        let run = self.run_manager.update_status(run_id, RunStatus::Cancelled, "executor", self.now())?;
        if let Some(control) = self.controls.lock().get(run_id.as_str()) {
            control.cancel.cancel();
        }
        Ok(run)
    }

    /// Pauses an in-flight run between shadow steps.
    pub fn pause(&self, run_id: &RunId) -> Result<Run, EngineError> {
        let run = self.run_manager.update_status(run_id, RunStatus::Paused, "executor", self.now())?;
        if let Some(control) = self.controls.lock().get(run_id.as_str()) {
            control.paused.store(true, Ordering::SeqCst);
        }
        Ok(run)
    }

    /// Resumes a paused run, restoring the phase-derived status it paused
    /// from (spec §4.7: "resuming restores the prior phase-derived running
    /// status").
    pub fn resume(&self, run_id: &RunId) -> Result<Run, EngineError> {
        let current = self.run_manager.get_by_id(run_id)?;
        let resumed_status = current.paused_from.unwrap_or(RunStatus::Shadowing);
        let run = self.run_manager.update_status(run_id, resumed_status, "executor", self.now())?;
        if let Some(control) = self.controls.lock().get(run_id.as_str()) {
            control.paused.store(false, Ordering::SeqCst);
            control.resume.notify_waiters();
        }
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;
    use undoable_adapters::stub::{EchoTool, FailingTool, StubPlanProducer, StubToolRegistry};
    use undoable_core::{FakeClock, PLAN_SCHEMA_VERSION};
    use undoable_storage::{ActionLogStore, MemoryRunStore};

    fn step(id: &str, tool: &str, deps: &[&str]) -> Step {
        Step {
            id: id.into(),
            tool: tool.into(),
            intent: "do it".into(),
            params: serde_json::json!({}),
            capabilities: vec![],
            reversible: false,
            depends_on: deps.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn executor(
        plan: PlanGraph,
        tools: StubToolRegistry,
        approval_mode: ApprovalMode,
    ) -> (RunExecutor<FakeClock>, Arc<RunManager>, tempfile::TempDir) {
        let dir = tempdir().expect("tempdir");
        let checkpoints = Arc::new(CheckpointStore::new(dir.path().join("checkpoints")));
        let action_log = Arc::new(ActionLogService::new(Arc::new(ActionLogStore::new(dir.path().join("action-log.jsonl")))));
        let bus = Arc::new(EventBus::new());
        let run_manager = Arc::new(RunManager::new(Arc::new(MemoryRunStore::new()), bus.clone()));
        let producer = Arc::new(StubPlanProducer::new(plan));
        let executor = RunExecutor::new(
            checkpoints,
            action_log,
            run_manager.clone(),
            bus,
            producer,
            Arc::new(tools),
            approval_mode,
            dir.path().to_path_buf(),
            FakeClock::new(0),
        );
        (executor, run_manager, dir)
    }

    #[tokio::test]
    async fn shadow_skips_dependent_of_failed_step() {
        // spec §8 scenario 1: s1 fails, s2 depends on s1 and is skipped, s3 is independent and runs.
        let plan = PlanGraph {
            schema_version: PLAN_SCHEMA_VERSION,
            instruction: "do it".into(),
            agent_id: "a1".into(),
            steps: vec![step("s1", "fail", &[]), step("s2", "echo", &["s1"]), step("s3", "echo", &[])],
        };
        let mut tools = StubToolRegistry::new();
        tools.register(Box::new(FailingTool::new("fail", ActionCategory::Mutate, "boom")));
        tools.register(Box::new(EchoTool::new("echo", ActionCategory::Read)));

        let (executor, run_manager, _dir) = executor(plan.clone(), tools, ApprovalMode::NeverAsk);
        let run = run_manager.create(crate::run_manager::CreateRunSpec {
            owner: "alice".into(),
            instruction: "do it".into(),
            agent_id: None,
            job_id: None,
        }, 0).expect("create");

        let control = executor.control_for(&run.id);
        let shadow = executor.shadow(&run.id, &plan, &control).await.expect("shadow");

        assert!(!shadow.step_results.0["s1"].success);
        let s2 = &shadow.step_results.0["s2"];
        assert!(!s2.success);
        assert_eq!(s2.error.as_deref(), Some("dependency \"s1\" failed"));
        assert!(shadow.step_results.0["s3"].success);
    }

    #[tokio::test]
    async fn full_pipeline_reaches_applied_with_no_approval_needed() {
        let plan = PlanGraph {
            schema_version: PLAN_SCHEMA_VERSION,
            instruction: "do it".into(),
            agent_id: "a1".into(),
            steps: vec![step("s1", "echo", &[])],
        };
        let mut tools = StubToolRegistry::new();
        tools.register(Box::new(EchoTool::new("echo", ActionCategory::Read)));

        let (executor, run_manager, _dir) = executor(plan, tools, ApprovalMode::Always);
        let run = run_manager.create(crate::run_manager::CreateRunSpec {
            owner: "alice".into(),
            instruction: "do it".into(),
            agent_id: None,
            job_id: None,
        }, 0).expect("create");

        let applied = executor.run(run.id.clone()).await.expect("pipeline succeeds");
        assert_eq!(applied.status, RunStatus::Applied);
    }

    #[tokio::test]
    async fn mutating_step_blocks_on_approval_then_applies_once_approved() {
        let plan = PlanGraph {
            schema_version: PLAN_SCHEMA_VERSION,
            instruction: "do it".into(),
            agent_id: "a1".into(),
            steps: vec![step("s1", "echo", &[])],
        };
        let mut tools = StubToolRegistry::new();
        tools.register(Box::new(EchoTool::new("echo", ActionCategory::Mutate)));

        let (executor, run_manager, _dir) = executor(plan, tools, ApprovalMode::Always);
        let executor = Arc::new(executor);
        let run = run_manager.create(crate::run_manager::CreateRunSpec {
            owner: "alice".into(),
            instruction: "do it".into(),
            agent_id: None,
            job_id: None,
        }, 0).expect("create");
        let run_id = run.id.clone();

        let exec_for_task = executor.clone();
        let handle = tokio::spawn(async move { exec_for_task.run(run_id).await });

        // Give the pipeline a moment to reach approval_required, then resolve it.
        let mut approved = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if executor.resolve_approval(&run.id, true) {
                approved = true;
                break;
            }
        }
        assert!(approved, "executor should have raised an approval request");

        let applied = handle.await.expect("join").expect("pipeline succeeds once approved");
        assert_eq!(applied.status, RunStatus::Applied);
    }

    #[tokio::test]
    async fn denied_approval_fails_the_run() {
        let plan = PlanGraph {
            schema_version: PLAN_SCHEMA_VERSION,
            instruction: "do it".into(),
            agent_id: "a1".into(),
            steps: vec![step("s1", "echo", &[])],
        };
        let mut tools = StubToolRegistry::new();
        tools.register(Box::new(EchoTool::new("echo", ActionCategory::Destructive)));

        let (executor, run_manager, _dir) = executor(plan, tools, ApprovalMode::NeverAsk);
        let executor = Arc::new(executor);
        let run = run_manager.create(crate::run_manager::CreateRunSpec {
            owner: "alice".into(),
            instruction: "do it".into(),
            agent_id: None,
            job_id: None,
        }, 0).expect("create");
        let run_id = run.id.clone();

        let exec_for_task = executor.clone();
        let handle = tokio::spawn(async move { exec_for_task.run(run_id).await });

        let mut resolved = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if executor.resolve_approval(&run.id, false) {
                resolved = true;
                break;
            }
        }
        assert!(resolved);

        let result = handle.await.expect("join");
        assert!(matches!(result, Err(EngineError::ApprovalDenied)));
        assert_eq!(run_manager.get_by_id(&run.id).expect("get").status, RunStatus::Failed);
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler (C5, spec §4.5): timer-driven dispatcher over a persisted job
//! store. Mutating operations serialise through a single `tokio::sync::Mutex`
//! guarding the in-memory job list; persistence happens before the guard is
//! released, matching spec §4.5.2's "persistence is done before releasing
//! the gate".

use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use undoable_core::{
    Clock, JobId, JobPayload, ScheduledJob, BusEvent, MAX_TIMER_DELAY_MS,
};
use undoable_storage::SchedulerStore;

use crate::bus::EventBus;
use crate::error::EngineError;
use crate::run_manager::{CreateRunSpec, RunManager};

/// Spec for creating a new job (id/state/timestamps are assigned here).
#[derive(Debug, Clone)]
pub struct CreateJobSpec {
    pub name: String,
    pub enabled: bool,
    pub schedule: undoable_core::Schedule,
    pub payload: JobPayload,
    pub delete_after_run: bool,
}

/// Outcome of one dispatch of a due job, published on the `scheduler` topic
/// and returned from `tick()` for callers that want a synchronous summary
/// (tests, the missed-run recovery pass).
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub job_id: JobId,
    pub success: bool,
    pub error: Option<String>,
}

pub struct SchedulerConfig {
    pub max_timer_delay_ms: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_timer_delay_ms: MAX_TIMER_DELAY_MS }
    }
}

/// The persisted job store plus the ambient services a job's payload can
/// target. `JobPayload::Run` enqueues through the Run Manager (spec §2 data
/// flow: "Scheduled workloads originate in C5, which enqueues a Run via C6");
/// `JobPayload::Event` publishes directly onto the bus.
pub struct Scheduler<C: Clock> {
    jobs: AsyncMutex<Vec<ScheduledJob>>,
    store: Arc<SchedulerStore>,
    bus: Arc<EventBus>,
    run_manager: Arc<RunManager>,
    clock: C,
    config: SchedulerConfig,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(
        store: Arc<SchedulerStore>,
        bus: Arc<EventBus>,
        run_manager: Arc<RunManager>,
        clock: C,
        config: SchedulerConfig,
    ) -> Result<Self, EngineError> {
        let jobs = store.load()?;
        Ok(Self { jobs: AsyncMutex::new(jobs), store, bus, run_manager, clock, config })
    }

    /// Missed-run recovery: run the due set once, then the caller arms the
    /// timer. Collapses a burst of missed ticks into a single catch-up
    /// execution per job (spec §4.5.2 "Missed-run recovery").
    pub async fn start(&self) -> Result<Vec<DispatchResult>, EngineError> {
        self.tick().await
    }

    pub async fn add(&self, spec: CreateJobSpec) -> Result<ScheduledJob, EngineError> {
        let now = self.clock.epoch_ms() as i64;
        let mut job = ScheduledJob {
            id: JobId::new(),
            name: spec.name,
            enabled: spec.enabled,
            schedule: spec.schedule,
            payload: spec.payload,
            delete_after_run: spec.delete_after_run,
            state: Default::default(),
            created_at_ms: now,
            updated_at_ms: now,
        };
        job.recompute_next_run(now);

        let mut jobs = self.jobs.lock().await;
        jobs.push(job.clone());
        self.store.save(&jobs)?;
        drop(jobs);
        Ok(job)
    }

    pub async fn get(&self, id: &JobId) -> Option<ScheduledJob> {
        self.jobs.lock().await.iter().find(|j| &j.id == id).cloned()
    }

    pub async fn list(&self) -> Vec<ScheduledJob> {
        self.jobs.lock().await.clone()
    }

    /// Replace a job's mutable fields and recompute its `nextRunAtMs`.
    pub async fn update(
        &self,
        id: &JobId,
        mutate: impl FnOnce(&mut ScheduledJob),
    ) -> Result<ScheduledJob, EngineError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .iter_mut()
            .find(|j| &j.id == id)
            .ok_or_else(|| EngineError::JobNotFound(id.to_string()))?;
        mutate(job);
        let now = self.clock.epoch_ms() as i64;
        job.updated_at_ms = now;
        job.recompute_next_run(now);
        let result = job.clone();
        self.store.save(&jobs)?;
        Ok(result)
    }

    pub async fn remove(&self, id: &JobId) -> Result<(), EngineError> {
        let mut jobs = self.jobs.lock().await;
        let before = jobs.len();
        jobs.retain(|j| &j.id != id);
        if jobs.len() == before {
            return Err(EngineError::JobNotFound(id.to_string()));
        }
        self.store.save(&jobs)?;
        Ok(())
    }

    /// Recompute `nextRunAtMs` for every job. Idempotent when every job
    /// already has a future `nextRunAtMs` (spec §8 property 4).
    pub async fn recompute_all_next_runs(&self) -> Result<bool, EngineError> {
        let mut jobs = self.jobs.lock().await;
        let now = self.clock.epoch_ms() as i64;
        let mut changed = false;
        for job in jobs.iter_mut() {
            changed |= job.recompute_next_run(now);
        }
        if changed {
            self.store.save(&jobs)?;
        }
        Ok(changed)
    }

    /// Milliseconds until the timer should next wake, capped at
    /// `max_timer_delay_ms` to cope with sleep/wake skew (spec §4.5).
    pub async fn next_wake_delay_ms(&self) -> i64 {
        let jobs = self.jobs.lock().await;
        let now = self.clock.epoch_ms() as i64;
        let earliest = jobs
            .iter()
            .filter_map(|j| j.state.next_run_at_ms)
            .min()
            .map(|t| (t - now).max(0))
            .unwrap_or(self.config.max_timer_delay_ms);
        earliest.min(self.config.max_timer_delay_ms)
    }

    /// One dispatch tick (spec §4.5.2):
    /// 1. clear stale `runningAtMs` crash residue,
    /// 2. collect due jobs,
    /// 3. dispatch each in array order (stable; at-most-one in flight),
    /// 4. persist and publish `started`/`finished`.
    pub async fn tick(&self) -> Result<Vec<DispatchResult>, EngineError> {
        let mut jobs = self.jobs.lock().await;
        let now = self.clock.epoch_ms() as i64;

        let mut cleared = false;
        for job in jobs.iter_mut() {
            cleared |= job.clear_stale_running(now);
        }

        let due_ids: Vec<JobId> =
            jobs.iter().filter(|j| j.is_due(now)).map(|j| j.id.clone()).collect();

        if due_ids.is_empty() {
            if cleared {
                self.store.save(&jobs)?;
            }
            return Ok(Vec::new());
        }

        // Mark all due jobs as running and persist before dispatching any of
        // them, so a crash mid-batch still reflects "in flight" on reload.
        for job in jobs.iter_mut() {
            if due_ids.contains(&job.id) {
                job.state.running_at_ms = Some(now);
            }
        }
        self.store.save(&jobs)?;
        drop(jobs);

        for id in &due_ids {
            self.bus.publish("scheduler", BusEvent::Phase { phase: format!("job:{id}:started") });
        }

        let mut results = Vec::with_capacity(due_ids.len());
        for id in due_ids {
            let payload = self.get(&id).await.map(|j| j.payload);
            let Some(payload) = payload else { continue };
            let outcome = self.dispatch_payload(&id, &payload, now).await;
            results.push(self.finish(&id, outcome, now).await?);
        }
        Ok(results)
    }

    async fn dispatch_payload(&self, id: &JobId, payload: &JobPayload, now_ms: i64) -> Result<(), EngineError> {
        match payload {
            JobPayload::Run { instruction, agent_id } => {
                self.run_manager.create(
                    CreateRunSpec {
                        owner: "scheduler".into(),
                        instruction: instruction.clone(),
                        agent_id: agent_id.clone(),
                        job_id: Some(id.to_string()),
                    },
                    now_ms as u64,
                )?;
                Ok(())
            }
            JobPayload::Event { topic, payload } => {
                self.bus.publish(topic, BusEvent::Custom { topic: topic.clone(), payload: payload.clone() });
                Ok(())
            }
        }
    }

    async fn finish(
        &self,
        id: &JobId,
        outcome: Result<(), EngineError>,
        now_ms: i64,
    ) -> Result<DispatchResult, EngineError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.iter_mut().find(|j| &j.id == id).ok_or_else(|| EngineError::JobNotFound(id.to_string()))?;

        let success = outcome.is_ok();
        let error_message = outcome.as_ref().err().map(|e| e.to_string());

        job.state.running_at_ms = None;
        job.state.last_run_at_ms = Some(now_ms);
        job.state.last_duration_ms = Some(0);
        job.state.last_status = Some(if success { "ok".into() } else { "error".into() });
        job.state.last_error = error_message.clone();
        if success {
            job.state.consecutive_errors = 0;
        } else {
            job.state.consecutive_errors += 1;
        }

        // `at` jobs clear their schedule on success only; on failure they are
        // kept alive (spec §9 open question, resolved to preserve this).
        let is_at = matches!(job.schedule, undoable_core::Schedule::At { .. });
        if success && is_at {
            job.state.next_run_at_ms = None;
        } else {
            job.recompute_next_run(now_ms);
        }

        let should_delete = job.delete_after_run && (success || is_at);
        let job_id = job.id.clone();

        if should_delete {
            jobs.retain(|j| j.id != job_id);
        }
        self.store.save(&jobs)?;
        drop(jobs);

        self.bus.publish(
            "scheduler",
            BusEvent::Phase { phase: format!("job:{job_id}:finished:{}", if success { "ok" } else { "error" }) },
        );

        Ok(DispatchResult { job_id, success, error: error_message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use undoable_core::{FakeClock, JobPayload, Schedule};
    use undoable_storage::MemoryRunStore;

    fn scheduler(clock: FakeClock) -> Scheduler<FakeClock> {
        let dir = tempdir().expect("tempdir");
        let store = Arc::new(SchedulerStore::new(dir.path().join("scheduler.json")));
        let bus = Arc::new(EventBus::new());
        let run_manager = Arc::new(RunManager::new(Arc::new(MemoryRunStore::new()), bus.clone()));
        Scheduler::new(store, bus, run_manager, clock, SchedulerConfig::default()).expect("construct")
    }

    #[tokio::test]
    async fn due_job_dispatches_and_reschedules() {
        // anchor=1000, every=500 (spec §8 scenario 2's values) so the
        // reschedule lands strictly after `now` rather than exactly on it.
        let clock = FakeClock::new(0);
        let sched = scheduler(clock.clone());
        sched
            .add(CreateJobSpec {
                name: "tick".into(),
                enabled: true,
                schedule: Schedule::Every { every_ms: 500, anchor_ms: 1000 },
                payload: JobPayload::Event { topic: "t".into(), payload: serde_json::Value::Null },
                delete_after_run: false,
            })
            .await
            .expect("add");

        clock.set_epoch_ms(1600);
        let results = sched.tick().await.expect("tick");
        assert_eq!(results.len(), 1);
        assert!(results[0].success);

        let jobs = sched.list().await;
        assert_eq!(jobs[0].state.next_run_at_ms, Some(2000));
        assert!(jobs[0].state.running_at_ms.is_none());
    }

    #[tokio::test]
    async fn at_most_one_dispatch_between_ticks() {
        let clock = FakeClock::new(0);
        let sched = scheduler(clock.clone());
        sched
            .add(CreateJobSpec {
                name: "once".into(),
                enabled: true,
                schedule: Schedule::At { at_ms: 500 },
                payload: JobPayload::Event { topic: "t".into(), payload: serde_json::Value::Null },
                delete_after_run: false,
            })
            .await
            .expect("add");

        clock.set_epoch_ms(1000);
        let first = sched.tick().await.expect("tick 1");
        assert_eq!(first.len(), 1);
        let second = sched.tick().await.expect("tick 2");
        assert!(second.is_empty(), "already-run `at` job must not fire again");
    }

    #[tokio::test]
    async fn delete_after_run_removes_the_job_on_success() {
        let clock = FakeClock::new(0);
        let sched = scheduler(clock.clone());
        sched
            .add(CreateJobSpec {
                name: "once".into(),
                enabled: true,
                schedule: Schedule::At { at_ms: 500 },
                payload: JobPayload::Event { topic: "t".into(), payload: serde_json::Value::Null },
                delete_after_run: true,
            })
            .await
            .expect("add");

        clock.set_epoch_ms(1000);
        sched.tick().await.expect("tick");
        assert!(sched.list().await.is_empty());
    }

    #[tokio::test]
    async fn missed_run_on_boot_fires_exactly_once() {
        // spec §8 scenario 4: a job whose nextRunAtMs fell well in the past
        // by the time the daemon restarts and calls `start()`.
        let clock = FakeClock::new(0);
        let sched = scheduler(clock.clone());
        sched
            .add(CreateJobSpec {
                name: "missed".into(),
                enabled: true,
                schedule: Schedule::Every { every_ms: 1000, anchor_ms: 1000 },
                payload: JobPayload::Event { topic: "t".into(), payload: serde_json::Value::Null },
                delete_after_run: false,
            })
            .await
            .expect("add");

        // Simulate several missed ticks' worth of downtime before boot.
        clock.set_epoch_ms(5500);
        let results = sched.start().await.expect("start runs due set once");
        assert_eq!(results.len(), 1);
        let again = sched.tick().await.expect("second tick");
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn recompute_all_is_idempotent_when_all_future() {
        let clock = FakeClock::new(0);
        let sched = scheduler(clock.clone());
        sched
            .add(CreateJobSpec {
                name: "future".into(),
                enabled: true,
                schedule: Schedule::Every { every_ms: 1000, anchor_ms: 5000 },
                payload: JobPayload::Event { topic: "t".into(), payload: serde_json::Value::Null },
                delete_after_run: false,
            })
            .await
            .expect("add");

        assert!(!sched.recompute_all_next_runs().await.expect("recompute"));
    }

    #[tokio::test]
    async fn next_wake_delay_is_clamped_to_max() {
        let clock = FakeClock::new(0);
        let sched = scheduler(clock.clone());
        sched
            .add(CreateJobSpec {
                name: "far".into(),
                enabled: true,
                schedule: Schedule::At { at_ms: 10 * MAX_TIMER_DELAY_MS },
                payload: JobPayload::Event { topic: "t".into(), payload: serde_json::Value::Null },
                delete_after_run: false,
            })
            .await
            .expect("add");
        assert_eq!(sched.next_wake_delay_ms().await, MAX_TIMER_DELAY_MS);
    }
}

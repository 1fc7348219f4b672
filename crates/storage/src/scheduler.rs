// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler job store: a single `scheduler.json`, rewritten atomically on
//! every mutation (spec §6 "Scheduler file format (version 1)").

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use undoable_core::ScheduledJob;

use crate::atomic::write_atomic;
use crate::error::StorageError;

const SCHEDULER_FILE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SchedulerFile {
    version: u32,
    jobs: Vec<ScheduledJob>,
}

pub struct SchedulerStore {
    path: PathBuf,
}

impl SchedulerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loads the job list, or an empty list if the file has never been
    /// written (first daemon start).
    pub fn load(&self) -> Result<Vec<ScheduledJob>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read(&self.path)?;
        let file: SchedulerFile = serde_json::from_slice(&raw)?;
        Ok(file.jobs)
    }

    /// Rewrites the whole file. Callers own serializing the in-memory job
    /// list before every mutation is released from the scheduler's FIFO gate
    /// (spec §4.5.2 "persistence is done before releasing the gate").
    pub fn save(&self, jobs: &[ScheduledJob]) -> Result<(), StorageError> {
        let file = SchedulerFile {
            version: SCHEDULER_FILE_VERSION,
            jobs: jobs.to_vec(),
        };
        let bytes = serde_json::to_vec_pretty(&file)?;
        write_atomic(&self.path, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use undoable_core::{JobId, JobPayload, JobState, Schedule};

    fn sample_job() -> ScheduledJob {
        ScheduledJob {
            id: JobId::new(),
            name: "nightly".into(),
            enabled: true,
            schedule: Schedule::Every { every_ms: 1000, anchor_ms: 0 },
            payload: JobPayload::Event { topic: "t".into(), payload: serde_json::Value::Null },
            delete_after_run: false,
            state: JobState::default(),
            created_at_ms: 0,
            updated_at_ms: 0,
        }
    }

    #[test]
    fn load_on_fresh_path_is_empty() {
        let dir = tempdir().expect("tempdir");
        let store = SchedulerStore::new(dir.path().join("scheduler.json"));
        assert!(store.load().expect("load").is_empty());
    }

    #[test]
    fn save_then_load_round_trips_jobs() {
        let dir = tempdir().expect("tempdir");
        let store = SchedulerStore::new(dir.path().join("scheduler.json"));
        let job = sample_job();
        store.save(std::slice::from_ref(&job)).expect("save");

        let loaded = store.load().expect("load");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, job.id);
        assert_eq!(loaded[0].name, "nightly");
    }

    #[test]
    fn file_carries_version_one() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("scheduler.json");
        let store = SchedulerStore::new(&path);
        store.save(&[sample_job()]).expect("save");

        let raw = fs::read_to_string(&path).expect("read");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("parse");
        assert_eq!(value["version"], 1);
    }
}

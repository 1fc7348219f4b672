// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run persistence (spec §4.6): "off" (memory only) or "file" (line-delimited
//! append with periodic compaction). Both backends speak the same trait so
//! the Run Manager in `undoable-engine` doesn't care which one is active.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use undoable_core::{Run, RunId};

use crate::action_log::load_jsonl;
use crate::atomic::{append_line, write_atomic};
use crate::error::StorageError;

pub trait RunStore: Send + Sync {
    fn upsert(&self, run: &Run) -> Result<(), StorageError>;
    fn get(&self, id: &RunId) -> Result<Option<Run>, StorageError>;
    fn list(&self) -> Result<Vec<Run>, StorageError>;
    fn list_by_job_id(&self, job_id: &str) -> Result<Vec<Run>, StorageError>;
    fn delete(&self, id: &RunId) -> Result<(), StorageError>;
}

/// `off`: runs live only in memory, lost on restart. Still goes through the
/// same trait so switching backends is a construction-time choice.
#[derive(Default)]
pub struct MemoryRunStore {
    runs: Mutex<HashMap<String, Run>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunStore for MemoryRunStore {
    fn upsert(&self, run: &Run) -> Result<(), StorageError> {
        self.runs.lock().unwrap_or_else(|e| e.into_inner()).insert(run.id.as_str().to_string(), run.clone());
        Ok(())
    }

    fn get(&self, id: &RunId) -> Result<Option<Run>, StorageError> {
        Ok(self.runs.lock().unwrap_or_else(|e| e.into_inner()).get(id.as_str()).cloned())
    }

    fn list(&self) -> Result<Vec<Run>, StorageError> {
        Ok(self.runs.lock().unwrap_or_else(|e| e.into_inner()).values().cloned().collect())
    }

    fn list_by_job_id(&self, job_id: &str) -> Result<Vec<Run>, StorageError> {
        Ok(self
            .runs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|r| r.job_id.as_deref() == Some(job_id))
            .cloned()
            .collect())
    }

    fn delete(&self, id: &RunId) -> Result<(), StorageError> {
        self.runs.lock().unwrap_or_else(|e| e.into_inner()).remove(id.as_str());
        Ok(())
    }
}

/// `file`: every create/update appends a full snapshot line; the current
/// state of a run is the last line mentioning its id. `compact()` rewrites
/// the file keeping only the newest line per (non-deleted) run id, which is
/// what keeps the log from growing without bound across a long-lived daemon.
pub struct FileRunStore {
    path: PathBuf,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum RunLogLine {
    Upsert { run: Run },
    Delete { id: String },
}

impl FileRunStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn replay(&self) -> Result<HashMap<String, Run>, StorageError> {
        let lines: Vec<RunLogLine> = load_jsonl(&self.path)?;
        let mut state: HashMap<String, Run> = HashMap::new();
        for line in lines {
            match line {
                RunLogLine::Upsert { run } => {
                    state.insert(run.id.as_str().to_string(), run);
                }
                RunLogLine::Delete { id } => {
                    state.remove(&id);
                }
            }
        }
        Ok(state)
    }

    /// Rewrite the file keeping one `Upsert` line per currently-live run.
    pub fn compact(&self) -> Result<(), StorageError> {
        let state = self.replay()?;
        let mut body = String::new();
        for run in state.values() {
            body.push_str(&serde_json::to_string(&RunLogLine::Upsert { run: run.clone() })?);
            body.push('\n');
        }
        write_atomic(&self.path, body.as_bytes())
    }
}

impl RunStore for FileRunStore {
    fn upsert(&self, run: &Run) -> Result<(), StorageError> {
        let line = serde_json::to_string(&RunLogLine::Upsert { run: run.clone() })?;
        append_line(&self.path, &line)
    }

    fn get(&self, id: &RunId) -> Result<Option<Run>, StorageError> {
        Ok(self.replay()?.remove(id.as_str()))
    }

    fn list(&self) -> Result<Vec<Run>, StorageError> {
        Ok(self.replay()?.into_values().collect())
    }

    fn list_by_job_id(&self, job_id: &str) -> Result<Vec<Run>, StorageError> {
        Ok(self
            .replay()?
            .into_values()
            .filter(|r| r.job_id.as_deref() == Some(job_id))
            .collect())
    }

    fn delete(&self, id: &RunId) -> Result<(), StorageError> {
        let line = serde_json::to_string(&RunLogLine::Delete { id: id.as_str().to_string() })?;
        append_line(&self.path, &line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_run() -> Run {
        Run::new("alice", "do the thing", 1000)
    }

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryRunStore::new();
        let run = sample_run();
        store.upsert(&run).expect("upsert");
        assert_eq!(store.get(&run.id).expect("get").unwrap().owner, "alice");
        store.delete(&run.id).expect("delete");
        assert!(store.get(&run.id).expect("get").is_none());
    }

    #[test]
    fn file_store_replays_upserts_and_deletes() {
        let dir = tempdir().expect("tempdir");
        let store = FileRunStore::new(dir.path().join("runs.jsonl"));
        let mut run = sample_run();
        store.upsert(&run).expect("upsert 1");

        run.status = undoable_core::RunStatus::Planning;
        store.upsert(&run).expect("upsert 2");

        let loaded = store.get(&run.id).expect("get").expect("present");
        assert_eq!(loaded.status, undoable_core::RunStatus::Planning);

        store.delete(&run.id).expect("delete");
        assert!(store.get(&run.id).expect("get").is_none());
    }

    #[test]
    fn compact_collapses_history_to_latest_state() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("runs.jsonl");
        let store = FileRunStore::new(&path);
        let mut run = sample_run();
        for _ in 0..5 {
            store.upsert(&run).expect("upsert");
            run.updated_at_ms += 1;
        }
        store.compact().expect("compact");

        let raw = fs::read_to_string(&path).expect("read");
        assert_eq!(raw.lines().count(), 1);

        let loaded = store.list().expect("list");
        assert_eq!(loaded.len(), 1);
    }
}

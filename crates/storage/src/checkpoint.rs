// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint Store (spec §4.4): one file per run under
//! `<home>/.undoable/checkpoints/<runId>.json`, atomic writes, best-effort
//! reads — absence is not an error.

use std::fs;
use std::path::PathBuf;

use undoable_core::Checkpoint;

use crate::atomic::write_atomic;
use crate::error::StorageError;

pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, run_id: &str) -> PathBuf {
        self.dir.join(format!("{run_id}.json"))
    }

    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), StorageError> {
        let path = self.path(checkpoint.run_id.as_str());
        let bytes = serde_json::to_vec_pretty(checkpoint)?;
        write_atomic(&path, &bytes)
    }

    pub fn load(&self, run_id: &str) -> Result<Option<Checkpoint>, StorageError> {
        let path = self.path(run_id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    pub fn exists(&self, run_id: &str) -> bool {
        self.path(run_id).exists()
    }

    pub fn remove(&self, run_id: &str) -> Result<(), StorageError> {
        let path = self.path(run_id);
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Run ids with a reloadable checkpoint on disk, for daemon-start
    /// recovery (spec §4.4: "pending runs whose checkpoint exists ... are
    /// reloadable"). Filtering to non-terminal status is the caller's job,
    /// since that requires deserializing each one anyway.
    pub fn list_run_ids(&self) -> Result<Vec<String>, StorageError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use undoable_core::{Checkpoint, Phase, RunId, RunStatus};

    #[test]
    fn save_load_exists_remove_round_trip() {
        let dir = tempdir().expect("tempdir");
        let store = CheckpointStore::new(dir.path());
        let run_id = RunId::new();
        let checkpoint = Checkpoint::new(run_id.clone(), RunStatus::Planning, Phase::Plan, 100);

        assert!(!store.exists(run_id.as_str()));
        store.save(&checkpoint).expect("save");
        assert!(store.exists(run_id.as_str()));

        let loaded = store.load(run_id.as_str()).expect("load").expect("present");
        assert_eq!(loaded.run_id, run_id);

        store.remove(run_id.as_str()).expect("remove");
        assert!(!store.exists(run_id.as_str()));
    }

    #[test]
    fn missing_checkpoint_loads_as_none() {
        let dir = tempdir().expect("tempdir");
        let store = CheckpointStore::new(dir.path());
        assert!(store.load("run-does-not-exist").expect("load").is_none());
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempdir().expect("tempdir");
        let store = CheckpointStore::new(dir.path());
        store.remove("run-never-existed").expect("remove is a no-op");
    }
}

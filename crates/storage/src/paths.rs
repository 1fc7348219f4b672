// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `<home>/.undoable/` layout (spec §6).

use std::path::PathBuf;

#[derive(Clone)]
pub struct HomeLayout {
    root: PathBuf,
}

impl HomeLayout {
    /// Resolves `<home>/.undoable`, honoring an explicit override (tests,
    /// or an operator who wants a non-default location) over `dirs::home_dir`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn discover() -> Option<Self> {
        dirs::home_dir().map(|home| Self::new(home.join(".undoable")))
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    pub fn pid_file(&self) -> PathBuf {
        self.root.join("daemon.pid.json")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join("daemon-settings.json")
    }

    pub fn scheduler_file(&self) -> PathBuf {
        self.root.join("scheduler.json")
    }

    pub fn action_log_file(&self) -> PathBuf {
        self.root.join("action-log.jsonl")
    }

    pub fn checkpoints_dir(&self) -> PathBuf {
        self.root.join("checkpoints")
    }

    pub fn checkpoint_file(&self, run_id: &str) -> PathBuf {
        self.checkpoints_dir().join(format!("{run_id}.json"))
    }

    pub fn workspace_dir(&self) -> PathBuf {
        self.root.join("workspace")
    }

    pub fn runs_file(&self) -> PathBuf {
        self.root.join("runs.jsonl")
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Undo Service (C8, spec §4.8): reverses previously-applied actions using
//! the `UndoData` each `ActionLogEntry` carried at record time, so reversal
//! never re-consults the tool that produced the effect.
//!
//! Reversers are keyed off `UndoData::category()`: `file-write` restores or
//! deletes the prior file state, `git-commit` hard-resets to the prior ref,
//! `patch-apply` reverse-applies the captured patch text. All three shell out
//! through `tokio::process::Command` or `tokio::fs` rather than re-entering
//! the `Tool` trait, since undo is a property of the Action Log, not a tool
//! invocation.

use std::path::Path;

use base64::Engine;
use tokio::process::Command;

use undoable_core::{ActionCategory, ActionLogEntry, Clock, UndoData};

use crate::action_log::ActionLogService;
use crate::error::EngineError;

/// What to undo: a single run's actions, the last N log entries regardless of
/// run, or everything undoable in the log (spec §4.8 `undo` targets).
#[derive(Debug, Clone)]
pub enum UndoTarget {
    Run(String),
    LastN(usize),
    All,
}

/// Outcome of one `undo` call: entry ids reversed in the order they were
/// reversed, and the error that halted the walk (if any) short of completion.
#[derive(Debug, Clone, Default)]
pub struct UndoOutcome {
    pub reversed: Vec<String>,
    pub error: Option<String>,
}

pub struct UndoService<C: Clock> {
    action_log: std::sync::Arc<ActionLogService>,
    clock: C,
}

impl<C: Clock> UndoService<C> {
    pub fn new(action_log: std::sync::Arc<ActionLogService>, clock: C) -> Self {
        Self { action_log, clock }
    }

    /// Select the candidate entries for `target`, newest-first, undoable and
    /// not-yet-reversed (spec §4.8: a `compensation` entry marks its target as
    /// already reversed, so entries with a recorded compensation are skipped).
    fn candidates(&self, target: &UndoTarget) -> Result<Vec<ActionLogEntry>, EngineError> {
        let mut entries = self.action_log.latest_states()?;
        entries.reverse(); // newest first

        let already_reversed: std::collections::HashSet<String> = entries
            .iter()
            .filter_map(|e| e.params.get("reverses").and_then(|v| v.as_str()).map(|s| s.to_string()))
            .collect();

        let selected = match target {
            UndoTarget::Run(run_id) => entries.into_iter().filter(|e| e.run_id.as_deref() == Some(run_id.as_str())).collect(),
            UndoTarget::LastN(n) => entries.into_iter().take(*n).collect(),
            UndoTarget::All => entries,
        };

        Ok(selected
            .into_iter()
            .filter(|e| e.undoable && e.undo_data.is_some() && !already_reversed.contains(e.id.as_str()))
            .collect())
    }

    /// Reverse every selected entry in order, halting at the first failure
    /// and returning what was reversed before it (spec §4.8: "partial success
    /// is reported, not rolled back further"). Undo is not itself undoable:
    /// reversal failures are surfaced, not retried.
    pub async fn undo(&self, target: UndoTarget) -> Result<UndoOutcome, EngineError> {
        let candidates = self.candidates(&target)?;
        let mut outcome = UndoOutcome::default();

        for entry in candidates {
            match self.reverse_one(&entry).await {
                Ok(()) => {
                    self.action_log.record_compensation(
                        &entry,
                        ActionCategory::Mutate,
                        undoable_core::ActionResult { success: true, output: None, error: None },
                        self.clock.epoch_ms(),
                    )?;
                    outcome.reversed.push(entry.id.as_str().to_string());
                }
                Err(e) => {
                    self.action_log.record_compensation(
                        &entry,
                        ActionCategory::Mutate,
                        undoable_core::ActionResult { success: false, output: None, error: Some(e.to_string()) },
                        self.clock.epoch_ms(),
                    )?;
                    outcome.error = Some(format!("{}: {e}", entry.id.as_str()));
                    break;
                }
            }
        }

        Ok(outcome)
    }

    async fn reverse_one(&self, entry: &ActionLogEntry) -> Result<(), EngineError> {
        let undo_data = entry
            .undo_data
            .as_ref()
            .ok_or_else(|| EngineError::NotUndoable(entry.id.as_str().to_string()))?;

        match undo_data {
            UndoData::FileWrite { path, previous_existed, previous_content, content_base64 } => {
                reverse_file_write(path, *previous_existed, previous_content.as_deref(), content_base64.as_deref())
                    .await
                    .map_err(|e| EngineError::UndoFailed(e.to_string()))
            }
            UndoData::GitCommit { prior_ref, working_dir } => {
                reverse_git_commit(working_dir, prior_ref).await.map_err(|e| EngineError::UndoFailed(e.to_string()))
            }
            UndoData::PatchApply { patch_text, working_dir } => {
                reverse_patch_apply(working_dir, patch_text).await.map_err(|e| EngineError::UndoFailed(e.to_string()))
            }
        }
    }
}

async fn reverse_file_write(
    path: &str,
    previous_existed: bool,
    previous_content: Option<&str>,
    content_base64: Option<&str>,
) -> Result<(), std::io::Error> {
    if !previous_existed {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    } else if let Some(encoded) = content_base64 {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        if let Some(parent) = Path::new(path).parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await
    } else if let Some(text) = previous_content {
        if let Some(parent) = Path::new(path).parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, text).await
    } else {
        Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "no previous content captured to restore"))
    }
}

async fn reverse_git_commit(working_dir: &str, prior_ref: &str) -> Result<(), std::io::Error> {
    run_command(working_dir, "git", &["reset", "--hard", prior_ref]).await
}

#[allow(clippy::expect_used)]
async fn reverse_patch_apply(working_dir: &str, patch_text: &str) -> Result<(), std::io::Error> {
    use std::process::Stdio;
    let mut child = Command::new("patch")
        .arg("-R")
        .arg("-p1")
        .current_dir(working_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;

    {
        use tokio::io::AsyncWriteExt;
        let stdin = child.stdin.as_mut().expect("stdin piped above");
        stdin.write_all(patch_text.as_bytes()).await?;
    }

    let output = child.wait_with_output().await?;
    if output.status.success() {
        Ok(())
    } else {
        Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("patch -R exited with {}: {}", output.status, String::from_utf8_lossy(&output.stderr)),
        ))
    }
}

async fn run_command(working_dir: &str, program: &str, args: &[&str]) -> Result<(), std::io::Error> {
    let output = Command::new(program).args(args).current_dir(working_dir).output().await?;
    if output.status.success() {
        Ok(())
    } else {
        Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("{program} {} exited with {}: {}", args.join(" "), output.status, String::from_utf8_lossy(&output.stderr)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;
    use undoable_core::{ActionSpec, ApprovalDecision, FakeClock};
    use undoable_storage::ActionLogStore;

    fn service(dir: &Path) -> UndoService<FakeClock> {
        let store = Arc::new(ActionLogStore::new(dir.join("action-log.jsonl")));
        let action_log = Arc::new(ActionLogService::new(store));
        UndoService::new(action_log, FakeClock::new(1000))
    }

    #[tokio::test]
    async fn restores_prior_file_content() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("f.txt");
        tokio::fs::write(&target, "new content").await.expect("write new content");

        let svc = service(dir.path());
        let spec = ActionSpec {
            run_id: Some("run-1".into()),
            tool: "fs.write".into(),
            category: ActionCategory::Mutate,
            params: serde_json::json!({}),
            approval: ApprovalDecision::AutoApproved,
            undoable: true,
            undo_data: Some(UndoData::FileWrite {
                path: target.to_string_lossy().to_string(),
                previous_existed: true,
                previous_content: Some("old content".into()),
                content_base64: None,
            }),
        };
        let id = svc.action_log.record(spec, 100).expect("record");
        svc.action_log
            .complete(&id, undoable_core::ActionResult { success: true, output: None, error: None }, 110)
            .expect("complete");

        let outcome = svc.undo(UndoTarget::Run("run-1".into())).await.expect("undo");
        assert_eq!(outcome.reversed.len(), 1);
        assert!(outcome.error.is_none());

        let restored = tokio::fs::read_to_string(&target).await.expect("read restored");
        assert_eq!(restored, "old content");
    }

    #[tokio::test]
    async fn deletes_file_that_did_not_previously_exist() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("created.txt");
        tokio::fs::write(&target, "created by the step").await.expect("write");

        let svc = service(dir.path());
        let spec = ActionSpec {
            run_id: Some("run-1".into()),
            tool: "fs.write".into(),
            category: ActionCategory::Mutate,
            params: serde_json::json!({}),
            approval: ApprovalDecision::AutoApproved,
            undoable: true,
            undo_data: Some(UndoData::FileWrite {
                path: target.to_string_lossy().to_string(),
                previous_existed: false,
                previous_content: None,
                content_base64: None,
            }),
        };
        let id = svc.action_log.record(spec, 100).expect("record");
        svc.action_log
            .complete(&id, undoable_core::ActionResult { success: true, output: None, error: None }, 110)
            .expect("complete");

        svc.undo(UndoTarget::Run("run-1".into())).await.expect("undo");
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn entries_without_undo_data_are_skipped() {
        let dir = tempdir().expect("tempdir");
        let svc = service(dir.path());
        let spec = ActionSpec {
            run_id: Some("run-1".into()),
            tool: "read".into(),
            category: ActionCategory::Read,
            params: serde_json::json!({}),
            approval: ApprovalDecision::AutoApproved,
            undoable: false,
            undo_data: None,
        };
        svc.action_log.record(spec, 100).expect("record");

        let outcome = svc.undo(UndoTarget::Run("run-1".into())).await.expect("undo");
        assert!(outcome.reversed.is_empty());
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn already_reversed_entry_is_not_reversed_twice() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("f.txt");
        tokio::fs::write(&target, "new content").await.expect("write");

        let svc = service(dir.path());
        let spec = ActionSpec {
            run_id: Some("run-1".into()),
            tool: "fs.write".into(),
            category: ActionCategory::Mutate,
            params: serde_json::json!({}),
            approval: ApprovalDecision::AutoApproved,
            undoable: true,
            undo_data: Some(UndoData::FileWrite {
                path: target.to_string_lossy().to_string(),
                previous_existed: true,
                previous_content: Some("old content".into()),
                content_base64: None,
            }),
        };
        let id = svc.action_log.record(spec, 100).expect("record");
        svc.action_log
            .complete(&id, undoable_core::ActionResult { success: true, output: None, error: None }, 110)
            .expect("complete");

        svc.undo(UndoTarget::Run("run-1".into())).await.expect("first undo");
        let second = svc.undo(UndoTarget::Run("run-1".into())).await.expect("second undo");
        assert!(second.reversed.is_empty());
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ActionLogEntry — append-only action ledger record (spec §3, §4.2).

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for an action log entry.
    pub struct ActionLogEntryId("ent-");
}

/// Category a logged action belongs to, used by the Approval Gate (§4.3)
/// and the Undo Service's category-specific reversers (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    Read,
    Mutate,
    Network,
    Destructive,
}

crate::simple_display! {
    ActionCategory {
        Read => "read",
        Mutate => "mutate",
        Network => "network",
        Destructive => "destructive",
    }
}

/// Approval decision recorded against an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApprovalDecision {
    AutoApproved,
    UserApproved,
    Denied,
}

/// Category-tagged reversal payload captured at record time, so the Undo
/// Service can reverse an action without re-consulting the tool (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum UndoData {
    FileWrite {
        path: String,
        previous_existed: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous_content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_base64: Option<String>,
    },
    GitCommit {
        prior_ref: String,
        working_dir: String,
    },
    PatchApply {
        patch_text: String,
        working_dir: String,
    },
}

impl UndoData {
    pub fn category(&self) -> &'static str {
        match self {
            UndoData::FileWrite { .. } => "file-write",
            UndoData::GitCommit { .. } => "git-commit",
            UndoData::PatchApply { .. } => "patch-apply",
        }
    }
}

/// Outcome envelope for a completed action, independent of whether it
/// succeeded (tool failures are values — spec §7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// An append-only action log record. Immutable once `complete`d (spec §3
/// invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub id: ActionLogEntryId,
    pub run_id: Option<String>,
    pub tool: String,
    pub category: ActionCategory,
    pub params: serde_json::Value,
    pub approval: ApprovalDecision,
    pub undoable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undo_data: Option<UndoData>,
    pub started_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ActionResult>,
}

impl ActionLogEntry {
    pub fn is_completed(&self) -> bool {
        self.completed_at_ms.is_some()
    }
}

/// Spec for recording a pending action entry (spec §4.2 `record`).
#[derive(Debug, Clone)]
pub struct ActionSpec {
    pub run_id: Option<String>,
    pub tool: String,
    pub category: ActionCategory,
    pub params: serde_json::Value,
    pub approval: ApprovalDecision,
    pub undoable: bool,
    pub undo_data: Option<UndoData>,
}

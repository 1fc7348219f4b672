// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run identifier and phase state machine (spec §3 Run, §4.7).

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a Run.
    pub struct RunId("run-");
}

/// Status of a Run. Mirrors the phase machine in spec §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Created,
    Planning,
    Planned,
    Shadowing,
    Shadowed,
    ApprovalRequired,
    Applying,
    Applied,
    Undoing,
    Undone,
    Paused,
    Cancelled,
    Failed,
    Completed,
}

crate::simple_display! {
    RunStatus {
        Created => "created",
        Planning => "planning",
        Planned => "planned",
        Shadowing => "shadowing",
        Shadowed => "shadowed",
        ApprovalRequired => "approval_required",
        Applying => "applying",
        Applied => "applied",
        Undoing => "undoing",
        Undone => "undone",
        Paused => "paused",
        Cancelled => "cancelled",
        Failed => "failed",
        Completed => "completed",
    }
}

impl RunStatus {
    /// Terminal states accept no further phase transitions, only deletion.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Applied
                | RunStatus::Undone
                | RunStatus::Cancelled
                | RunStatus::Failed
                | RunStatus::Completed
        )
    }

    /// Valid forward phase transitions, per the machine diagrammed in spec §4.7.
    /// `Paused` is orthogonal and reachable from (and back to) any non-terminal
    /// status — callers check `is_terminal()` separately before allowing it.
    pub fn can_advance_to(&self, next: RunStatus) -> bool {
        use RunStatus::*;
        if self.is_terminal() {
            return false;
        }
        match (*self, next) {
            (_, Cancelled) => true,
            (_, Failed) => true,
            (Created, Planning) => true,
            (Planning, Planned) => true,
            (Planned, Shadowing) => true,
            (Shadowing, Shadowed) => true,
            (Shadowed, ApprovalRequired) => true,
            (Shadowed, Applying) => true,
            (ApprovalRequired, Applying) => true,
            (Applying, Applied) => true,
            (Applied, Undoing) => true,
            (Undoing, Undone) => true,
            (Applied, Completed) => true,
            (s, Paused) if s != Paused => true,
            (Paused, resumed) => {
                // Resuming restores the prior phase-derived running status;
                // the executor is responsible for picking a valid `resumed`.
                !matches!(resumed, Paused)
            }
            _ => false,
        }
    }
}

/// Identity and attributes of a single unit of agent work (spec §3 Run).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    /// Present when a scheduler or swarm launched the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub owner: String,
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub status: RunStatus,
    /// Status the run was in before entering `Paused`, so resume can restore it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_from: Option<RunStatus>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl Run {
    pub fn new(owner: impl Into<String>, instruction: impl Into<String>, now_ms: u64) -> Self {
        Self {
            id: RunId::new(),
            job_id: None,
            owner: owner.into(),
            instruction: instruction.into(),
            agent_id: None,
            status: RunStatus::Created,
            paused_from: None,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }
}

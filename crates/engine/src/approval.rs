// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Approval Gate (spec §4.3): category + mode -> decision, plus the
//! user-decision wait the Run Executor blocks on during `approval_required`.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::timeout;

use undoable_core::ActionCategory;

use crate::error::EngineError;

/// Global approval mode, operator-configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalMode {
    /// Require a user decision for anything beyond `read`.
    Always,
    /// Auto-approve `read` and `network`; still ask for `mutate`/`destructive`.
    AutoSafe,
    /// Auto-approve everything except `destructive`.
    NeverAsk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    AutoApproved,
    RequireUser,
    Deny,
}

/// Default time a step waits on a user decision before failing with
/// `approval_timeout` (spec §4.3).
pub const DEFAULT_APPROVAL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Maps `(category, mode)` to a decision per the table in spec §4.3.
pub fn decide(category: ActionCategory, mode: ApprovalMode) -> GateDecision {
    use ActionCategory::*;
    use ApprovalMode::*;
    match (category, mode) {
        (Read, _) => GateDecision::AutoApproved,
        (Network, AutoSafe) => GateDecision::AutoApproved,
        (Network, _) => GateDecision::RequireUser,
        (Mutate, NeverAsk) => GateDecision::AutoApproved,
        (Mutate, _) => GateDecision::RequireUser,
        (Destructive, _) => GateDecision::RequireUser,
    }
}

/// A pending request for a user decision, surfaced over the gateway (C10).
/// The Executor awaits `wait()`; whoever answers the prompt calls `resolve`.
pub struct ApprovalRequest {
    reply_tx: Option<oneshot::Sender<bool>>,
}

pub struct ApprovalHandle {
    reply_rx: oneshot::Receiver<bool>,
}

pub fn approval_channel() -> (ApprovalRequest, ApprovalHandle) {
    let (tx, rx) = oneshot::channel();
    (ApprovalRequest { reply_tx: Some(tx) }, ApprovalHandle { reply_rx: rx })
}

impl ApprovalRequest {
    /// Record the user's decision. A second call is a no-op (the channel is
    /// already consumed), matching `complete`'s idempotency contract for
    /// similarly single-shot operations elsewhere in the core.
    pub fn resolve(mut self, approved: bool) {
        if let Some(tx) = self.reply_tx.take() {
            let _ = tx.send(approved);
        }
    }
}

impl ApprovalHandle {
    pub async fn wait(self, deadline: Duration) -> Result<bool, EngineError> {
        match timeout(deadline, self.reply_rx).await {
            Ok(Ok(approved)) => Ok(approved),
            Ok(Err(_)) => Err(EngineError::ApprovalTimeout),
            Err(_) => Err(EngineError::ApprovalTimeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_is_always_auto_approved() {
        for mode in [ApprovalMode::Always, ApprovalMode::AutoSafe, ApprovalMode::NeverAsk] {
            assert_eq!(decide(ActionCategory::Read, mode), GateDecision::AutoApproved);
        }
    }

    #[test]
    fn network_auto_under_auto_safe_else_require() {
        assert_eq!(decide(ActionCategory::Network, ApprovalMode::AutoSafe), GateDecision::AutoApproved);
        assert_eq!(decide(ActionCategory::Network, ApprovalMode::Always), GateDecision::RequireUser);
        assert_eq!(decide(ActionCategory::Network, ApprovalMode::NeverAsk), GateDecision::RequireUser);
    }

    #[test]
    fn mutate_requires_user_unless_never_ask() {
        assert_eq!(decide(ActionCategory::Mutate, ApprovalMode::NeverAsk), GateDecision::AutoApproved);
        assert_eq!(decide(ActionCategory::Mutate, ApprovalMode::Always), GateDecision::RequireUser);
        assert_eq!(decide(ActionCategory::Mutate, ApprovalMode::AutoSafe), GateDecision::RequireUser);
    }

    #[test]
    fn destructive_always_requires_user() {
        for mode in [ApprovalMode::Always, ApprovalMode::AutoSafe, ApprovalMode::NeverAsk] {
            assert_eq!(decide(ActionCategory::Destructive, mode), GateDecision::RequireUser);
        }
    }

    #[tokio::test]
    async fn handle_resolves_with_the_requests_decision() {
        let (req, handle) = approval_channel();
        req.resolve(true);
        let approved = handle.wait(Duration::from_millis(50)).await.expect("resolved before deadline");
        assert!(approved);
    }

    #[tokio::test]
    async fn handle_times_out_when_unanswered() {
        let (_req, handle) = approval_channel();
        let result = handle.wait(Duration::from_millis(10)).await;
        assert!(matches!(result, Err(EngineError::ApprovalTimeout)));
    }
}

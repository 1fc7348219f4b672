// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Tool` capability set the Run Executor invokes (spec §1: "Tool
//! adapters ... treated as a Tool capability set invoked by the engine").
//!
//! Concrete adapters (filesystem, shell, HTTP, browser, channels) are out of
//! scope for this workspace; only the trait and a couple of in-memory stand-ins
//! used by the engine's own tests live here.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool {tool} failed: {message}")]
    Failed { tool: String, message: String },
    #[error("tool {0} timed out")]
    TimedOut(String),
    #[error("tool {0} was cancelled")]
    Cancelled(String),
    #[error("unknown tool: {0}")]
    Unknown(String),
}

/// Context passed to a tool invocation: the step's declared parameters and
/// the working directory it should act within.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub step_id: String,
    pub params: serde_json::Value,
    pub workspace_dir: std::path::PathBuf,
}

/// Outcome of a tool invocation, plus the undo payload (if any) the Action
/// Log should retain for this invocation (spec §3 ActionLogEntry.undoData).
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub output: serde_json::Value,
    pub undo_data: Option<undoable_core::UndoData>,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Declared capabilities this tool may exercise, used to pick an
    /// `ActionCategory` for the Approval Gate.
    fn category(&self) -> undoable_core::ActionCategory;

    async fn invoke(&self, ctx: ToolContext) -> Result<ToolOutcome, ToolError>;
}

/// Registry of tools available to the executor, keyed by name.
pub trait ToolRegistry: Send + Sync {
    fn get(&self, name: &str) -> Option<&dyn Tool>;
}

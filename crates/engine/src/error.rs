// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use undoable_adapters::{ProducerError, ToolError};
use undoable_core::CoreError;
use undoable_storage::StorageError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Producer(#[from] ProducerError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("approval timed out")]
    ApprovalTimeout,

    #[error("approval denied")]
    ApprovalDenied,

    #[error("run {0} not found")]
    RunNotFound(String),

    #[error("job {0} not found")]
    JobNotFound(String),

    #[error("workflow {0} not found")]
    WorkflowNotFound(String),

    #[error("orchestration {0} not found")]
    OrchestrationNotFound(String),

    #[error("{0} is not undoable")]
    NotUndoable(String),

    #[error("undo reversal failed: {0}")]
    UndoFailed(String),

    #[error("operation cancelled")]
    Cancelled,
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon-crate error type.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use undoable_wire::{ErrorKind, ErrorResponse};

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("could not resolve the home directory")]
    NoHomeDir,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] undoable_storage::StorageError),
    #[error(transparent)]
    Core(#[from] undoable_core::CoreError),
    #[error(transparent)]
    Engine(#[from] undoable_engine::EngineError),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("daemon operation mode is not normal: {reason}")]
    OperationModeBlock { reason: String },
}

impl DaemonError {
    fn kind(&self) -> ErrorKind {
        match self {
            DaemonError::Validation(_) => ErrorKind::Validation,
            DaemonError::NotFound(_) => ErrorKind::NotFound,
            DaemonError::Conflict(_) => ErrorKind::Conflict,
            DaemonError::Unauthorized => ErrorKind::Unauthorized,
            DaemonError::OperationModeBlock { .. } => ErrorKind::Locked,
            DaemonError::Core(undoable_core::CoreError::InvalidPlan(_))
            | DaemonError::Core(undoable_core::CoreError::InvalidWorkflow(_)) => ErrorKind::Validation,
            DaemonError::Core(undoable_core::CoreError::NotFound(_)) => ErrorKind::NotFound,
            DaemonError::Core(undoable_core::CoreError::Conflict(_)) => ErrorKind::Conflict,
            DaemonError::Engine(undoable_engine::EngineError::RunNotFound(_))
            | DaemonError::Engine(undoable_engine::EngineError::JobNotFound(_))
            | DaemonError::Engine(undoable_engine::EngineError::WorkflowNotFound(_))
            | DaemonError::Engine(undoable_engine::EngineError::OrchestrationNotFound(_)) => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        }
    }
}

impl IntoResponse for DaemonError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status =
            StatusCode::from_u16(kind.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut body = ErrorResponse::new(self.to_string());
        if let DaemonError::OperationModeBlock { .. } = &self {
            body = body
                .with_code(undoable_wire::DAEMON_OPERATION_MODE_BLOCK)
                .with_recovery("retry after the daemon returns to operation mode `normal`");
        }
        if kind == ErrorKind::Internal {
            tracing::error!(error = %self, "internal error");
        }
        (status, Json(body)).into_response()
    }
}

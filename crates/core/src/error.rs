// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain-invariant violations. I/O and serde errors belong to the crate
//! that touches the filesystem (`undoable-storage`) and wrap `CoreError`
//! with `#[from]`, per SPEC_FULL.md §4.0.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    #[error("invalid workflow: {0}")]
    InvalidWorkflow(String),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `PlanProducer` / `ChatProducer` — the narrow interfaces the engine uses
//! to reach an LLM provider (spec §1: "LLM provider adapters ... treated as
//! a PlanProducer / ChatProducer capability").

use async_trait::async_trait;
use thiserror::Error;
use undoable_core::PlanGraph;

#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("producer failed: {0}")]
    Failed(String),
    #[error("producer timed out")]
    TimedOut,
}

/// Context gathered for a plan request: the instruction plus whatever the
/// engine has assembled about the workspace (out of scope to define further
/// here — passed through opaquely).
#[derive(Debug, Clone, Default)]
pub struct PlanContext {
    pub instruction: String,
    pub agent_id: Option<String>,
    pub extra: serde_json::Value,
}

#[async_trait]
pub trait PlanProducer: Send + Sync {
    async fn produce_plan(&self, ctx: PlanContext) -> Result<PlanGraph, ProducerError>;
}

/// Streaming chat capability, used outside the Run Executor proper (e.g. an
/// interactive wizard) but declared here as the matching narrow interface.
#[async_trait]
pub trait ChatProducer: Send + Sync {
    async fn send(&self, message: &str) -> Result<String, ProducerError>;
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Default `PlanProducer`/`ToolRegistry` the daemon boots with. LLM provider
//! and tool adapters are external collaborators consumed only through
//! `undoable-adapters`'s narrow interfaces (spec §1); concrete integrations
//! are out of scope for this workspace, so `undoabled` ships with a
//! producer that declines every plan and an empty tool registry until a real
//! one is wired in at a call site this binary doesn't yet expose.

use async_trait::async_trait;
use undoable_adapters::{PlanContext, PlanProducer, ProducerError, Tool, ToolRegistry};
use undoable_core::PlanGraph;

pub struct UnconfiguredPlanProducer;

#[async_trait]
impl PlanProducer for UnconfiguredPlanProducer {
    async fn produce_plan(&self, _ctx: PlanContext) -> Result<PlanGraph, ProducerError> {
        Err(ProducerError::Failed("no plan producer configured".to_string()))
    }
}

#[derive(Default)]
pub struct EmptyToolRegistry;

impl ToolRegistry for EmptyToolRegistry {
    fn get(&self, _name: &str) -> Option<&dyn Tool> {
        None
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory stand-ins used by the engine's own tests — no network, no
//! filesystem, nothing reversible.

use async_trait::async_trait;
use std::collections::HashMap;
use undoable_core::{ActionCategory, PlanGraph};

use crate::plan_producer::{PlanContext, PlanProducer, ProducerError};
use crate::tool::{Tool, ToolContext, ToolError, ToolOutcome, ToolRegistry};

/// Always returns a fixed plan, ignoring the instruction it was given.
pub struct StubPlanProducer {
    plan: PlanGraph,
}

impl StubPlanProducer {
    pub fn new(plan: PlanGraph) -> Self {
        Self { plan }
    }
}

#[async_trait]
impl PlanProducer for StubPlanProducer {
    async fn produce_plan(&self, _ctx: PlanContext) -> Result<PlanGraph, ProducerError> {
        Ok(self.plan.clone())
    }
}

/// Tool that echoes its params back as output and never fails. Category is
/// configurable so tests can exercise every Approval Gate branch.
pub struct EchoTool {
    name: String,
    category: ActionCategory,
}

impl EchoTool {
    pub fn new(name: impl Into<String>, category: ActionCategory) -> Self {
        Self {
            name: name.into(),
            category,
        }
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> ActionCategory {
        self.category
    }

    async fn invoke(&self, ctx: ToolContext) -> Result<ToolOutcome, ToolError> {
        Ok(ToolOutcome {
            output: ctx.params,
            undo_data: None,
        })
    }
}

/// Tool that always fails, for exercising skip-on-failed-ancestor semantics.
pub struct FailingTool {
    name: String,
    category: ActionCategory,
    message: String,
}

impl FailingTool {
    pub fn new(name: impl Into<String>, category: ActionCategory, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category,
            message: message.into(),
        }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> ActionCategory {
        self.category
    }

    async fn invoke(&self, ctx: ToolContext) -> Result<ToolOutcome, ToolError> {
        Err(ToolError::Failed {
            tool: ctx.step_id,
            message: self.message.clone(),
        })
    }
}

#[derive(Default)]
pub struct StubToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl StubToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) -> &mut Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }
}

impl ToolRegistry for StubToolRegistry {
    fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use undoable_core::{PlanGraph, PLAN_SCHEMA_VERSION};

    #[tokio::test]
    async fn stub_plan_producer_returns_fixed_plan() {
        let plan = PlanGraph {
            schema_version: PLAN_SCHEMA_VERSION,
            instruction: "do it".into(),
            agent_id: "a1".into(),
            steps: vec![],
        };
        let producer = StubPlanProducer::new(plan.clone());
        let got = producer
            .produce_plan(PlanContext::default())
            .await
            .expect("stub never fails");
        assert_eq!(got.instruction, plan.instruction);
    }

    #[tokio::test]
    async fn echo_tool_returns_params_as_output() {
        let tool = EchoTool::new("echo", ActionCategory::Read);
        let ctx = ToolContext {
            step_id: "s1".into(),
            params: serde_json::json!({"a": 1}),
            workspace_dir: std::env::temp_dir(),
        };
        let out = tool.invoke(ctx).await.expect("echo never fails");
        assert_eq!(out.output, serde_json::json!({"a": 1}));
    }

    #[test]
    fn registry_looks_up_by_name() {
        let mut registry = StubToolRegistry::new();
        registry.register(Box::new(EchoTool::new("echo", ActionCategory::Read)));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! undoable-adapters: the narrow capability traits the engine depends on
//! instead of concrete LLM/tool integrations — `PlanProducer`, `ChatProducer`
//! and `Tool`/`ToolRegistry`. Concrete implementations (OpenAI, shell,
//! filesystem, ...) are out of scope for this workspace.

pub mod plan_producer;
pub mod tool;

#[cfg(any(test, feature = "test-support"))]
pub mod stub;

pub use plan_producer::{ChatProducer, PlanContext, PlanProducer, ProducerError};
pub use tool::{Tool, ToolContext, ToolError, ToolOutcome, ToolRegistry};

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed events flowing through the Event Bus (spec §4.1).

use crate::plan::StepResult;
use crate::run::RunStatus;
use serde::{Deserialize, Serialize};

/// Events published onto a bus topic. Serializes with `{"type": "...", ...}`,
/// matching the teacher's internally-tagged `Event` enum idiom. Field names
/// are camelCase since `BusEvent` is carried verbatim into the SSE envelope
/// (spec §6 "wire boundary" rule) without its own wire-crate mirror.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BusEvent {
    #[serde(rename = "token")]
    Token { text: String },

    #[serde(rename = "tool_call")]
    ToolCall {
        #[serde(rename = "stepId")]
        step_id: String,
        tool: String,
    },

    #[serde(rename = "status_change")]
    StatusChange { status: RunStatus },

    #[serde(rename = "step_result")]
    StepResult { result: StepResult },

    #[serde(rename = "phase")]
    Phase { phase: String },

    #[serde(rename = "usage")]
    Usage {
        #[serde(rename = "promptTokens")]
        prompt_tokens: u64,
        #[serde(rename = "completionTokens")]
        completion_tokens: u64,
    },

    /// Arbitrary payload published by a `JobPayload::Event` scheduled job,
    /// carried through the bus verbatim rather than squeezed into a
    /// fixed-shape variant.
    #[serde(rename = "custom")]
    Custom { topic: String, payload: serde_json::Value },

    #[serde(rename = "error")]
    Error { message: String },

    #[serde(rename = "done")]
    Done,
}

impl BusEvent {
    /// The `type` tag this variant serializes under, for callers (the SSE
    /// gateway) that need it outside a full serialize round-trip.
    pub fn kind(&self) -> &'static str {
        match self {
            BusEvent::Token { .. } => "token",
            BusEvent::ToolCall { .. } => "tool_call",
            BusEvent::StatusChange { .. } => "status_change",
            BusEvent::StepResult { .. } => "step_result",
            BusEvent::Phase { .. } => "phase",
            BusEvent::Usage { .. } => "usage",
            BusEvent::Custom { .. } => "custom",
            BusEvent::Error { .. } => "error",
            BusEvent::Done => "done",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_call_and_usage_serialize_with_camel_case_keys() {
        let value = serde_json::to_value(BusEvent::ToolCall { step_id: "s1".into(), tool: "fs.write".into() })
            .expect("serialize");
        assert_eq!(value["stepId"], "s1");
        assert!(value.get("step_id").is_none());

        let value = serde_json::to_value(BusEvent::Usage { prompt_tokens: 10, completion_tokens: 20 }).expect("serialize");
        assert_eq!(value["promptTokens"], 10);
        assert_eq!(value["completionTokens"], 20);
        assert!(value.get("prompt_tokens").is_none());
        assert!(value.get("completion_tokens").is_none());
    }

    #[test]
    fn step_result_variant_serializes_with_camel_case_keys() {
        let result = StepResult::ok("s1", "fs.write", serde_json::Value::Null, std::time::Duration::from_millis(5));
        let value = serde_json::to_value(BusEvent::StepResult { result }).expect("serialize");
        assert_eq!(value["result"]["stepId"], "s1");
        assert_eq!(value["result"]["durationMs"], 5);
        assert!(value["result"].get("step_id").is_none());
    }
}

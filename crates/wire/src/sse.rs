// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSE envelope (spec §6: `data: {"type", "ts", "payload"}\n\n`, heartbeats
//! as bare comment frames).

use serde::Serialize;

use crate::time::iso8601;

#[derive(Debug, Clone, Serialize)]
pub struct SseEnvelope<T> {
    #[serde(rename = "type")]
    pub kind: String,
    pub ts: String,
    pub payload: T,
}

impl<T: Serialize> SseEnvelope<T> {
    pub fn new(kind: impl Into<String>, now_ms: u64, payload: T) -> Self {
        Self { kind: kind.into(), ts: iso8601(now_ms), payload }
    }

    /// Render one `data: ...\n\n` frame. Returns `None` if `payload` fails to
    /// serialize (never expected for the domain types this wraps).
    pub fn to_frame(&self) -> Option<String> {
        serde_json::to_string(self).ok().map(|body| format!("data: {body}\n\n"))
    }
}

/// A heartbeat comment frame, sent every 15s (spec §5 Timeouts) to keep
/// intermediaries from closing an idle SSE connection.
pub const HEARTBEAT_FRAME: &str = ":\n\n";

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn frame_has_data_prefix_and_blank_line_terminator() {
        let env = SseEnvelope::new("status_change", 0, json!({"status": "planning"}));
        let frame = env.to_frame().expect("serializable payload");
        assert!(frame.starts_with("data: "));
        assert!(frame.ends_with("\n\n"));
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon-wide operation mode (spec §4.10, §9 glossary). Held as an
//! explicit, threaded `Arc<parking_lot::RwLock<_>>` on `Environment` rather
//! than a process global (SPEC_FULL.md §4.11).

use parking_lot::RwLock;
use undoable_wire::OperationMode;

pub struct OperationCell {
    mode: RwLock<OperationMode>,
    reason: RwLock<Option<String>>,
    updated_at_ms: RwLock<u64>,
}

impl OperationCell {
    pub fn new(now_ms: u64) -> Self {
        Self {
            mode: RwLock::new(OperationMode::Normal),
            reason: RwLock::new(None),
            updated_at_ms: RwLock::new(now_ms),
        }
    }

    pub fn mode(&self) -> OperationMode {
        *self.mode.read()
    }

    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }

    pub fn updated_at_ms(&self) -> u64 {
        *self.updated_at_ms.read()
    }

    pub fn set(&self, mode: OperationMode, reason: Option<String>, now_ms: u64) {
        *self.mode.write() = mode;
        *self.reason.write() = reason;
        *self.updated_at_ms.write() = now_ms;
    }
}

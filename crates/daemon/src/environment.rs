// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Environment` value (SPEC_FULL.md §4.11): home dir, bind host/port,
//! auth mode, and the operation-mode cell, constructed once in `main` and
//! threaded explicitly into every constructor. Never read from a process
//! global (spec.md §9 "Ad-hoc global state" redesign flag).

use std::sync::Arc;

use undoable_storage::HomeLayout;

use crate::operation::OperationCell;
use crate::settings::DaemonSettings;

#[derive(Clone)]
pub struct Environment {
    pub home: Arc<HomeLayout>,
    pub settings: Arc<DaemonSettings>,
    pub operation: Arc<OperationCell>,
}

impl Environment {
    pub fn new(home: HomeLayout, settings: DaemonSettings, now_ms: u64) -> Self {
        Self { home: Arc::new(home), settings: Arc::new(settings), operation: Arc::new(OperationCell::new(now_ms)) }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.settings.host, self.settings.port)
    }
}

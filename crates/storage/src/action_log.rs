// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only Action Log persistence (spec §4.2, §6, §7).
//!
//! One JSON object per line, flushed on every write. Truncated trailing
//! lines (a crash mid-write) are discarded at load rather than rejected.

use std::fs;
use std::path::{Path, PathBuf};

use undoable_core::ActionLogEntry;

use crate::atomic::append_line;
use crate::error::StorageError;

pub struct ActionLogStore {
    path: PathBuf,
}

impl ActionLogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn append(&self, entry: &ActionLogEntry) -> Result<(), StorageError> {
        let line = serde_json::to_string(entry)?;
        append_line(&self.path, &line)
    }

    /// All entries, oldest first, as persisted. Truncated trailing lines are
    /// silently skipped (spec §7: "truncated lines are discarded at load").
    pub fn load_all(&self) -> Result<Vec<ActionLogEntry>, StorageError> {
        load_jsonl(&self.path)
    }

    /// Entries in reverse-chronological order, per the Action Log's iteration
    /// contract (spec §4.2).
    pub fn iter_reverse_chronological(&self) -> Result<Vec<ActionLogEntry>, StorageError> {
        let mut entries = self.load_all()?;
        entries.reverse();
        Ok(entries)
    }
}

pub(crate) fn load_jsonl<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<Vec<T>, StorageError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path)?;
    let mut out = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(line) {
            Ok(value) => out.push(value),
            Err(_) => {
                tracing::warn!("discarding truncated or corrupt line in {}", path.display());
                continue;
            }
        }
    }
    Ok(out)
}

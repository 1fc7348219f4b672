// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-temp-then-rename helpers, grounded in the teacher's
//! `daemon/src/storage/snapshot.rs` rename-into-place approach. Every JSON
//! file this crate owns is replaced wholesale, never patched.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Write `contents` to `path` atomically: write to a sibling `.tmp` file,
/// fsync it, then rename over the destination. The rename is atomic on the
/// same filesystem, so readers never observe a partially written file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = sibling_tmp_path(path);
    {
        let mut tmp = fs::File::create(&tmp_path)?;
        tmp.write_all(contents)?;
        tmp.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn sibling_tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Append a line to a file, creating it if absent, flushing after each write
/// per the Action Log's "flushed on each write" contract.
pub fn append_line(path: &Path, line: &str) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_atomic_replaces_existing_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        write_atomic(&path, b"{\"a\":1}").expect("first write");
        write_atomic(&path, b"{\"a\":2}").expect("second write");
        let read = fs::read_to_string(&path).expect("read back");
        assert_eq!(read, "{\"a\":2}");
        assert!(!sibling_tmp_path(&path).exists());
    }

    #[test]
    fn append_line_creates_and_grows_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("log.jsonl");
        append_line(&path, "{\"a\":1}").expect("first append");
        append_line(&path, "{\"a\":2}").expect("second append");
        let read = fs::read_to_string(&path).expect("read back");
        assert_eq!(read, "{\"a\":1}\n{\"a\":2}\n");
    }
}

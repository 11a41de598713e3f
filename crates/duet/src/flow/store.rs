// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed flow and execution stores.
//!
//! Layout under the data root:
//!
//! ```text
//! <root>/flows/[<folder>/]<flowId>.json
//! <root>/executions/<executionId>.json
//! ```
//!
//! Every save rewrites the whole record via a temp file and rename, so a
//! rejected validation never leaves a partial write behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::error::ErrorCode;

use super::validate::{validate, ValidationReport};
use super::{Execution, Flow};

pub struct FlowStore {
    root: PathBuf,
}

impl FlowStore {
    /// `root` is the data directory; flows live under `<root>/flows`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into().join("flows") }
    }

    /// Validate and persist a flow, stamping `updated_at` (and
    /// `created_at` on first save). Rejection writes nothing.
    pub fn save(&self, flow: &mut Flow) -> anyhow::Result<ValidationReport> {
        let report = validate(flow)?;

        let now = now_ms();
        if flow.created_at == 0 {
            flow.created_at = now;
        }
        flow.updated_at = now;
        flow.folder = flow.folder.as_deref().and_then(sanitize_folder);

        let dir = match flow.folder {
            Some(ref folder) => self.root.join(folder),
            None => self.root.clone(),
        };
        fs::create_dir_all(&dir).context("create flows directory")?;

        let path = dir.join(format!("{}.json", flow.id));
        write_atomic(&path, flow)?;
        Ok(report)
    }

    /// Load a flow by id, searching the root and its single-level folders.
    pub fn load(&self, id: &str) -> anyhow::Result<Flow> {
        let path = self
            .find(id)
            .ok_or_else(|| anyhow::Error::new(ErrorCode::NotFound).context(format!("flow {id}")))?;
        let text = fs::read_to_string(&path).context("read flow record")?;
        serde_json::from_str(&text).context("parse flow record")
    }

    pub fn delete(&self, id: &str) -> anyhow::Result<()> {
        match self.find(id) {
            Some(path) => fs::remove_file(path).context("delete flow record"),
            None => Ok(()),
        }
    }

    /// All flows, most recently updated first.
    pub fn list(&self) -> Vec<Flow> {
        let mut flows: Vec<Flow> = record_files(&self.root, 1)
            .into_iter()
            .filter_map(|path| {
                let text = fs::read_to_string(path).ok()?;
                serde_json::from_str(&text).ok()
            })
            .collect();
        flows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        flows
    }

    fn find(&self, id: &str) -> Option<PathBuf> {
        let name = format!("{id}.json");
        record_files(&self.root, 1)
            .into_iter()
            .find(|path| path.file_name().is_some_and(|f| f == name.as_str()))
    }
}

pub struct ExecutionStore {
    root: PathBuf,
}

impl ExecutionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into().join("executions") }
    }

    /// Write a terminal execution record, keyed by execution id.
    pub fn save(&self, execution: &Execution) -> anyhow::Result<()> {
        fs::create_dir_all(&self.root).context("create executions directory")?;
        let path = self.root.join(format!("{}.json", execution.id));
        write_atomic(&path, execution)
    }

    pub fn load(&self, id: &str) -> anyhow::Result<Execution> {
        let path = self.root.join(format!("{id}.json"));
        let text = fs::read_to_string(&path)
            .map_err(|_| anyhow::Error::new(ErrorCode::NotFound).context(format!("execution {id}")))?;
        serde_json::from_str(&text).context("parse execution record")
    }

    /// All records, most recently modified first.
    pub fn list(&self) -> Vec<Execution> {
        let mut entries: Vec<(std::time::SystemTime, Execution)> = record_files(&self.root, 0)
            .into_iter()
            .filter_map(|path| {
                let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
                let text = fs::read_to_string(&path).ok()?;
                let execution = serde_json::from_str(&text).ok()?;
                Some((modified, execution))
            })
            .collect();
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        entries.into_iter().map(|(_, e)| e).collect()
    }
}

/// Keep only permitted folder characters and collapse to a single level.
pub fn sanitize_folder(folder: &str) -> Option<String> {
    let cleaned: String = folder
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/'))
        .collect();
    cleaned.split('/').find(|segment| !segment.is_empty()).map(str::to_owned)
}

/// `.json` files directly under `dir`, plus `depth` levels of subfolders.
fn record_files(dir: &Path, depth: u8) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return files;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if depth > 0 {
                files.extend(record_files(&path, depth - 1));
            }
        } else if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files
}

/// Write the full record to a temp file, then rename into place.
fn write_atomic<T: serde::Serialize>(path: &Path, record: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(record).context("serialize record")?;
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp).context("create temp record")?;
        file.write_all(json.as_bytes()).context("write record")?;
        file.sync_all().context("sync record")?;
    }
    fs::rename(&tmp, path).context("publish record")?;
    Ok(())
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment probe: one-shot context snapshot for the classifier.
//!
//! A snapshot is immutable after construction. Gathering runs the version
//! queries and git inspection concurrently, each with its own timeout, so
//! a wedged binary cannot stall the whole probe.

pub mod git;
pub mod history;
pub mod project;
pub mod toolchain;

pub use git::GitInfo;
pub use history::{CommandRecord, ErrorRecord, History, StateInfo};
pub use project::{ProjectInfo, ProjectKind};

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Config files surfaced in the snapshot, in recognition order.
const CONFIG_FILES: &[&str] = &[
    "package.json",
    "tsconfig.json",
    ".env",
    "Cargo.toml",
    "pyproject.toml",
    "requirements.txt",
    "go.mod",
    "Dockerfile",
    "docker-compose.yml",
    "Makefile",
    ".gitignore",
];

/// Per-file content cap in the snapshot.
const CONFIG_FILE_CAP: usize = 2000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentInfo {
    pub os: String,
    pub shell: String,
    pub cwd: String,
    pub user: String,
    pub hostname: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub name: String,
    pub content: String,
    pub truncated: bool,
}

/// Immutable environment snapshot consumed by the classifier and the
/// strategy selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSnapshot {
    pub environment: EnvironmentInfo,
    pub toolchain: BTreeMap<String, String>,
    pub project: ProjectInfo,
    pub state: StateInfo,
    pub git: Option<GitInfo>,
    pub files: Vec<ConfigFile>,
    /// Fraction of snapshot sections that carry data, in [0, 1].
    pub completeness: f64,
    pub gather_ms: u64,
}

/// Snapshot producer bound to a history tracker.
#[derive(Debug, Clone)]
pub struct Probe {
    history: Arc<History>,
}

impl Probe {
    pub fn new(history: Arc<History>) -> Self {
        Self { history }
    }

    pub fn history(&self) -> &Arc<History> {
        &self.history
    }

    /// Gather a fresh snapshot for the given working directory and shell.
    pub async fn gather(&self, cwd: &Path, shell: &str) -> ContextSnapshot {
        let started = Instant::now();

        let (toolchain, git) = tokio::join!(toolchain::versions(), git::inspect(cwd));

        let environment = EnvironmentInfo {
            os: std::env::consts::OS.to_owned(),
            shell: shell.to_owned(),
            cwd: cwd.to_string_lossy().into_owned(),
            user: std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .unwrap_or_default(),
            hostname: hostname(),
        };
        let project = project::detect(cwd);
        let state = self.history.recent();
        let files = read_config_files(cwd);

        let completeness = completeness_score(&toolchain, &project, &state, git.as_ref(), &files);

        ContextSnapshot {
            environment,
            toolchain,
            project,
            state,
            git,
            files,
            completeness,
            gather_ms: started.elapsed().as_millis() as u64,
        }
    }
}

fn hostname() -> String {
    nix::unistd::gethostname()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read_config_files(cwd: &Path) -> Vec<ConfigFile> {
    let mut files = Vec::new();
    for name in CONFIG_FILES {
        let Ok(content) = std::fs::read_to_string(cwd.join(name)) else {
            continue;
        };
        let truncated = content.len() > CONFIG_FILE_CAP;
        let content = if truncated {
            let mut end = CONFIG_FILE_CAP;
            while !content.is_char_boundary(end) {
                end -= 1;
            }
            content[..end].to_owned()
        } else {
            content
        };
        files.push(ConfigFile { name: (*name).to_owned(), content, truncated });
    }
    files
}

/// One point per populated section; the environment always counts.
fn completeness_score(
    toolchain: &BTreeMap<String, String>,
    project: &ProjectInfo,
    state: &StateInfo,
    git: Option<&GitInfo>,
    files: &[ConfigFile],
) -> f64 {
    let mut have = 1.0; // environment
    if !toolchain.is_empty() {
        have += 1.0;
    }
    if project.kind != ProjectKind::None {
        have += 1.0;
    }
    if !state.recent_commands.is_empty() || !state.recent_errors.is_empty() {
        have += 1.0;
    }
    if git.is_some() {
        have += 1.0;
    }
    if !files.is_empty() {
        have += 1.0;
    }
    have / 6.0
}

#[cfg(test)]
#[path = "probe_tests.rs"]
mod tests;

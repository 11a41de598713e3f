// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const GIT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitInfo {
    pub branch: Option<String>,
    pub has_changes: bool,
    pub staged: u32,
    pub unstaged: u32,
    pub untracked: u32,
    pub has_remote: bool,
}

/// Inspect the repository containing `cwd`. `None` when not a work tree
/// (or `git` itself is unavailable).
pub async fn inspect(cwd: &Path) -> Option<GitInfo> {
    let inside = git(cwd, &["rev-parse", "--is-inside-work-tree"]).await?;
    if inside.trim() != "true" {
        return None;
    }

    let branch = git(cwd, &["rev-parse", "--abbrev-ref", "HEAD"])
        .await
        .map(|b| b.trim().to_owned())
        .filter(|b| !b.is_empty());

    let status = git(cwd, &["status", "--porcelain"]).await.unwrap_or_default();
    let (staged, unstaged, untracked) = count_porcelain(&status);

    let has_remote = git(cwd, &["remote"])
        .await
        .map(|r| !r.trim().is_empty())
        .unwrap_or(false);

    Some(GitInfo {
        branch,
        has_changes: staged + unstaged + untracked > 0,
        staged,
        unstaged,
        untracked,
        has_remote,
    })
}

/// Count (staged, unstaged, untracked) entries in porcelain status output.
fn count_porcelain(status: &str) -> (u32, u32, u32) {
    let mut staged = 0;
    let mut unstaged = 0;
    let mut untracked = 0;
    for line in status.lines() {
        let mut chars = line.chars();
        let index = chars.next().unwrap_or(' ');
        let work = chars.next().unwrap_or(' ');
        if index == '?' && work == '?' {
            untracked += 1;
            continue;
        }
        if index != ' ' {
            staged += 1;
        }
        if work != ' ' {
            unstaged += 1;
        }
    }
    (staged, unstaged, untracked)
}

async fn git(cwd: &Path, args: &[&str]) -> Option<String> {
    let output = tokio::time::timeout(
        GIT_TIMEOUT,
        tokio::process::Command::new("git")
            .args(args)
            .current_dir(cwd)
            .stdin(std::process::Stdio::null())
            .output(),
    )
    .await
    .ok()?
    .ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;

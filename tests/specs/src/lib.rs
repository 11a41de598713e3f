// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Harness for end-to-end scenarios: real PTY sessions driving a real
//! shell, and session-backed workflow executions.

use std::sync::Arc;
use std::time::Duration;

use duet::probe::History;
use duet::session::{Session, SessionOptions};

/// `/bin/bash` when present; scenarios that need bash prompt hooks call
/// this and skip quietly on hosts without it.
pub fn bash_path() -> Option<String> {
    for candidate in ["/bin/bash", "/usr/bin/bash"] {
        if std::path::Path::new(candidate).is_file() {
            return Some(candidate.to_owned());
        }
    }
    None
}

/// Open a session on the given shell with test-friendly sizes.
pub async fn open_session(shell: &str) -> anyhow::Result<Arc<Session>> {
    let opts = SessionOptions {
        shell: Some(shell.to_owned()),
        cwd: None,
        cols: 100,
        rows: 30,
        ring_cap: 65536,
        history: Some(Arc::new(History::new())),
    };
    Ok(Arc::new(Session::open(opts).await?))
}

/// Poll until `predicate` passes or `timeout` elapses.
pub async fn wait_for<F>(timeout: Duration, mut predicate: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}

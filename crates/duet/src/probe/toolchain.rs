// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;
use std::time::Duration;

use regex::Regex;

/// Fixed set of version queries, run in parallel. Binaries that are
/// missing or hang past the per-query timeout are silently omitted.
const QUERIES: &[(&str, &[&str])] = &[
    ("node", &["--version"]),
    ("npm", &["--version"]),
    ("python", &["--version"]),
    ("python3", &["--version"]),
    ("pip", &["--version"]),
    ("docker", &["--version"]),
    ("git", &["--version"]),
    ("go", &["version"]),
    ("rustc", &["--version"]),
    ("cargo", &["--version"]),
    ("java", &["-version"]),
];

const QUERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Query every known binary and collect `name → version`.
pub async fn versions() -> BTreeMap<String, String> {
    let probes = QUERIES.iter().map(|(bin, args)| async move {
        query(bin, args).await.map(|v| ((*bin).to_owned(), v))
    });
    futures_util::future::join_all(probes).await.into_iter().flatten().collect()
}

async fn query(bin: &str, args: &[&str]) -> Option<String> {
    let output = tokio::time::timeout(
        QUERY_TIMEOUT,
        tokio::process::Command::new(bin)
            .args(args)
            .stdin(std::process::Stdio::null())
            .output(),
    )
    .await
    .ok()?
    .ok()?;

    // java and python2 print the version to stderr.
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push(' ');
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    parse_version(&text)
}

/// First dotted version token of the given text (e.g. `18.19.0` from
/// `v18.19.0`).
pub fn parse_version(text: &str) -> Option<String> {
    let re = Regex::new(r"(\d+(?:\.\d+)+)").ok()?;
    re.captures(text).map(|c| c[1].to_owned())
}

#[cfg(test)]
#[path = "toolchain_tests.rs"]
mod tests;

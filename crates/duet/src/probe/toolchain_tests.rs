// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    node_style = { "v18.19.0", Some("18.19.0") },
    plain = { "2.39.2", Some("2.39.2") },
    git_style = { "git version 2.39.2", Some("2.39.2") },
    go_style = { "go version go1.22.1 linux/amd64", Some("1.22.1") },
    java_stderr = { "openjdk version \"17.0.9\" 2023-10-17", Some("17.0.9") },
    rustc_style = { "rustc 1.79.0 (129f3b996 2024-06-10)", Some("1.79.0") },
    two_part = { "Python 3.12", Some("3.12") },
    none = { "command not found", None },
    lone_integer = { "build 42", None },
)]
fn parses_first_dotted_token(text: &str, expected: Option<&str>) {
    assert_eq!(parse_version(text).as_deref(), expected);
}

#[tokio::test]
async fn missing_binaries_are_omitted() {
    // `versions` runs the real table; whatever the host has installed, a
    // binary that does not exist must not appear.
    let map = versions().await;
    assert!(!map.contains_key("definitely-not-a-real-binary"));
    for (name, version) in &map {
        assert!(QUERIES.iter().any(|(bin, _)| bin == name));
        assert!(version.contains('.'), "{name}: {version}");
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::flow::{NodePayload, NodeStatus};

fn results_with_shell(id: &str, stdout: &str, exit_code: i32) -> BTreeMap<String, Value> {
    let mut results = BTreeMap::new();
    results.insert(
        id.to_owned(),
        NodeResult {
            status: NodeStatus::Success,
            started_at: Some(1),
            duration_ms: Some(1),
            payload: Some(NodePayload::Shell {
                stdout: stdout.to_owned(),
                stderr: String::new(),
                exit_code: Some(exit_code),
                cwd: "/work".to_owned(),
            }),
            error: None,
        },
    );
    results_view(&results)
}

#[test]
fn resolves_payload_fields() {
    let view = results_with_shell("n17", "hello", 0);
    assert_eq!(interpolate_str("out: {{n17.stdout}}", &view), "out: hello");
    assert_eq!(interpolate_str("{{n17.exitCode}}", &view), "0");
    assert_eq!(interpolate_str("{{n17.cwd}}", &view), "/work");
    assert_eq!(interpolate_str("{{n17.status}}", &view), "success");
}

#[test]
fn missing_paths_expand_to_empty() {
    let view = results_with_shell("a", "x", 0);
    assert_eq!(interpolate_str("[{{ghost.stdout}}]", &view), "[]");
    assert_eq!(interpolate_str("[{{a.nope}}]", &view), "[]");
    assert_eq!(interpolate_str("[{{a.stdout.deeper}}]", &view), "[]");
}

#[test]
fn whitespace_inside_braces_is_tolerated() {
    let view = results_with_shell("a", "x", 0);
    assert_eq!(interpolate_str("{{ a.stdout }}", &view), "x");
}

#[test]
fn multiple_placeholders_in_one_string() {
    let view = results_with_shell("a", "x", 7);
    assert_eq!(interpolate_str("{{a.stdout}}-{{a.exitCode}}", &view), "x-7");
}

#[test]
fn objects_render_as_json() {
    let view = results_with_shell("a", "x", 0);
    let rendered = interpolate_str("{{a}}", &view);
    let parsed: Value = match serde_json::from_str(&rendered) {
        Ok(v) => v,
        Err(e) => unreachable!("object interpolation must emit JSON: {e}"),
    };
    assert_eq!(parsed["stdout"], "x");
    assert_eq!(parsed["status"], "success");
}

#[test]
fn node_data_is_walked_recursively() {
    use crate::test_support::flows::shell_node;
    let view = results_with_shell("a", "ls -la", 0);
    let node = shell_node("b", "echo {{a.stdout}}");
    let data = interpolate_data(&node.data, &view);
    match data {
        NodeData::Shell(shell) => assert_eq!(shell.command, "echo ls -la"),
        other => unreachable!("wrong variant: {other:?}"),
    }
}

#[test]
fn unmatched_braces_pass_through() {
    let view = results_with_shell("a", "x", 0);
    assert_eq!(interpolate_str("{{a.stdout} {notbraces}", &view), "{{a.stdout} {notbraces}");
}

proptest::proptest! {
    // Totality: interpolation never panics and never errors, whatever the
    // input text contains.
    #[test]
    fn interpolation_is_total(input in ".{0,200}") {
        let view = results_with_shell("a", "x", 0);
        let _ = interpolate_str(&input, &view);
    }
}

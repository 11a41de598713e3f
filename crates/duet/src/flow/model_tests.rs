// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn node_json_shape_is_tagged() -> anyhow::Result<()> {
    let node = crate::test_support::flows::shell_node("n1", "echo hi");
    let json = serde_json::to_value(&node)?;
    assert_eq!(json["id"], "n1");
    assert_eq!(json["type"], "shell");
    assert_eq!(json["data"]["command"], "echo hi");
    assert_eq!(json["data"]["timeoutMs"], 10_000);
    Ok(())
}

#[test]
fn shell_timeout_defaults_on_deserialize() -> anyhow::Result<()> {
    let node: Node = serde_json::from_value(serde_json::json!({
        "id": "n1",
        "type": "shell",
        "data": { "command": "true" },
        "position": { "x": 0.0, "y": 0.0 },
    }))?;
    match node.data {
        NodeData::Shell(data) => {
            assert_eq!(data.timeout_ms, DEFAULT_SHELL_TIMEOUT_MS);
            assert!(!data.continue_on_error);
        }
        other => anyhow::bail!("wrong variant: {other:?}"),
    }
    Ok(())
}

#[test]
fn edge_handle_defaults_and_round_trips() -> anyhow::Result<()> {
    let edge: Edge = serde_json::from_value(serde_json::json!({
        "id": "e1", "source": "a", "target": "b",
    }))?;
    assert_eq!(edge.source_handle, Handle::Default);

    let json = serde_json::to_value(Edge { source_handle: Handle::True, ..edge })?;
    assert_eq!(json["sourceHandle"], "true");
    Ok(())
}

#[test]
fn flow_round_trips_through_json() -> anyhow::Result<()> {
    use crate::test_support::flows;
    let flow = flows::flow(
        "roundtrip",
        vec![
            flows::shell_node("a", "true"),
            flows::branch_node("b", "{{a.exitCode}} === 0"),
            flows::ai_node("c", "summarize {{a.stdout}}"),
            flows::file_node("d", FileOp::Write, "~/out.txt", Some("x")),
        ],
        vec![
            flows::edge("a", "b"),
            flows::edge_via("b", "c", Handle::True),
            flows::edge_via("b", "d", Handle::False),
        ],
    );

    let json = serde_json::to_string(&flow)?;
    let back: Flow = serde_json::from_str(&json)?;
    assert_eq!(back, flow);
    Ok(())
}

#[test]
fn node_payloads_round_trip() -> anyhow::Result<()> {
    let payloads = vec![
        NodePayload::Shell {
            stdout: "ok".into(),
            stderr: String::new(),
            exit_code: Some(0),
            cwd: "/tmp".into(),
        },
        NodePayload::Ai { response: "hi".into(), provider: "p".into(), model: "m".into() },
        NodePayload::Branch { condition_result: true, evaluated: "1 === 1".into() },
        NodePayload::File {
            file_path: "/tmp/x".into(),
            content: None,
            bytes_written: Some(5),
            exists: None,
        },
    ];
    for payload in payloads {
        let json = serde_json::to_string(&payload)?;
        let back: NodePayload = serde_json::from_str(&json)?;
        assert_eq!(back, payload);
    }
    Ok(())
}

#[test]
fn execution_record_round_trips() -> anyhow::Result<()> {
    let mut results = BTreeMap::new();
    results.insert(
        "a".to_owned(),
        NodeResult {
            status: NodeStatus::Success,
            started_at: Some(1),
            duration_ms: Some(2),
            payload: Some(NodePayload::Branch { condition_result: false, evaluated: "x".into() }),
            error: None,
        },
    );
    let execution = Execution {
        id: "e1".into(),
        flow_id: "f1".into(),
        session_id: None,
        started_at: 10,
        ended_at: Some(20),
        status: ExecStatus::Completed,
        results,
        error: None,
    };
    let json = serde_json::to_string(&execution)?;
    let back: Execution = serde_json::from_str(&json)?;
    assert_eq!(back, execution);
    Ok(())
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::Arc;

use crate::flow::condition::ConditionEvaluator;
use crate::flow::{BranchData, FileData, FileOp, NodePayload};
use crate::test_support::ScriptedChat;

fn deps_in(dir: &Path) -> anyhow::Result<NodeDeps> {
    Ok(NodeDeps {
        shell: Arc::new(ProcessShell::new(Some(dir.to_path_buf()))),
        llm: None,
        evaluator: ConditionEvaluator::compile()?,
        roots: PathRoots { home: None, cwd: dir.to_path_buf() },
    })
}

fn file_data(operation: FileOp, path: &str, content: Option<&str>) -> FileData {
    FileData {
        operation,
        file_path: path.to_owned(),
        content: content.map(str::to_owned),
        continue_on_error: false,
    }
}

#[tokio::test]
async fn process_shell_reports_exit_code_and_output() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let shell = ProcessShell::new(Some(dir.path().to_path_buf()));
    let outcome = shell.run("echo out; echo err >&2; exit 3", Duration::from_secs(10), None).await?;
    assert_eq!(outcome.exit_code, Some(3));
    assert!(outcome.output.contains("out"));
    assert!(outcome.output.contains("err"));
    Ok(())
}

#[tokio::test]
async fn process_shell_times_out() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let shell = ProcessShell::new(Some(dir.path().to_path_buf()));
    let err = match shell.run("sleep 5", Duration::from_millis(100), None).await {
        Err(e) => e,
        Ok(_) => anyhow::bail!("expected timeout"),
    };
    assert_eq!(err.downcast_ref::<ErrorCode>(), Some(&ErrorCode::TimedOut));
    Ok(())
}

#[tokio::test]
async fn shell_node_failure_carries_payload() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let deps = deps_in(dir.path())?;
    let data = NodeData::Shell(crate::flow::ShellData {
        command: "exit 9".to_owned(),
        timeout_ms: 10_000,
        cwd: None,
        continue_on_error: false,
    });
    match execute_node(&data, &deps).await {
        NodeOutcome::Failure { reason, payload } => {
            assert!(reason.contains('9'));
            match payload {
                Some(NodePayload::Shell { exit_code, .. }) => assert_eq!(exit_code, Some(9)),
                other => anyhow::bail!("wrong payload: {other:?}"),
            }
        }
        NodeOutcome::Success(_) => anyhow::bail!("exit 9 must fail the node"),
    }
    Ok(())
}

#[tokio::test]
async fn ai_node_without_capability_fails_deterministically() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let deps = deps_in(dir.path())?;
    let data = NodeData::Ai(crate::flow::AiData {
        prompt: "hello".to_owned(),
        system_prompt: None,
        provider: None,
        model: None,
        continue_on_error: false,
    });
    match execute_node(&data, &deps).await {
        NodeOutcome::Failure { reason, .. } => assert_eq!(reason, "llm-unavailable"),
        NodeOutcome::Success(_) => anyhow::bail!("must fail without an LLM"),
    }
    Ok(())
}

#[tokio::test]
async fn ai_node_records_provider_and_model() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut deps = deps_in(dir.path())?;
    deps.llm = Some(Arc::new(ScriptedChat::new(["a reply"])));
    let data = NodeData::Ai(crate::flow::AiData {
        prompt: "hello".to_owned(),
        system_prompt: None,
        provider: None,
        model: None,
        continue_on_error: false,
    });
    match execute_node(&data, &deps).await {
        NodeOutcome::Success(NodePayload::Ai { response, provider, model }) => {
            assert_eq!(response, "a reply");
            assert_eq!(provider, "scripted");
            assert_eq!(model, "scripted-1");
        }
        other => anyhow::bail!("unexpected outcome: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn branch_evaluation_is_total_even_on_garbage() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let deps = deps_in(dir.path())?;
    let data = NodeData::Branch(BranchData { condition: "".to_owned() });
    match execute_node(&data, &deps).await {
        NodeOutcome::Success(NodePayload::Branch { condition_result, .. }) => {
            assert!(!condition_result);
        }
        other => anyhow::bail!("branch must not fail: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn file_write_then_read_round_trips() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let deps = deps_in(dir.path())?;

    let write = NodeData::File(file_data(FileOp::Write, "sub/out.txt", Some("payload")));
    match execute_node(&write, &deps).await {
        NodeOutcome::Success(NodePayload::File { bytes_written, .. }) => {
            assert_eq!(bytes_written, Some(7));
        }
        other => anyhow::bail!("write failed: {other:?}"),
    }

    let read = NodeData::File(file_data(FileOp::Read, "sub/out.txt", None));
    match execute_node(&read, &deps).await {
        NodeOutcome::Success(NodePayload::File { content, .. }) => {
            assert_eq!(content.as_deref(), Some("payload"));
        }
        other => anyhow::bail!("read failed: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn file_append_accumulates() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let deps = deps_in(dir.path())?;
    for _ in 0..2 {
        let append = NodeData::File(file_data(FileOp::Append, "log.txt", Some("x")));
        match execute_node(&append, &deps).await {
            NodeOutcome::Success(_) => {}
            other => anyhow::bail!("append failed: {other:?}"),
        }
    }
    assert_eq!(std::fs::read_to_string(dir.path().join("log.txt"))?, "xx");
    Ok(())
}

#[tokio::test]
async fn read_missing_file_is_not_found() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let deps = deps_in(dir.path())?;
    let read = NodeData::File(file_data(FileOp::Read, "ghost.txt", None));
    match execute_node(&read, &deps).await {
        NodeOutcome::Failure { reason, .. } => assert_eq!(reason, "not-found"),
        NodeOutcome::Success(_) => anyhow::bail!("missing file must fail read"),
    }
    Ok(())
}

#[tokio::test]
async fn exists_and_delete_are_total() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let deps = deps_in(dir.path())?;

    let exists = NodeData::File(file_data(FileOp::Exists, "ghost.txt", None));
    match execute_node(&exists, &deps).await {
        NodeOutcome::Success(NodePayload::File { exists, .. }) => assert_eq!(exists, Some(false)),
        other => anyhow::bail!("exists must not fail: {other:?}"),
    }

    // Deleting an absent file is a no-op.
    let delete = NodeData::File(file_data(FileOp::Delete, "ghost.txt", None));
    match execute_node(&delete, &deps).await {
        NodeOutcome::Success(_) => {}
        other => anyhow::bail!("delete of absent file must not fail: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn path_escape_is_rejected_before_any_io() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let deps = deps_in(dir.path())?;
    let write = NodeData::File(file_data(FileOp::Write, "../../etc/duet-escape", Some("x")));
    match execute_node(&write, &deps).await {
        NodeOutcome::Failure { reason, .. } => assert_eq!(reason, "path-escape"),
        NodeOutcome::Success(_) => anyhow::bail!("escape must be rejected"),
    }
    assert!(!Path::new("/etc/duet-escape").exists());
    Ok(())
}

#[test]
fn tilde_expansion_confines_to_home() {
    let roots = PathRoots {
        home: Some(PathBuf::from("/home/dev")),
        cwd: PathBuf::from("/work"),
    };
    assert_eq!(resolve_path("~/notes.txt", &roots), Ok(PathBuf::from("/home/dev/notes.txt")));
    assert_eq!(resolve_path("~", &roots), Ok(PathBuf::from("/home/dev")));
    assert_eq!(resolve_path("rel/file", &roots), Ok(PathBuf::from("/work/rel/file")));
    assert_eq!(resolve_path("/work/../etc/passwd", &roots), Err("path-escape".to_owned()));
    assert_eq!(resolve_path("/home/dev/../other/x", &roots), Err("path-escape".to_owned()));
}

#[test]
fn tilde_without_home_is_an_escape() {
    let roots = PathRoots { home: None, cwd: PathBuf::from("/work") };
    assert_eq!(resolve_path("~/x", &roots), Err("path-escape".to_owned()));
}

#[test]
fn dot_segments_are_normalized_lexically() {
    let roots = PathRoots { home: None, cwd: PathBuf::from("/work") };
    assert_eq!(resolve_path("a/./b/../c", &roots), Ok(PathBuf::from("/work/a/c")));
}

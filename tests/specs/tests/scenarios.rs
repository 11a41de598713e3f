// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios over real PTY sessions and real flows.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use duet::config::Config;
use duet::event::SessionEvent;
use duet::flow::condition::ConditionEvaluator;
use duet::flow::exec::{NodeDeps, PathRoots, ProcessShell};
use duet::flow::{
    Engine, ExecStatus, ExecutionStore, FlowStore, Handle, NodePayload, NodeStatus,
};
use duet::probe::{History, Probe};
use duet::session::AgentWrite;
use duet::test_support::flows::{branch_node, edge, edge_via, flow, shell_node};

use duet_specs::{bash_path, open_session, wait_for};

fn agent_write(typing_delay_ms: u64) -> AgentWrite {
    AgentWrite {
        typing_delay: Duration::from_millis(typing_delay_ms),
        execute: true,
        wait_for_completion: true,
        timeout: Duration::from_secs(10),
    }
}

// -- Scenario: human preempts agent -------------------------------------------

#[tokio::test]
async fn human_preempts_agent_mid_typing() -> anyhow::Result<()> {
    let session = open_session("/bin/sh").await?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let agent = Arc::clone(&session);
    let turn =
        tokio::spawn(async move { agent.write_agent("sleep 5", &agent_write(20)).await });
    tokio::time::sleep(Duration::from_millis(40)).await;

    session.write_user(b"\x03").await?;

    let report = turn.await??;
    assert!(report.interrupted);
    assert!(!session.agent_active());
    // The shell is still usable for the human afterwards.
    let report = session.write_agent("echo recovered", &agent_write(1)).await?;
    assert!(report.output.contains("recovered"));

    session.shutdown();
    session.wait_closed().await;
    Ok(())
}

// -- Scenario: cwd tracking via OSC-7 -----------------------------------------

#[tokio::test]
async fn bash_cd_updates_cwd_exactly_once() -> anyhow::Result<()> {
    let Some(bash) = bash_path() else {
        eprintln!("bash not present, skipping");
        return Ok(());
    };
    let session = open_session(&bash).await?;
    let mut events = session.subscribe();

    let target = tempfile::tempdir()?;
    let target_path = target.path().canonicalize()?;
    let command = format!("cd {}", target_path.display());
    let report = session.write_agent(&command, &agent_write(1)).await?;
    assert!(!report.timed_out, "prompt never returned: {:?}", report.output);

    let session_for_poll = Arc::clone(&session);
    let expected = target_path.to_string_lossy().into_owned();
    let saw_cwd = {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            if session_for_poll.cwd().await == expected {
                break true;
            }
            if tokio::time::Instant::now() >= deadline {
                break false;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    };
    assert!(saw_cwd, "cwd is {:?}", session.cwd().await);

    // The one directory change produced exactly one cwd-changed event.
    let mut changes = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::CwdChanged { cwd } = event {
            changes.push(cwd);
        }
    }
    assert_eq!(changes.iter().filter(|c| **c == expected).count(), 1, "changes: {changes:?}");
    assert_eq!(changes.last(), Some(&expected));

    session.shutdown();
    session.wait_closed().await;
    Ok(())
}

#[tokio::test]
async fn cwd_report_survives_unknown_shells() -> anyhow::Result<()> {
    // /bin/sh may be dash: the hook still installs (bash family) or not;
    // either way cwd() answers with the last-known value.
    let session = open_session("/bin/sh").await?;
    let before = session.cwd().await;
    assert!(!before.is_empty());
    session.shutdown();
    session.wait_closed().await;
    Ok(())
}

// -- Scenario: branch routing through a live session --------------------------

#[tokio::test]
async fn branch_routing_in_a_session_backed_flow() -> anyhow::Result<()> {
    let session = open_session("/bin/sh").await?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let data_dir = tempfile::tempdir()?;
    let mut config = Config::try_parse_from(["duet"])?;
    config.data_dir = Some(data_dir.path().to_path_buf());
    let (engine, _flows) = duet::run::session_engine(&config, Arc::clone(&session), None)?;

    let routed = flow(
        "routed",
        vec![
            shell_node("A", "true"),
            branch_node("B", "{{A.exitCode}} === 0"),
            shell_node("C", "echo ok"),
            shell_node("D", "echo bad"),
        ],
        vec![
            edge("A", "B"),
            edge_via("B", "C", Handle::True),
            edge_via("B", "D", Handle::False),
        ],
    );
    let execution = engine.run(&routed, None).await;

    assert_eq!(execution.status, ExecStatus::Completed);
    assert_eq!(execution.results["C"].status, NodeStatus::Success);
    assert_eq!(execution.results["D"].status, NodeStatus::Skipped);
    match &execution.results["B"].payload {
        Some(NodePayload::Branch { condition_result, .. }) => assert!(*condition_result),
        other => anyhow::bail!("missing branch payload: {other:?}"),
    }
    // Nothing routed to the false side ever reached the terminal.
    assert!(!session.output_tail(100).await.contains("bad"));

    session.shutdown();
    session.wait_closed().await;
    Ok(())
}

// -- Scenario: fan-out/fan-in with one failure, persisted ---------------------

#[tokio::test]
async fn fan_in_failure_is_persisted() -> anyhow::Result<()> {
    let data_dir = tempfile::tempdir()?;
    let engine = Engine::new(NodeDeps {
        shell: Arc::new(ProcessShell::new(Some(data_dir.path().to_path_buf()))),
        llm: None,
        evaluator: ConditionEvaluator::compile()?,
        roots: PathRoots { home: None, cwd: data_dir.path().to_path_buf() },
    })
    .with_store(ExecutionStore::new(data_dir.path()));

    let fan = flow(
        "fan",
        vec![
            shell_node("A", "true"),
            shell_node("B", "exit 1"),
            shell_node("C", "true"),
            shell_node("D", "echo joined"),
        ],
        vec![edge("A", "B"), edge("A", "C"), edge("B", "D"), edge("C", "D")],
    );
    let execution = engine.run(&fan, None).await;

    assert_eq!(execution.status, ExecStatus::Failed);
    assert_eq!(execution.results["D"].status, NodeStatus::Skipped);

    // The terminal record landed in the append-only store, equal to the
    // in-memory record.
    let store = ExecutionStore::new(data_dir.path());
    assert_eq!(store.load(&execution.id)?, execution);
    let listed = store.list();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, execution.id);
    Ok(())
}

// -- Scenario: cycle rejection leaves the store unchanged ----------------------

#[tokio::test]
async fn cycle_rejection_preserves_the_store() -> anyhow::Result<()> {
    let data_dir = tempfile::tempdir()?;
    let store = FlowStore::new(data_dir.path());

    let mut good = flow("good", vec![shell_node("A", "true")], vec![]);
    store.save(&mut good)?;

    let mut cyclic = flow(
        "cyclic",
        vec![shell_node("A", "true"), shell_node("B", "true"), shell_node("C", "true")],
        vec![edge("A", "B"), edge("B", "C"), edge("C", "A")],
    );
    assert!(store.save(&mut cyclic).is_err());

    let listed = store.list();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, good.id);
    Ok(())
}

// -- Scenario: classifier determinism over a real snapshot --------------------

#[tokio::test]
async fn classifier_is_deterministic_over_a_probed_snapshot() -> anyhow::Result<()> {
    let project = tempfile::tempdir()?;
    std::fs::write(project.path().join("package.json"), "{}")?;

    let probe = Probe::new(Arc::new(History::new()));
    let snapshot = probe.gather(project.path(), "/bin/sh").await;

    let classifier = duet::intent::Classifier::new()?;
    let first = classifier.classify("npm ERR! ENOENT node_modules", &snapshot);
    assert_eq!(first.category, duet::intent::Category::Installation);
    assert!(first.confidence >= 0.6);
    for _ in 0..10 {
        let again = classifier.classify("npm ERR! ENOENT node_modules", &snapshot);
        assert_eq!(again, first);
    }
    Ok(())
}

// -- Round-trip: flow records are byte-stable apart from updatedAt ------------

#[tokio::test]
async fn flow_record_round_trip_is_byte_stable() -> anyhow::Result<()> {
    let data_dir = tempfile::tempdir()?;
    let store = FlowStore::new(data_dir.path());

    let mut original = flow(
        "stable",
        vec![shell_node("A", "true"), branch_node("B", "{{A.exitCode}} === 0")],
        vec![edge("A", "B")],
    );
    store.save(&mut original)?;

    let first = serde_json::to_vec(&store.load(&original.id)?)?;
    tokio::time::sleep(Duration::from_millis(5)).await;
    store.save(&mut original)?;
    let second_flow = store.load(&original.id)?;

    // Only updatedAt may differ between saves.
    let mut second_adjusted = second_flow.clone();
    second_adjusted.updated_at = original.created_at;
    let mut first_flow: duet::flow::Flow = serde_json::from_slice(&first)?;
    first_flow.updated_at = original.created_at;
    assert_eq!(serde_json::to_vec(&first_flow)?, serde_json::to_vec(&second_adjusted)?);
    Ok(())
}

#[tokio::test]
async fn wait_for_helper_times_out() {
    assert!(!wait_for(Duration::from_millis(60), || false).await);
    assert!(wait_for(Duration::from_millis(60), || true).await);
}

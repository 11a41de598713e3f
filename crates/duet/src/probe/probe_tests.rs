// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn snapshot_of_empty_directory() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let probe = Probe::new(Arc::new(History::new()));
    let snapshot = probe.gather(dir.path(), "/bin/bash").await;

    assert_eq!(snapshot.environment.shell, "/bin/bash");
    assert_eq!(snapshot.environment.cwd, dir.path().to_string_lossy());
    assert_eq!(snapshot.project.kind, ProjectKind::None);
    assert!(snapshot.git.is_none());
    assert!(snapshot.files.is_empty());
    assert!(snapshot.completeness > 0.0 && snapshot.completeness <= 1.0);
    Ok(())
}

#[tokio::test]
async fn snapshot_sees_project_and_files() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("package.json"), "{}")?;
    std::fs::write(dir.path().join("Makefile"), "all:\n")?;

    let probe = Probe::new(Arc::new(History::new()));
    let snapshot = probe.gather(dir.path(), "/bin/sh").await;

    assert_eq!(snapshot.project.kind, ProjectKind::Node);
    let names: Vec<&str> = snapshot.files.iter().map(|f| f.name.as_str()).collect();
    assert!(names.contains(&"package.json"));
    assert!(names.contains(&"Makefile"));
    Ok(())
}

#[tokio::test]
async fn oversized_config_files_are_truncated() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join(".env"), "x".repeat(10_000))?;

    let probe = Probe::new(Arc::new(History::new()));
    let snapshot = probe.gather(dir.path(), "/bin/sh").await;

    let env_file = snapshot
        .files
        .iter()
        .find(|f| f.name == ".env")
        .ok_or_else(|| anyhow::anyhow!(".env missing from snapshot"))?;
    assert!(env_file.truncated);
    assert_eq!(env_file.content.len(), 2000);
    Ok(())
}

#[tokio::test]
async fn history_flows_into_state_section() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let history = Arc::new(History::new());
    history.record_command("npm install", Some(1));
    history.record_error("npm ERR! code ENOENT");

    let probe = Probe::new(Arc::clone(&history));
    let snapshot = probe.gather(dir.path(), "/bin/sh").await;

    assert_eq!(snapshot.state.recent_commands.len(), 1);
    assert_eq!(snapshot.state.recent_errors.len(), 1);
    Ok(())
}

#[tokio::test]
async fn snapshot_round_trips_through_json() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let probe = Probe::new(Arc::new(History::new()));
    let snapshot = probe.gather(dir.path(), "/bin/sh").await;

    let json = serde_json::to_string(&snapshot)?;
    let back: ContextSnapshot = serde_json::from_str(&json)?;
    assert_eq!(back, snapshot);
    Ok(())
}

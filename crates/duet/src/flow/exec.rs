// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-type node executors and the shell seam.
//!
//! Shell nodes prefer the attached session, so commands show up in the
//! same PTY the user is watching; without one they run as plain child
//! processes. File operations are confined to the user home and the
//! process working directory.

use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::error::ErrorCode;
use crate::llm::{ChatMessage, SharedLlm};
use crate::session::{AgentWrite, Session};

use super::condition::ConditionEvaluator;
use super::{AiData, BranchData, FileData, FileOp, NodeData, NodePayload, ShellData};

/// Cap applied to captured shell output and to file reads.
pub const OUTPUT_CAP: usize = 10 * 1024 * 1024;

/// Outcome of one shell command, whichever executor ran it.
#[derive(Debug, Clone)]
pub struct ShellOutcome {
    pub output: String,
    pub exit_code: Option<i32>,
    pub cwd: String,
}

/// Seam between the engine and whatever runs shell commands.
pub trait ShellExec: Send + Sync {
    fn run<'a>(
        &'a self,
        command: &'a str,
        timeout: Duration,
        cwd: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ShellOutcome>> + Send + 'a>>;

    /// Interrupt whatever is currently running, if anything.
    fn interrupt<'a>(&'a self) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Runs commands through the arbiter so they appear in the shared PTY.
///
/// The session's own working directory governs; a user interrupt surfaces
/// as exit code 130 rather than a failure.
pub struct SessionShell {
    session: Arc<Session>,
    typing_delay: Duration,
}

impl SessionShell {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session, typing_delay: Duration::from_millis(10) }
    }

    pub fn with_typing_delay(mut self, delay: Duration) -> Self {
        self.typing_delay = delay;
        self
    }
}

impl ShellExec for SessionShell {
    fn run<'a>(
        &'a self,
        command: &'a str,
        timeout: Duration,
        _cwd: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ShellOutcome>> + Send + 'a>> {
        Box::pin(async move {
            let opts = AgentWrite {
                typing_delay: self.typing_delay,
                execute: true,
                wait_for_completion: true,
                timeout,
            };
            let report = self
                .session
                .write_agent(command, &opts)
                .await
                .map_err(|code| anyhow::Error::new(code))?;
            if report.timed_out {
                return Err(anyhow::Error::new(ErrorCode::TimedOut));
            }
            let exit_code = if report.interrupted { Some(130) } else { Some(0) };
            Ok(ShellOutcome { output: report.output, exit_code, cwd: report.cwd })
        })
    }

    fn interrupt<'a>(&'a self) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            self.session.interrupt_agent().await;
        })
    }
}

/// Fallback executor: `sh -c` child processes, no PTY.
#[derive(Debug, Default)]
pub struct ProcessShell {
    cwd: Option<PathBuf>,
}

impl ProcessShell {
    pub fn new(cwd: Option<PathBuf>) -> Self {
        Self { cwd }
    }
}

impl ShellExec for ProcessShell {
    fn run<'a>(
        &'a self,
        command: &'a str,
        timeout: Duration,
        cwd: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ShellOutcome>> + Send + 'a>> {
        Box::pin(async move {
            let dir = cwd
                .map(PathBuf::from)
                .or_else(|| self.cwd.clone())
                .or_else(|| std::env::current_dir().ok())
                .unwrap_or_else(|| PathBuf::from("/"));

            let mut child = tokio::process::Command::new("sh")
                .args(["-c", command])
                .current_dir(&dir)
                .stdin(std::process::Stdio::null())
                .stdout(std::process::Stdio::piped())
                .stderr(std::process::Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .context("spawn shell command")?;

            let stdout_pipe = child.stdout.take();
            let stderr_pipe = child.stderr.take();
            let waited = tokio::time::timeout(timeout, async {
                // Drain both pipes concurrently — a full stderr pipe must
                // not stall a child still writing stdout.
                let (stdout, stderr) =
                    tokio::join!(drain_pipe(stdout_pipe), drain_pipe(stderr_pipe));
                let status = child.wait().await?;
                anyhow::Ok((stdout?, stderr?, status))
            })
            .await;

            match waited {
                Ok(result) => {
                    let (mut stdout, mut stderr, status) = result?;
                    stdout.truncate(OUTPUT_CAP);
                    stderr.truncate(OUTPUT_CAP);
                    let mut output = String::from_utf8_lossy(&stdout).into_owned();
                    output.push_str(&String::from_utf8_lossy(&stderr));
                    Ok(ShellOutcome {
                        output,
                        exit_code: status.code(),
                        cwd: dir.to_string_lossy().into_owned(),
                    })
                }
                Err(_) => Err(anyhow::Error::new(ErrorCode::TimedOut)),
            }
        })
    }

    fn interrupt<'a>(&'a self) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        // Child processes are reaped via kill_on_drop when the node task
        // is dropped on cancellation.
        Box::pin(async {})
    }
}

/// Allowed roots for file-operation targets.
#[derive(Debug, Clone)]
pub struct PathRoots {
    pub home: Option<PathBuf>,
    pub cwd: PathBuf,
}

impl PathRoots {
    pub fn from_env() -> Self {
        Self {
            home: std::env::var_os("HOME").map(PathBuf::from),
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
        }
    }
}

/// Everything a node task needs to execute.
pub struct NodeDeps {
    pub shell: Arc<dyn ShellExec>,
    pub llm: Option<SharedLlm>,
    pub evaluator: ConditionEvaluator,
    pub roots: PathRoots,
}

/// Result of one node execution, before the engine records it.
#[derive(Debug, Clone)]
pub enum NodeOutcome {
    Success(NodePayload),
    Failure { reason: String, payload: Option<NodePayload> },
}

/// Execute interpolated node data.
pub async fn execute_node(data: &NodeData, deps: &NodeDeps) -> NodeOutcome {
    match data {
        NodeData::Shell(shell) => run_shell(shell, deps).await,
        NodeData::Ai(ai) => run_ai(ai, deps).await,
        NodeData::Branch(branch) => run_branch(branch, deps),
        NodeData::File(file) => run_file(file, deps).await,
    }
}

async fn run_shell(data: &ShellData, deps: &NodeDeps) -> NodeOutcome {
    let timeout = Duration::from_millis(data.timeout_ms);
    match deps.shell.run(&data.command, timeout, data.cwd.as_deref()).await {
        Ok(outcome) => {
            let payload = NodePayload::Shell {
                stdout: outcome.output,
                stderr: String::new(),
                exit_code: outcome.exit_code,
                cwd: outcome.cwd,
            };
            match outcome.exit_code {
                // 130 is a user abort, reported but not a failure.
                Some(0) | Some(130) => NodeOutcome::Success(payload),
                code => NodeOutcome::Failure {
                    reason: format!("exit code {}", code.map_or_else(|| "none".to_owned(), |c| c.to_string())),
                    payload: Some(payload),
                },
            }
        }
        Err(e) => NodeOutcome::Failure { reason: failure_reason(&e), payload: None },
    }
}

async fn run_ai(data: &AiData, deps: &NodeDeps) -> NodeOutcome {
    let Some(ref llm) = deps.llm else {
        return NodeOutcome::Failure {
            reason: ErrorCode::LlmUnavailable.to_string(),
            payload: None,
        };
    };
    let messages = [ChatMessage::user(data.prompt.clone())];
    match llm.chat(&messages, data.system_prompt.as_deref()).await {
        Ok(response) => NodeOutcome::Success(NodePayload::Ai {
            response,
            provider: data.provider.clone().unwrap_or_else(|| llm.provider().to_owned()),
            model: data.model.clone().unwrap_or_else(|| llm.model().to_owned()),
        }),
        Err(e) => NodeOutcome::Failure { reason: format!("llm call failed: {e}"), payload: None },
    }
}

/// Branch evaluation is total: an unmatchable condition is `false`, never
/// a failed node.
fn run_branch(data: &BranchData, deps: &NodeDeps) -> NodeOutcome {
    let evaluation = deps.evaluator.evaluate(&data.condition);
    NodeOutcome::Success(NodePayload::Branch {
        condition_result: evaluation.result,
        evaluated: evaluation.evaluated,
    })
}

async fn run_file(data: &FileData, deps: &NodeDeps) -> NodeOutcome {
    let path = match resolve_path(&data.file_path, &deps.roots) {
        Ok(path) => path,
        Err(reason) => return NodeOutcome::Failure { reason, payload: None },
    };
    let shown = path.to_string_lossy().into_owned();

    match data.operation {
        FileOp::Read => match tokio::fs::read(&path).await {
            Ok(mut bytes) => {
                bytes.truncate(OUTPUT_CAP);
                NodeOutcome::Success(NodePayload::File {
                    file_path: shown,
                    content: Some(String::from_utf8_lossy(&bytes).into_owned()),
                    bytes_written: None,
                    exists: None,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => NodeOutcome::Failure {
                reason: ErrorCode::NotFound.to_string(),
                payload: None,
            },
            Err(e) => NodeOutcome::Failure { reason: format!("read failed: {e}"), payload: None },
        },
        FileOp::Write | FileOp::Append => {
            let content = data.content.clone().unwrap_or_default();
            if let Some(parent) = path.parent() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    return NodeOutcome::Failure {
                        reason: format!("create parent dirs failed: {e}"),
                        payload: None,
                    };
                }
            }
            let result = if data.operation == FileOp::Append {
                append_file(&path, content.as_bytes()).await
            } else {
                tokio::fs::write(&path, content.as_bytes()).await
            };
            match result {
                Ok(()) => NodeOutcome::Success(NodePayload::File {
                    file_path: shown,
                    content: None,
                    bytes_written: Some(content.len() as u64),
                    exists: None,
                }),
                Err(e) => {
                    NodeOutcome::Failure { reason: format!("write failed: {e}"), payload: None }
                }
            }
        }
        FileOp::Exists => {
            let exists = tokio::fs::try_exists(&path).await.unwrap_or(false);
            NodeOutcome::Success(NodePayload::File {
                file_path: shown,
                content: None,
                bytes_written: None,
                exists: Some(exists),
            })
        }
        FileOp::Delete => match tokio::fs::remove_file(&path).await {
            Ok(()) => NodeOutcome::Success(NodePayload::File {
                file_path: shown,
                content: None,
                bytes_written: None,
                exists: Some(false),
            }),
            // Absent target is a no-op.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                NodeOutcome::Success(NodePayload::File {
                    file_path: shown,
                    content: None,
                    bytes_written: None,
                    exists: Some(false),
                })
            }
            Err(e) => NodeOutcome::Failure { reason: format!("delete failed: {e}"), payload: None },
        },
    }
}

async fn drain_pipe(
    pipe: Option<impl tokio::io::AsyncRead + Unpin>,
) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        tokio::io::AsyncReadExt::read_to_end(&mut pipe, &mut buf).await?;
    }
    Ok(buf)
}

async fn append_file(path: &Path, content: &[u8]) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;
    let mut file =
        tokio::fs::OpenOptions::new().create(true).append(true).open(path).await?;
    file.write_all(content).await?;
    file.flush().await
}

/// Expand `~`, make absolute, normalize lexically, and confine to the
/// allowed roots.
fn resolve_path(raw: &str, roots: &PathRoots) -> Result<PathBuf, String> {
    let expanded: PathBuf = if raw == "~" {
        match roots.home {
            Some(ref home) => home.clone(),
            None => return Err(ErrorCode::PathEscape.to_string()),
        }
    } else if let Some(rest) = raw.strip_prefix("~/") {
        match roots.home {
            Some(ref home) => home.join(rest),
            None => return Err(ErrorCode::PathEscape.to_string()),
        }
    } else {
        PathBuf::from(raw)
    };

    let absolute =
        if expanded.is_absolute() { expanded } else { roots.cwd.join(expanded) };
    let normalized = normalize(&absolute);

    let in_home = roots.home.as_ref().is_some_and(|home| normalized.starts_with(home));
    let in_cwd = normalized.starts_with(&roots.cwd);
    if in_home || in_cwd {
        Ok(normalized)
    } else {
        Err(ErrorCode::PathEscape.to_string())
    }
}

/// Lexical normalization — `..` resolved without touching the filesystem,
/// so containment is decided before any I/O.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    out
}

fn failure_reason(e: &anyhow::Error) -> String {
    match e.downcast_ref::<ErrorCode>() {
        Some(code) => code.to_string(),
        None => e.to_string(),
    }
}

#[cfg(test)]
#[path = "exec_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level entrypoints shared by `main` and the spec harness: the
//! interactive bridge plus the flow/probe/classify subcommands.

use std::io::Write;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::path::Path;
use std::sync::Arc;

use nix::sys::termios;
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::Config;
use crate::event::SessionEvent;
use crate::flow::condition::ConditionEvaluator;
use crate::flow::exec::{NodeDeps, PathRoots, ProcessShell, SessionShell};
use crate::flow::{Engine, ExecutionStore, Flow, FlowStore};
use crate::intent::{strategy, Classifier};
use crate::llm::SharedLlm;
use crate::probe::{History, Probe};
use crate::session::Session;

/// RAII guard that restores the original terminal attributes on drop.
///
/// Holds the stdin fd and its original termios state; stdin stays valid
/// for the life of the process.
struct RawModeGuard {
    fd: i32,
    original: termios::Termios,
}

impl RawModeGuard {
    fn enter() -> anyhow::Result<Self> {
        let fd = std::io::stdin().as_raw_fd();
        let borrowed = borrow_fd(fd);
        let original = termios::tcgetattr(borrowed)?;
        let mut raw = original.clone();
        termios::cfmakeraw(&mut raw);
        termios::tcsetattr(borrowed, termios::SetArg::TCSAFLUSH, &raw)?;
        Ok(Self { fd, original })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let borrowed = borrow_fd(self.fd);
        let _ = termios::tcsetattr(borrowed, termios::SetArg::TCSAFLUSH, &self.original);
    }
}

/// Create a `BorrowedFd` from a raw fd that we know is valid.
fn borrow_fd(fd: i32) -> BorrowedFd<'static> {
    // SAFETY: stdin fd 0 is valid for the lifetime of the process.
    #[allow(unsafe_code)]
    unsafe {
        BorrowedFd::borrow_raw(fd)
    }
}

fn terminal_size() -> Option<(u16, u16)> {
    let fd = std::io::stdout().as_raw_fd();
    let mut ws = nix::libc::winsize { ws_row: 0, ws_col: 0, ws_xpixel: 0, ws_ypixel: 0 };
    // SAFETY: TIOCGWINSZ reads the terminal size into a properly
    // initialized winsize struct; stdout is a valid fd.
    #[allow(unsafe_code)]
    let ret = unsafe { nix::libc::ioctl(fd, nix::libc::TIOCGWINSZ, &mut ws) };
    if ret == 0 && ws.ws_col > 0 && ws.ws_row > 0 {
        Some((ws.ws_col, ws.ws_row))
    } else {
        None
    }
}

/// Run the interactive session: the local terminal becomes the shell, the
/// arbiter sits in between. Returns a process exit code.
pub async fn interactive(config: Config) -> anyhow::Result<i32> {
    let history = Arc::new(History::new());
    let mut opts = config.session_options(Arc::clone(&history));
    if let Some((cols, rows)) = terminal_size() {
        opts.cols = cols;
        opts.rows = rows;
    }
    let session = Arc::new(Session::open(opts).await?);
    let mut events = session.subscribe();

    let raw_guard = RawModeGuard::enter()?;
    let mut stdout = std::io::stdout();

    // Blocking thread for stdin — raw-mode reads have no async story.
    let (stdin_tx, mut stdin_rx) = mpsc::channel::<Vec<u8>>(64);
    std::thread::spawn(move || {
        use std::io::Read;
        let stdin = std::io::stdin();
        let mut handle = stdin.lock();
        let mut buf = [0u8; 4096];
        loop {
            match handle.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if stdin_tx.blocking_send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    let mut sigwinch =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::window_change()).ok();

    let exit_code = loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(SessionEvent::Output(bytes)) => {
                        let _ = stdout.write_all(&bytes);
                        let _ = stdout.flush();
                    }
                    Ok(SessionEvent::Exit { status }) => {
                        break status.code.unwrap_or(1);
                    }
                    Ok(SessionEvent::CwdChanged { cwd }) => {
                        debug!("cwd changed to {cwd}");
                    }
                    Ok(SessionEvent::Agent(_)) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break 1,
                }
            }

            data = stdin_rx.recv() => {
                match data {
                    Some(bytes) => {
                        if session.write_user(&bytes).await.is_err() {
                            break 1;
                        }
                    }
                    None => {
                        session.shutdown();
                    }
                }
            }

            _ = async {
                match sigwinch.as_mut() {
                    Some(signal) => { signal.recv().await; }
                    None => std::future::pending::<()>().await,
                }
            } => {
                if let Some((cols, rows)) = terminal_size() {
                    session.resize(cols, rows);
                }
            }
        }
    };

    drop(raw_guard);
    eprintln!("\r");
    Ok(exit_code)
}

/// Validate a flow file; prints warnings, fails on a rejected graph.
pub fn flow_validate(file: &Path) -> anyhow::Result<()> {
    let flow = read_flow(file)?;
    let report = crate::flow::validate(&flow)?;
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    println!("{} ok ({} nodes, {} edges)", flow.name, flow.nodes.len(), flow.edges.len());
    Ok(())
}

/// Execute a flow file with the fallback process executor and print the
/// terminal execution record as JSON.
pub async fn flow_run(config: &Config, file: &Path, llm: Option<SharedLlm>) -> anyhow::Result<i32> {
    let flow = read_flow(file)?;
    crate::flow::validate(&flow)?;

    let engine = Engine::new(NodeDeps {
        shell: Arc::new(ProcessShell::new(Some(config.launch_cwd()))),
        llm,
        evaluator: ConditionEvaluator::compile()?,
        roots: PathRoots::from_env(),
    })
    .with_store(ExecutionStore::new(config.data_dir()));

    let execution = engine.run(&flow, None).await;
    println!("{}", serde_json::to_string_pretty(&execution)?);
    Ok(match execution.status {
        crate::flow::ExecStatus::Completed => 0,
        _ => 1,
    })
}

/// Gather a context snapshot and print it as JSON.
pub async fn probe_snapshot(config: &Config) -> anyhow::Result<()> {
    let probe = Probe::new(Arc::new(History::new()));
    let snapshot = probe.gather(&config.launch_cwd(), &config.shell()).await;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

/// Classify an utterance against a fresh snapshot and print the label and
/// the selected response plan.
pub async fn classify(
    config: &Config,
    utterance: &str,
    llm: Option<SharedLlm>,
) -> anyhow::Result<()> {
    let probe = Probe::new(Arc::new(History::new()));
    let snapshot = probe.gather(&config.launch_cwd(), &config.shell()).await;
    let classifier = Classifier::new()?;
    let label = classifier
        .classify_refined(utterance, &snapshot, llm.as_deref(), config.refine_threshold)
        .await;
    let plan = strategy::select(&label);
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({ "label": label, "plan": plan }))?
    );
    Ok(())
}

/// Build workflow stores and a session-backed engine for a live session.
pub fn session_engine(
    config: &Config,
    session: Arc<Session>,
    llm: Option<SharedLlm>,
) -> anyhow::Result<(Engine, FlowStore)> {
    let engine = Engine::new(NodeDeps {
        shell: Arc::new(SessionShell::new(session)),
        llm,
        evaluator: ConditionEvaluator::compile()?,
        roots: PathRoots::from_env(),
    })
    .with_store(ExecutionStore::new(config.data_dir()));
    Ok((engine, FlowStore::new(config.data_dir())))
}

fn read_flow(file: &Path) -> anyhow::Result<Flow> {
    let text = std::fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("read {}: {e}", file.display()))?;
    serde_json::from_str(&text).map_err(|e| anyhow::anyhow!("parse {}: {e}", file.display()))
}

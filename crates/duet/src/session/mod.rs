// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session Arbiter: owns one shell PTY and mediates its two writers.
//!
//! The human always wins — a user byte arriving during an agent turn
//! aborts the agent (ETX first, then the user's bytes) before reaching the
//! PTY. The session loop task is the single writer of the ring buffer, the
//! working directory, and the prompt timestamp; everything else reads
//! snapshots.

pub mod gate;
pub mod osc7;
pub mod prompt;
pub mod shell;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ErrorCode;
use crate::event::{AgentStatus, ExitStatus, InputEvent, SessionEvent};
use crate::probe::History;
use crate::pty::{spawn::ShellPty, Backend};
use crate::ring::{OutputRing, DEFAULT_CAP};

use gate::AgentGate;
use osc7::Osc7Scanner;
use prompt::{PromptShapes, TAIL_WINDOW};
use shell::ShellFamily;

const ETX: u8 = 0x03;
const CR: u8 = 0x0d;

/// Fixed poll interval while awaiting a prompt.
const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Settling delay after a fresh prompt sighting.
const PROMPT_SETTLE_MS: u64 = 50;
/// Minimum elapsed time before a prompt-shaped tail alone counts.
const TAIL_PROMPT_GRACE_MS: u64 = 500;
/// Grace before SIGKILL when reaping the child at teardown.
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Options for opening a session.
#[derive(Debug, Default)]
pub struct SessionOptions {
    /// Shell binary; falls back to `$SHELL`, then `/bin/sh`.
    pub shell: Option<String>,
    /// Starting directory; falls back to the process cwd.
    pub cwd: Option<PathBuf>,
    pub cols: u16,
    pub rows: u16,
    /// Ring buffer retention cap; 0 means the default.
    pub ring_cap: usize,
    /// Command history sink fed by completed agent turns.
    pub history: Option<Arc<History>>,
}

/// Options for a single agent turn.
#[derive(Debug, Clone)]
pub struct AgentWrite {
    /// Delay between typed characters. Non-zero keeps human preemption
    /// physically possible mid-command.
    pub typing_delay: Duration,
    /// Append CR to execute after typing.
    pub execute: bool,
    /// Await the next shell prompt after CR.
    pub wait_for_completion: bool,
    /// Prompt-wait budget, measured from the CR send.
    pub timeout: Duration,
}

impl Default for AgentWrite {
    fn default() -> Self {
        Self {
            typing_delay: Duration::from_millis(25),
            execute: true,
            wait_for_completion: true,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Outcome of an agent turn.
///
/// A wait timeout is not an error: the report carries the accumulated
/// output with `timed_out` set and the call returns normally.
#[derive(Debug, Clone)]
pub struct AgentReport {
    pub interrupted: bool,
    pub timed_out: bool,
    pub duration: Duration,
    pub output: String,
    pub cwd: String,
}

/// State shared between the session loop and the public handle.
struct Shared {
    ring: RwLock<OutputRing>,
    /// Lock-free mirror of `ring.total_written()` updated by the loop.
    ring_total: AtomicU64,
    cwd: RwLock<String>,
    /// Epoch ms of the most recent prompt-shaped tail sighting.
    last_prompt_ms: AtomicU64,
    /// Sighting counter — lets a waiter tell a fresh prompt from one that
    /// landed in the same millisecond as its CR.
    prompt_seq: AtomicU64,
    gate: AgentGate,
    shapes: PromptShapes,
    closed: AtomicBool,
    child_pid: AtomicU32,
    /// ORDERING: written before `closed` is set so any reader observing a
    /// closed session finds the status populated.
    exit_status: RwLock<Option<ExitStatus>>,
    events_tx: broadcast::Sender<SessionEvent>,
    history: Option<Arc<History>>,
    done: CancellationToken,
}

/// A live arbiter session around one shell child.
pub struct Session {
    shared: Arc<Shared>,
    input_tx: mpsc::Sender<InputEvent>,
    resize_tx: mpsc::Sender<(u16, u16)>,
    shutdown: CancellationToken,
}

impl Session {
    /// Spawn the shell on a fresh PTY, install the prompt-hook preamble,
    /// and start the session loop.
    pub async fn open(opts: SessionOptions) -> anyhow::Result<Session> {
        let shell = opts
            .shell
            .clone()
            .or_else(|| std::env::var("SHELL").ok())
            .unwrap_or_else(|| "/bin/sh".to_owned());
        let family = ShellFamily::detect(&shell);

        let cols = if opts.cols == 0 { 120 } else { opts.cols };
        let rows = if opts.rows == 0 { 32 } else { opts.rows };
        let ring_cap = if opts.ring_cap == 0 { DEFAULT_CAP } else { opts.ring_cap };

        let mut backend = ShellPty::spawn(&shell, opts.cwd.as_deref(), cols, rows)
            .map_err(|e| e.context(ErrorCode::SpawnFailed))?;
        let child_pid = backend.child_pid().unwrap_or(0);

        let initial_cwd = opts
            .cwd
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| "/".to_owned());

        let (events_tx, _) = broadcast::channel(256);
        let shared = Arc::new(Shared {
            ring: RwLock::new(OutputRing::new(ring_cap)),
            ring_total: AtomicU64::new(0),
            cwd: RwLock::new(initial_cwd),
            last_prompt_ms: AtomicU64::new(0),
            prompt_seq: AtomicU64::new(0),
            gate: AgentGate::new(),
            shapes: PromptShapes::compile()?,
            closed: AtomicBool::new(false),
            child_pid: AtomicU32::new(child_pid),
            exit_status: RwLock::new(None),
            events_tx,
            history: opts.history,
            done: CancellationToken::new(),
        });

        let (backend_output_tx, backend_output_rx) = mpsc::channel::<Bytes>(256);
        let (backend_input_tx, backend_input_rx) = mpsc::channel::<Bytes>(256);
        let (input_tx, input_rx) = mpsc::channel::<InputEvent>(256);
        let (resize_tx, resize_rx) = mpsc::channel::<(u16, u16)>(4);
        let shutdown = CancellationToken::new();

        let backend_handle = tokio::spawn(async move {
            backend.run(backend_output_tx, backend_input_rx, resize_rx).await
        });

        // Install the prompt hook before any user input, then clear so the
        // setup line never shows. Unknown families skip the hook and keep
        // the last-known cwd.
        if let Some(preamble) = shell::integration_preamble(family) {
            let _ = backend_input_tx.send(Bytes::from(preamble)).await;
        }

        tokio::spawn(session_loop(
            Arc::clone(&shared),
            backend_output_rx,
            input_rx,
            backend_input_tx,
            backend_handle,
            shutdown.clone(),
        ));

        Ok(Session { shared, input_tx, resize_tx, shutdown })
    }

    /// Deliver raw human input. Preempts any active agent turn first.
    pub async fn write_user(&self, data: &[u8]) -> Result<(), ErrorCode> {
        if self.is_closed() {
            return Err(ErrorCode::Closed);
        }
        self.input_tx
            .send(InputEvent::User(Bytes::copy_from_slice(data)))
            .await
            .map_err(|_| ErrorCode::Closed)
    }

    /// Type a command on behalf of the agent and (optionally) await the
    /// next prompt. At most one agent turn is in flight per session;
    /// `busy` is returned otherwise. The agent-active flag is cleared on
    /// every exit path.
    pub async fn write_agent(
        &self,
        command: &str,
        opts: &AgentWrite,
    ) -> Result<AgentReport, ErrorCode> {
        if self.is_closed() {
            return Err(ErrorCode::Closed);
        }
        let generation = self.shared.gate.try_acquire().ok_or(ErrorCode::Busy)?;
        let turn = TurnGuard { gate: &self.shared.gate, generation };

        let _ = self
            .shared
            .events_tx
            .send(SessionEvent::Agent(AgentStatus::Started { command: command.to_owned() }));

        let started = Instant::now();
        let start_offset = self.shared.ring_total.load(Ordering::Acquire);
        let mut interrupted = false;
        let mut timed_out = false;
        let mut charbuf = [0u8; 4];

        for ch in command.chars() {
            if !self.shared.gate.accepts(generation) {
                interrupted = true;
                break;
            }
            let encoded = ch.encode_utf8(&mut charbuf).as_bytes();
            let event =
                InputEvent::Agent { data: Bytes::copy_from_slice(encoded), generation };
            if self.input_tx.send(event).await.is_err() {
                return Err(ErrorCode::Closed);
            }
            if !opts.typing_delay.is_zero()
                && self.shared.gate.sleep_or_interrupt(generation, opts.typing_delay).await
            {
                interrupted = true;
                break;
            }
        }

        if opts.execute && !interrupted {
            let event =
                InputEvent::Agent { data: Bytes::from_static(&[CR]), generation };
            if self.input_tx.send(event).await.is_err() {
                return Err(ErrorCode::Closed);
            }
            let cr_ms = now_ms();
            let seq_at_cr = self.shared.prompt_seq.load(Ordering::Acquire);
            let deadline = Instant::now() + opts.timeout;

            if opts.wait_for_completion {
                loop {
                    if !self.shared.gate.accepts(generation) {
                        interrupted = true;
                        break;
                    }
                    if self.is_closed() {
                        break;
                    }
                    let last_prompt = self.shared.last_prompt_ms.load(Ordering::Acquire);
                    let now = now_ms();
                    // A fresh prompt after the CR, settled.
                    if self.shared.prompt_seq.load(Ordering::Acquire) > seq_at_cr
                        && now >= last_prompt + PROMPT_SETTLE_MS
                    {
                        break;
                    }
                    // A prompt-shaped tail after a grace period covers
                    // shells whose prompt was redrawn without new output.
                    if now.saturating_sub(cr_ms) >= TAIL_PROMPT_GRACE_MS {
                        let tail = {
                            let ring = self.shared.ring.read().await;
                            ring.tail_bytes(TAIL_WINDOW).to_vec()
                        };
                        if self.shared.shapes.matches_tail(&tail) {
                            break;
                        }
                    }
                    if Instant::now() >= deadline {
                        timed_out = true;
                        break;
                    }
                    if self.shared.gate.sleep_or_interrupt(generation, POLL_INTERVAL).await {
                        interrupted = true;
                        break;
                    }
                }
            }
        }

        let output = {
            let ring = self.shared.ring.read().await;
            String::from_utf8_lossy(ring.since(start_offset)).into_owned()
        };
        let cwd = self.shared.cwd.read().await.clone();
        drop(turn);

        let _ = self
            .shared
            .events_tx
            .send(SessionEvent::Agent(AgentStatus::Completed { interrupted, timed_out }));

        if opts.execute {
            if let Some(ref history) = self.shared.history {
                let exit_code = if interrupted {
                    Some(130)
                } else if timed_out {
                    None
                } else {
                    Some(0)
                };
                history.record_command(command, exit_code);
            }
        }

        Ok(AgentReport { interrupted, timed_out, duration: started.elapsed(), output, cwd })
    }

    /// Abort the agent turn if one is active. Idempotent.
    pub async fn interrupt_agent(&self) {
        if self.is_closed() {
            return;
        }
        let _ = self.input_tx.send(InputEvent::Interrupt).await;
    }

    /// Best-effort resize; swallows post-exit races.
    pub fn resize(&self, cols: u16, rows: u16) {
        let _ = self.resize_tx.try_send((cols, rows));
    }

    /// The last `max_lines` lines of retained output.
    pub async fn output_tail(&self, max_lines: usize) -> String {
        self.shared.ring.read().await.tail_lines(max_lines)
    }

    /// Last working directory learned from shell integration.
    pub async fn cwd(&self) -> String {
        self.shared.cwd.read().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events_tx.subscribe()
    }

    pub fn agent_active(&self) -> bool {
        self.shared.gate.is_active()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    pub async fn exit_status(&self) -> Option<ExitStatus> {
        *self.shared.exit_status.read().await
    }

    /// Ask the session to shut down (SIGHUP, then SIGKILL after a grace).
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Resolves once the loop has torn down and the exit event was emitted.
    pub async fn wait_closed(&self) {
        self.shared.done.cancelled().await;
    }
}

/// Releases the agent-active flag when a `write_agent` call unwinds.
struct TurnGuard<'a> {
    gate: &'a AgentGate,
    generation: u64,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.gate.release(self.generation);
    }
}

async fn session_loop(
    shared: Arc<Shared>,
    mut backend_output_rx: mpsc::Receiver<Bytes>,
    mut input_rx: mpsc::Receiver<InputEvent>,
    backend_input_tx: mpsc::Sender<Bytes>,
    mut backend_handle: JoinHandle<anyhow::Result<ExitStatus>>,
    shutdown: CancellationToken,
) {
    let mut scanner = Osc7Scanner::new();

    loop {
        tokio::select! {
            chunk = backend_output_rx.recv() => {
                match chunk {
                    Some(bytes) => handle_chunk(&shared, &mut scanner, bytes).await,
                    None => break,
                }
            }

            event = input_rx.recv() => {
                match event {
                    Some(InputEvent::User(data)) => {
                        // Human wins: abort the agent, ETX first, then the
                        // user's bytes.
                        if shared.gate.interrupt() {
                            let _ = backend_input_tx.send(Bytes::from_static(&[ETX])).await;
                            let _ = shared
                                .events_tx
                                .send(SessionEvent::Agent(AgentStatus::Interrupted));
                        }
                        if backend_input_tx.send(data).await.is_err() {
                            debug!("backend input channel closed");
                            break;
                        }
                    }
                    Some(InputEvent::Agent { data, generation }) => {
                        // Bytes from a preempted turn are dropped here, so
                        // nothing agent-typed lands after a user abort.
                        if shared.gate.accepts(generation)
                            && backend_input_tx.send(data).await.is_err()
                        {
                            debug!("backend input channel closed");
                            break;
                        }
                    }
                    Some(InputEvent::Interrupt) => {
                        if shared.gate.interrupt() {
                            let _ = backend_input_tx.send(Bytes::from_static(&[ETX])).await;
                            let _ = shared
                                .events_tx
                                .send(SessionEvent::Agent(AgentStatus::Interrupted));
                        }
                    }
                    None => break,
                }
            }

            _ = shutdown.cancelled() => {
                let pid = shared.child_pid.load(Ordering::Acquire);
                if pid != 0 {
                    let _ = kill(Pid::from_raw(pid as i32), Signal::SIGHUP);
                }
                break;
            }
        }
    }

    // Capture any output still in flight.
    while let Ok(bytes) = backend_output_rx.try_recv() {
        handle_chunk(&shared, &mut scanner, bytes).await;
    }

    // Dropping the input sender tells the backend to finish.
    drop(backend_input_tx);

    let status = tokio::select! {
        result = &mut backend_handle => match result {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                warn!("backend error: {e}");
                ExitStatus { code: Some(1), signal: None }
            }
            Err(e) => {
                warn!("backend task panicked: {e}");
                ExitStatus { code: Some(1), signal: None }
            }
        },
        _ = tokio::time::sleep(REAP_TIMEOUT) => {
            warn!("shell did not exit within {REAP_TIMEOUT:?}, sending SIGKILL");
            let pid = shared.child_pid.load(Ordering::Acquire);
            if pid != 0 {
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
            }
            backend_handle.abort();
            ExitStatus { code: Some(137), signal: Some(9) }
        }
    };

    // ORDERING: exit_status, then closed, then the event — a reader who
    // sees either signal always finds the status populated.
    {
        let mut exit = shared.exit_status.write().await;
        *exit = Some(status);
    }
    shared.closed.store(true, Ordering::Release);
    shared.gate.interrupt();
    let _ = shared.events_tx.send(SessionEvent::Exit { status });
    shared.done.cancel();
}

async fn handle_chunk(shared: &Shared, scanner: &mut Osc7Scanner, bytes: Bytes) {
    {
        let mut ring = shared.ring.write().await;
        ring.write(&bytes);
        shared.ring_total.store(ring.total_written(), Ordering::Release);
    }
    let _ = shared.events_tx.send(SessionEvent::Output(bytes.clone()));

    for path in scanner.scan(&bytes) {
        let mut cwd = shared.cwd.write().await;
        if *cwd != path {
            *cwd = path.clone();
            drop(cwd);
            let _ = shared.events_tx.send(SessionEvent::CwdChanged { cwd: path });
        }
    }

    let tail = {
        let ring = shared.ring.read().await;
        ring.tail_bytes(TAIL_WINDOW).to_vec()
    };
    if shared.shapes.matches_tail(&tail) {
        shared.last_prompt_ms.store(now_ms(), Ordering::Release);
        shared.prompt_seq.fetch_add(1, Ordering::AcqRel);
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;

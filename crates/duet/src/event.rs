// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Exit status of the shell child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

/// Lifecycle of an agent turn on the PTY.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentStatus {
    /// `write_agent` acquired the session and began typing.
    Started { command: String },
    /// The agent turn finished (prompt seen, timeout, or interrupt).
    Completed { interrupted: bool, timed_out: bool },
    /// The human (or an explicit interrupt call) preempted the agent.
    Interrupted,
}

/// Events broadcast by a session to its subscribers.
///
/// Emission is serialized in observation order by the session loop;
/// subscribers receive snapshots and must not block.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Raw output chunk from the PTY, in arrival order.
    Output(Bytes),
    /// The shell reported a new working directory via OSC-7.
    CwdChanged { cwd: String },
    /// Agent turn lifecycle.
    Agent(AgentStatus),
    /// The child exited. Emitted exactly once, after which writes fail.
    Exit { status: ExitStatus },
}

/// Input delivered to the session loop.
///
/// Agent bytes carry the gate generation they were typed under; the loop
/// drops any that arrive after a preemption bumped the generation, so no
/// agent byte can land after a user abort.
#[derive(Debug)]
pub enum InputEvent {
    User(Bytes),
    Agent { data: Bytes, generation: u64 },
    Interrupt,
}

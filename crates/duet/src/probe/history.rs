// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::intent::patterns::extract_error_pattern;

/// Commands retained for the snapshot's recent-activity section.
const MAX_COMMANDS: usize = 20;
/// Errors retained.
const MAX_ERRORS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRecord {
    pub command: String,
    pub exit_code: Option<i32>,
    pub at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub message: String,
    /// Name of the fingerprint rule that matched, if any.
    pub pattern: Option<String>,
    pub at_ms: u64,
}

/// Recent commands and observed errors, as captured into a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateInfo {
    pub recent_commands: Vec<CommandRecord>,
    pub recent_errors: Vec<ErrorRecord>,
}

/// Rolling record of session activity, fed by the arbiter and read by the
/// probe. Bounded; oldest entries fall off.
#[derive(Debug, Default)]
pub struct History {
    commands: Mutex<VecDeque<CommandRecord>>,
    errors: Mutex<VecDeque<ErrorRecord>>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_command(&self, command: &str, exit_code: Option<i32>) {
        let mut commands = self.commands.lock();
        commands.push_back(CommandRecord {
            command: command.to_owned(),
            exit_code,
            at_ms: now_ms(),
        });
        while commands.len() > MAX_COMMANDS {
            commands.pop_front();
        }
    }

    pub fn record_error(&self, message: &str) {
        let pattern = extract_error_pattern(message).map(str::to_owned);
        let mut errors = self.errors.lock();
        errors.push_back(ErrorRecord { message: message.to_owned(), pattern, at_ms: now_ms() });
        while errors.len() > MAX_ERRORS {
            errors.pop_front();
        }
    }

    /// Snapshot copy, newest last.
    pub fn recent(&self) -> StateInfo {
        StateInfo {
            recent_commands: self.commands.lock().iter().cloned().collect(),
            recent_errors: self.errors.lock().iter().cloned().collect(),
        }
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;

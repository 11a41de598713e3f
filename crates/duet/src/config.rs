// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use crate::probe::History;
use crate::ring::DEFAULT_CAP;
use crate::session::{AgentWrite, SessionOptions};

/// AI-assisted terminal: one shell, two writers, workflows on top.
#[derive(Debug, Parser)]
#[command(name = "duet", version, about)]
pub struct Config {
    /// Shell binary for new sessions.
    #[arg(long, env = "SHELL")]
    pub shell: Option<String>,

    /// Starting directory for new sessions.
    #[arg(long, env = "DUET_LAUNCH_CWD")]
    pub cwd: Option<PathBuf>,

    /// Terminal columns.
    #[arg(long, env = "DUET_COLS", default_value = "120")]
    pub cols: u16,

    /// Terminal rows.
    #[arg(long, env = "DUET_ROWS", default_value = "32")]
    pub rows: u16,

    /// Output ring retention cap in bytes.
    #[arg(long, env = "DUET_RING_SIZE", default_value_t = DEFAULT_CAP)]
    pub ring_size: usize,

    /// Data directory for flows and execution records.
    #[arg(long, env = "DUET_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Delay between agent-typed characters in milliseconds.
    #[arg(long, env = "DUET_TYPING_DELAY_MS", default_value = "25")]
    pub typing_delay_ms: u64,

    /// Prompt-wait budget for agent commands in milliseconds.
    #[arg(long, env = "DUET_AGENT_TIMEOUT_MS", default_value = "30000")]
    pub agent_timeout_ms: u64,

    /// Confidence below which the classifier consults the LLM, if bound.
    #[arg(long, env = "DUET_REFINE_THRESHOLD", default_value = "0.5")]
    pub refine_threshold: f64,

    /// Log format (json or text).
    #[arg(long, env = "DUET_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "DUET_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cols == 0 || self.rows == 0 {
            anyhow::bail!("terminal size must be non-zero");
        }
        if self.ring_size < 4096 {
            anyhow::bail!("--ring-size must be at least 4096 bytes");
        }
        if !(0.0..=1.0).contains(&self.refine_threshold) {
            anyhow::bail!("--refine-threshold must be within [0, 1]");
        }
        if self.log_format != "json" && self.log_format != "text" {
            anyhow::bail!("--log-format must be json or text");
        }
        Ok(())
    }

    /// Shell for new sessions; `$SHELL` is read by the arg parser, with a
    /// final `/bin/sh` fallback.
    pub fn shell(&self) -> String {
        self.shell.clone().unwrap_or_else(|| "/bin/sh".to_owned())
    }

    /// Starting directory for sessions and probes.
    pub fn launch_cwd(&self) -> PathBuf {
        self.cwd
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("/"))
    }

    /// Data root; defaults to `~/.duet`.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".duet"))
                .unwrap_or_else(|| PathBuf::from(".duet"))
        })
    }

    pub fn session_options(&self, history: Arc<History>) -> SessionOptions {
        SessionOptions {
            shell: Some(self.shell()),
            cwd: Some(self.launch_cwd()),
            cols: self.cols,
            rows: self.rows,
            ring_cap: self.ring_size,
            history: Some(history),
        }
    }

    pub fn agent_write(&self) -> AgentWrite {
        AgentWrite {
            typing_delay: Duration::from_millis(self.typing_delay_ms),
            execute: true,
            wait_for_completion: true,
            timeout: Duration::from_millis(self.agent_timeout_ms),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

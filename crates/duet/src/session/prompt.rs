// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell-prompt shape detection over the raw output tail.
//!
//! The session never interprets output semantically; it only checks
//! whether the final bytes, after stripping control sequences, end in one
//! of a closed set of prompt suffixes.

use regex::Regex;

/// Closed set of prompt suffixes, tried in order against the stripped tail.
const PROMPT_SUFFIXES: &[&str] = &[
    r"\$\s*$",
    r"%\s*$",
    r"#\s*$",
    r">\s*$",
    r"❯\s*$",
    r"➜\s*$",
    r"λ\s*$",
    r"⚡\s*$",
    r"\)\s*\$\s*$",
];

/// How many trailing bytes of the ring are examined per chunk.
pub const TAIL_WINDOW: usize = 100;

/// Compiled prompt-shape matcher.
#[derive(Debug)]
pub struct PromptShapes {
    suffixes: Vec<Regex>,
    ansi: Regex,
}

impl PromptShapes {
    pub fn compile() -> anyhow::Result<Self> {
        let suffixes =
            PROMPT_SUFFIXES.iter().map(|p| Regex::new(p)).collect::<Result<Vec<_>, _>>()?;
        // OSC first (its body may contain CSI-looking bytes), then CSI,
        // then bare two-byte escapes, then stray control bytes (not \n).
        let ansi = Regex::new(
            r"\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)?|\x1b\[[0-9;:?]*[ -/]*[@-~]|\x1b[@-Z\\-_]|[\x00-\x09\x0b-\x1f\x7f]",
        )?;
        Ok(Self { suffixes, ansi })
    }

    /// Strip ANSI escape sequences and control bytes (newlines kept).
    pub fn strip_ansi(&self, text: &str) -> String {
        self.ansi.replace_all(text, "").into_owned()
    }

    /// Whether the given raw tail ends in a prompt shape.
    pub fn matches_tail(&self, tail: &[u8]) -> bool {
        let text = String::from_utf8_lossy(tail);
        let stripped = self.strip_ansi(&text);
        if stripped.trim().is_empty() {
            return false;
        }
        self.suffixes.iter().any(|re| re.is_match(&stripped))
    }
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Optional LLM refinement for low-confidence labels.

use tracing::debug;

use crate::llm::{ChatMessage, LlmChat};
use crate::probe::ContextSnapshot;

use super::{gaps, Category, IntentLabel};

const SYSTEM_PROMPT: &str = "You classify terminal-assistant requests. Reply with a single JSON \
object: {\"category\": \"...\", \"confidence\": 0.0-1.0, \"signals\": [\"...\"]}. Category must be \
one of: installation, configuration, build, runtime, network, permissions, git, docker, \
deployment, how-to, optimization, debugging, unknown. No prose.";

/// What the refinement prompt asks the model to return.
#[derive(Debug, serde::Deserialize)]
struct Refinement {
    category: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    signals: Vec<String>,
}

/// One round trip; on any failure the pattern-matched label is kept.
pub async fn refine(
    label: IntentLabel,
    utterance: &str,
    snapshot: &ContextSnapshot,
    llm: &dyn LlmChat,
) -> IntentLabel {
    let prompt = build_prompt(utterance, snapshot);
    let messages = [ChatMessage::user(prompt)];
    let reply = match llm.chat(&messages, Some(SYSTEM_PROMPT)).await {
        Ok(reply) => reply,
        Err(e) => {
            debug!("refinement call failed, keeping pattern label: {e}");
            return label;
        }
    };

    let Some(refinement) = parse_reply(&reply) else {
        debug!("unparseable refinement reply, keeping pattern label");
        return label;
    };
    let Some(category) = Category::parse(&refinement.category) else {
        debug!(category = %refinement.category, "refinement outside the closed set, keeping pattern label");
        return label;
    };

    let (requirements, gaps) = gaps::analyze(category, snapshot);
    IntentLabel {
        category,
        confidence: refinement.confidence.clamp(0.0, 1.0),
        signals: refinement.signals,
        gaps,
        requirements,
        refined: true,
    }
}

fn build_prompt(utterance: &str, snapshot: &ContextSnapshot) -> String {
    let mut prompt = format!("Utterance: {utterance}\n");
    prompt.push_str(&format!("Project kind: {:?}\n", snapshot.project.kind));
    if !snapshot.state.recent_errors.is_empty() {
        prompt.push_str("Recent errors:\n");
        for error in snapshot.state.recent_errors.iter().rev().take(3) {
            prompt.push_str(&format!("- {}\n", error.message));
        }
    }
    if !snapshot.state.recent_commands.is_empty() {
        prompt.push_str("Recent commands:\n");
        for command in snapshot.state.recent_commands.iter().rev().take(5) {
            prompt.push_str(&format!(
                "- {} (exit {})\n",
                command.command,
                command.exit_code.map(|c| c.to_string()).unwrap_or_else(|| "?".to_owned())
            ));
        }
    }
    prompt
}

/// Extract the single JSON object, tolerating code fences around it.
fn parse_reply(reply: &str) -> Option<Refinement> {
    let trimmed = reply.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

#[cfg(test)]
#[path = "refine_tests.rs"]
mod tests;

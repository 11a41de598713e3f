// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Intent classifier and gap analyzer.
//!
//! The pattern path is a pure function of `(utterance, snapshot)`:
//! weighted rule hits are summed per category, the best category wins, and
//! context boosts adjust confidence. Only the optional LLM refinement path
//! is non-deterministic, and its use is flagged on the result.

pub mod gaps;
pub mod patterns;
pub mod refine;
pub mod strategy;

pub use gaps::{Field, Gap, Importance, Requirements};
pub use strategy::{ResponseMode, ResponsePlan};

use serde::{Deserialize, Serialize};

use crate::llm::LlmChat;
use crate::probe::{ContextSnapshot, ProjectKind};

use patterns::RuleSet;

/// Closed category set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Installation,
    Configuration,
    Build,
    Runtime,
    Network,
    Permissions,
    Git,
    Docker,
    Deployment,
    HowTo,
    Optimization,
    Debugging,
    Unknown,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installation => "installation",
            Self::Configuration => "configuration",
            Self::Build => "build",
            Self::Runtime => "runtime",
            Self::Network => "network",
            Self::Permissions => "permissions",
            Self::Git => "git",
            Self::Docker => "docker",
            Self::Deployment => "deployment",
            Self::HowTo => "how-to",
            Self::Optimization => "optimization",
            Self::Debugging => "debugging",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a category name from the closed set.
    pub fn parse(name: &str) -> Option<Self> {
        let all = [
            Self::Installation,
            Self::Configuration,
            Self::Build,
            Self::Runtime,
            Self::Network,
            Self::Permissions,
            Self::Git,
            Self::Docker,
            Self::Deployment,
            Self::HowTo,
            Self::Optimization,
            Self::Debugging,
            Self::Unknown,
        ];
        let name = name.trim().to_lowercase();
        all.into_iter().find(|c| c.as_str() == name)
    }
}

/// Classification result: category, confidence, the rules that fired, and
/// the information gaps for the chosen category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentLabel {
    pub category: Category,
    pub confidence: f64,
    pub signals: Vec<String>,
    pub gaps: Vec<Gap>,
    pub requirements: Requirements,
    /// True when the LLM refinement path adjusted this label.
    #[serde(default)]
    pub refined: bool,
}

/// Minimum best-category score before falling back to `unknown`.
const SCORE_FLOOR: f64 = 0.1;
/// Utterance error-pattern hits score at this fraction of the weight.
const UTTERANCE_ERROR_FACTOR: f64 = 0.8;
/// Snapshot recent-error hits score above the weight.
const SNAPSHOT_ERROR_FACTOR: f64 = 1.2;

const PROJECT_ALIGNMENT_BOOST: f64 = 0.10;
const GIT_CHANGES_BOOST: f64 = 0.15;
const RECENT_ERROR_BOOST: f64 = 0.10;

/// Deterministic classifier over the compiled fingerprint tables.
pub struct Classifier {
    rules: RuleSet,
}

impl Classifier {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self { rules: RuleSet::compile()? })
    }

    /// Pattern-path classification. Pure: same inputs, same label.
    pub fn classify(&self, utterance: &str, snapshot: &ContextSnapshot) -> IntentLabel {
        let recent_error =
            snapshot.state.recent_errors.last().map(|e| e.message.as_str()).unwrap_or("");

        let mut best: Option<(Category, f64, Vec<String>)> = None;
        for rule in self.rules.rules() {
            let mut score = 0.0;
            let mut signals = Vec::new();

            for keyword in &rule.keywords {
                if keyword.is_match(utterance) {
                    score += rule.weight;
                    signals.push(format!("keyword:{}", keyword.as_str()));
                }
            }
            for (name, pattern) in &rule.errors {
                if pattern.is_match(utterance) {
                    score += rule.weight * UTTERANCE_ERROR_FACTOR;
                    signals.push(format!("error-pattern:{name}"));
                }
                if !recent_error.is_empty() && pattern.is_match(recent_error) {
                    score += rule.weight * SNAPSHOT_ERROR_FACTOR;
                    signals.push(format!("recent-error:{name}"));
                }
            }

            let better = match &best {
                Some((_, best_score, _)) => score > *best_score,
                None => score > 0.0,
            };
            if better {
                best = Some((rule.category, score, signals));
            }
        }

        let (category, score, signals) = match best {
            Some((category, score, signals)) if score >= SCORE_FLOOR => (category, score, signals),
            _ => {
                let (requirements, gaps) = gaps::analyze(Category::Unknown, snapshot);
                return IntentLabel {
                    category: Category::Unknown,
                    confidence: 0.0,
                    signals: Vec::new(),
                    gaps,
                    requirements,
                    refined: false,
                };
            }
        };

        let mut confidence = score.min(1.0);
        if project_aligned(snapshot.project.kind, category) {
            confidence += PROJECT_ALIGNMENT_BOOST;
        }
        if category == Category::Git
            && snapshot.git.as_ref().map(|g| g.has_changes).unwrap_or(false)
        {
            confidence += GIT_CHANGES_BOOST;
        }
        if !snapshot.state.recent_errors.is_empty() && category != Category::HowTo {
            confidence += RECENT_ERROR_BOOST;
        }
        let confidence = confidence.min(1.0);

        let (requirements, gaps) = gaps::analyze(category, snapshot);
        IntentLabel { category, confidence, signals, gaps, requirements, refined: false }
    }

    /// Classify, then refine through the LLM when confidence is below
    /// `threshold` and a capability is bound. Never blocks classification
    /// on an unavailable or failing LLM.
    pub async fn classify_refined(
        &self,
        utterance: &str,
        snapshot: &ContextSnapshot,
        llm: Option<&dyn LlmChat>,
        threshold: f64,
    ) -> IntentLabel {
        let label = self.classify(utterance, snapshot);
        let Some(llm) = llm else {
            return label;
        };
        if label.confidence >= threshold {
            return label;
        }
        refine::refine(label, utterance, snapshot, llm).await
    }
}

/// Project kinds whose presence makes certain categories more plausible.
fn project_aligned(kind: ProjectKind, category: Category) -> bool {
    match kind {
        ProjectKind::Node
        | ProjectKind::Python
        | ProjectKind::Rust
        | ProjectKind::Go
        | ProjectKind::Ruby
        | ProjectKind::Java => matches!(
            category,
            Category::Installation | Category::Build | Category::Runtime
        ),
        ProjectKind::Docker => matches!(category, Category::Docker | Category::Deployment),
        ProjectKind::Terraform => matches!(category, Category::Deployment),
        ProjectKind::Make => matches!(category, Category::Build),
        ProjectKind::None => false,
    }
}

#[cfg(test)]
#[path = "intent_tests.rs"]
mod tests;

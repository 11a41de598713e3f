// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Response strategy selection from confidence and gaps.

use serde::{Deserialize, Serialize};

use super::{Gap, Importance, IntentLabel};

/// Confidence at or above which a gap-free label is answered directly.
const DIRECT_CONFIDENCE: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Answer outright.
    Direct,
    /// Answer, stating the assumptions made for missing information.
    Assumed,
    /// Ask one bundled clarification question before answering.
    Ask,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePlan {
    pub mode: ResponseMode,
    pub assumptions: Vec<String>,
    pub clarification: Option<String>,
}

/// Pick the response mode for a label.
///
/// Any required gap forces a single bundled question. Without required
/// gaps, high confidence answers directly; otherwise the answer states
/// assumptions for whatever helpful fields are missing.
pub fn select(label: &IntentLabel) -> ResponsePlan {
    let required: Vec<&Gap> =
        label.gaps.iter().filter(|g| g.importance == Importance::Required).collect();

    if !required.is_empty() {
        let clarification =
            required.iter().map(|g| g.prompt.as_str()).collect::<Vec<_>>().join(" ");
        return ResponsePlan {
            mode: ResponseMode::Ask,
            assumptions: Vec::new(),
            clarification: Some(clarification),
        };
    }

    if label.confidence >= DIRECT_CONFIDENCE {
        return ResponsePlan { mode: ResponseMode::Direct, assumptions: Vec::new(), clarification: None };
    }

    let assumptions = label
        .gaps
        .iter()
        .filter(|g| g.importance == Importance::Helpful)
        .map(|g| g.field.assumption().to_owned())
        .collect();
    ResponsePlan { mode: ResponseMode::Assumed, assumptions, clarification: None }
}

#[cfg(test)]
#[path = "strategy_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `{{path}}` interpolation over completed node results.
//!
//! Total by construction: unresolvable paths expand to the empty string
//! and nothing here returns an error. Interpolation always runs against a
//! snapshot of results taken before the node executes.

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::Value;

use super::{NodeData, NodeResult};

/// Expand every `{{node.path}}` occurrence in `input`.
pub fn interpolate_str(input: &str, results: &BTreeMap<String, Value>) -> String {
    let Ok(re) = Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}") else {
        return input.to_owned();
    };
    re.replace_all(input, |caps: &regex::Captures<'_>| resolve(&caps[1], results))
        .into_owned()
}

/// Interpolate all string fields of a node's data, recursively.
pub fn interpolate_data(data: &NodeData, results: &BTreeMap<String, Value>) -> NodeData {
    let Ok(value) = serde_json::to_value(data) else {
        return data.clone();
    };
    let walked = interpolate_value(value, results);
    serde_json::from_value(walked).unwrap_or_else(|_| data.clone())
}

fn interpolate_value(value: Value, results: &BTreeMap<String, Value>) -> Value {
    match value {
        Value::String(s) => Value::String(interpolate_str(&s, results)),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| interpolate_value(v, results)).collect())
        }
        Value::Object(map) => Value::Object(
            map.into_iter().map(|(k, v)| (k, interpolate_value(v, results))).collect(),
        ),
        other => other,
    }
}

/// Resolve a dot chain rooted at a node id. Missing intermediates expand
/// to the empty string; objects render as JSON.
fn resolve(path: &str, results: &BTreeMap<String, Value>) -> String {
    let mut segments = path.split('.');
    let Some(node_id) = segments.next() else {
        return String::new();
    };
    let Some(mut current) = results.get(node_id) else {
        return String::new();
    };
    for segment in segments {
        match current.get(segment) {
            Some(next) => current = next,
            None => return String::new(),
        }
    }
    value_to_string(current)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Flatten completed results into the interpolation namespace: payload
/// fields plus `status` (and `error` when present) per node.
pub fn results_view(results: &BTreeMap<String, NodeResult>) -> BTreeMap<String, Value> {
    let mut view = BTreeMap::new();
    for (id, result) in results {
        let mut object = match &result.payload {
            Some(payload) => match serde_json::to_value(payload) {
                Ok(Value::Object(mut map)) => {
                    map.remove("kind");
                    map
                }
                _ => serde_json::Map::new(),
            },
            None => serde_json::Map::new(),
        };
        object.insert("status".to_owned(), Value::String(status_str(result).to_owned()));
        if let Some(ref error) = result.error {
            object.insert("error".to_owned(), Value::String(error.clone()));
        }
        view.insert(id.clone(), Value::Object(object));
    }
    view
}

fn status_str(result: &NodeResult) -> &'static str {
    match result.status {
        super::NodeStatus::Pending => "pending",
        super::NodeStatus::Running => "running",
        super::NodeStatus::Success => "success",
        super::NodeStatus::Failed => "failed",
        super::NodeStatus::Skipped => "skipped",
    }
}

#[cfg(test)]
#[path = "interpolate_tests.rs"]
mod tests;

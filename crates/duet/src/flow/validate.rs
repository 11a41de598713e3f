// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structural validation run before a flow is persisted.

use std::collections::{HashMap, HashSet};
use std::fmt;

use super::{Flow, Handle, NodeData};
use crate::error::ErrorCode;

/// A rejected graph. Saving is refused and nothing is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphInvalid {
    pub issues: Vec<String>,
}

impl fmt::Display for GraphInvalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", ErrorCode::GraphInvalid, self.issues.join("; "))
    }
}

impl std::error::Error for GraphInvalid {}

/// Non-fatal findings on an accepted graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub warnings: Vec<String>,
}

/// Validate flow structure: unique node ids, known edge endpoints, branch
/// handle discipline, and acyclicity (a flow is accepted iff a topological
/// order exists). Unreachable nodes are warned about, not rejected.
pub fn validate(flow: &Flow) -> Result<ValidationReport, GraphInvalid> {
    let mut issues = Vec::new();

    let mut ids = HashSet::new();
    for node in &flow.nodes {
        if !ids.insert(node.id.as_str()) {
            issues.push(format!("duplicate node id {:?}", node.id));
        }
    }

    for edge in &flow.edges {
        if !ids.contains(edge.source.as_str()) {
            issues.push(format!("edge {:?} references unknown source {:?}", edge.id, edge.source));
        }
        if !ids.contains(edge.target.as_str()) {
            issues.push(format!("edge {:?} references unknown target {:?}", edge.id, edge.target));
        }
    }

    // Branch nodes: at most one outgoing edge per handle. Everything else
    // emits only the default handle.
    let mut handle_seen: HashMap<(&str, Handle), u32> = HashMap::new();
    for edge in &flow.edges {
        *handle_seen.entry((edge.source.as_str(), edge.source_handle)).or_insert(0) += 1;
    }
    for node in &flow.nodes {
        match node.data {
            NodeData::Branch(_) => {
                for handle in [Handle::Default, Handle::True, Handle::False] {
                    if handle_seen.get(&(node.id.as_str(), handle)).copied().unwrap_or(0) > 1 {
                        issues.push(format!(
                            "branch node {:?} has more than one {handle:?} edge",
                            node.id
                        ));
                    }
                }
            }
            _ => {
                for handle in [Handle::True, Handle::False] {
                    if handle_seen.contains_key(&(node.id.as_str(), handle)) {
                        issues.push(format!(
                            "non-branch node {:?} emits a {handle:?} edge",
                            node.id
                        ));
                    }
                }
            }
        }
    }

    if let Some(cycle_node) = find_cycle(flow) {
        issues.push(format!("cycle through node {cycle_node:?}"));
    }

    if !issues.is_empty() {
        return Err(GraphInvalid { issues });
    }

    Ok(ValidationReport { warnings: unreachable_warnings(flow) })
}

/// DFS coloring; returns a node on a cycle if one exists.
fn find_cycle(flow: &Flow) -> Option<String> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &flow.edges {
        successors.entry(edge.source.as_str()).or_default().push(edge.target.as_str());
    }

    let mut color: HashMap<&str, Color> =
        flow.nodes.iter().map(|n| (n.id.as_str(), Color::White)).collect();

    // Iterative DFS with an explicit stack; gray marks the path in progress.
    for node in &flow.nodes {
        if color.get(node.id.as_str()) != Some(&Color::White) {
            continue;
        }
        let mut stack: Vec<(&str, usize)> = vec![(node.id.as_str(), 0)];
        color.insert(node.id.as_str(), Color::Gray);

        while let Some((current, next_child)) = stack.pop() {
            let children = successors.get(current).map(Vec::as_slice).unwrap_or(&[]);
            if let Some(&child) = children.get(next_child) {
                stack.push((current, next_child + 1));
                match color.get(child) {
                    Some(Color::Gray) => return Some(child.to_owned()),
                    Some(Color::White) => {
                        color.insert(child, Color::Gray);
                        stack.push((child, 0));
                    }
                    // Black or an unknown endpoint (already reported).
                    _ => {}
                }
            } else {
                color.insert(current, Color::Black);
            }
        }
    }
    None
}

/// Nodes not reachable from the entry set (zero in-degree nodes).
fn unreachable_warnings(flow: &Flow) -> Vec<String> {
    let mut indegree: HashMap<&str, u32> =
        flow.nodes.iter().map(|n| (n.id.as_str(), 0)).collect();
    let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &flow.edges {
        successors.entry(edge.source.as_str()).or_default().push(edge.target.as_str());
        if let Some(count) = indegree.get_mut(edge.target.as_str()) {
            *count += 1;
        }
    }

    let mut reached: HashSet<&str> = HashSet::new();
    let mut queue: Vec<&str> = indegree
        .iter()
        .filter(|(_, &count)| count == 0)
        .map(|(&id, _)| id)
        .collect();
    while let Some(id) = queue.pop() {
        if !reached.insert(id) {
            continue;
        }
        for &next in successors.get(id).map(Vec::as_slice).unwrap_or(&[]) {
            queue.push(next);
        }
    }

    flow.nodes
        .iter()
        .filter(|n| !reached.contains(n.id.as_str()))
        .map(|n| format!("node {:?} is unreachable from any entry node", n.id))
        .collect()
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;

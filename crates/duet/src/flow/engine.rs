// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DAG execution: readiness gating, fan-out/fan-in, branch routing,
//! cancellation, and terminal records.
//!
//! The scheduler owns the results map; node tasks hand their results back
//! as values over a channel. Independent ready nodes run concurrently and
//! a node never runs twice.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ErrorCode;

use super::exec::{execute_node, NodeDeps, NodeOutcome};
use super::interpolate;
use super::store::ExecutionStore;
use super::{
    Edge, ExecStatus, Execution, Flow, Handle, NodeData, NodePayload, NodeResult, NodeStatus,
};

/// Node and execution lifecycle events, in per-node order
/// `running → {success|failed|skipped}`, with exactly one terminal
/// execution event.
#[derive(Debug, Clone)]
pub enum ExecEvent {
    Node { execution_id: String, node_id: String, status: NodeStatus },
    Finished { execution_id: String, status: ExecStatus },
}

/// Workflow engine bound to a shell executor and an optional LLM.
pub struct Engine {
    deps: Arc<NodeDeps>,
    store: Option<ExecutionStore>,
    events_tx: broadcast::Sender<ExecEvent>,
    cancels: Mutex<HashMap<String, CancellationToken>>,
}

impl Engine {
    pub fn new(deps: NodeDeps) -> Self {
        let (events_tx, _) = broadcast::channel(256);
        Self { deps: Arc::new(deps), store: None, events_tx, cancels: Mutex::new(HashMap::new()) }
    }

    /// Persist completed executions into the given store.
    pub fn with_store(mut self, store: ExecutionStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecEvent> {
        self.events_tx.subscribe()
    }

    /// Flip a running execution to cancelled. Newly-ready nodes stop
    /// dispatching; the in-flight shell command is interrupted; late AI
    /// results are dropped.
    pub fn cancel(&self, execution_id: &str) -> bool {
        match self.cancels.lock().get(execution_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Run a flow to a terminal execution record.
    pub async fn run(&self, flow: &Flow, session_id: Option<String>) -> Execution {
        let execution_id = uuid::Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();
        self.cancels.lock().insert(execution_id.clone(), cancel.clone());

        let execution = self.drive(flow, &execution_id, session_id, &cancel).await;

        self.cancels.lock().remove(&execution_id);
        if let Some(ref store) = self.store {
            if let Err(e) = store.save(&execution) {
                warn!("failed to persist execution {execution_id}: {e}");
            }
        }
        let _ = self
            .events_tx
            .send(ExecEvent::Finished { execution_id, status: execution.status });
        execution
    }

    async fn drive(
        &self,
        flow: &Flow,
        execution_id: &str,
        session_id: Option<String>,
        cancel: &CancellationToken,
    ) -> Execution {
        let started_wall = now_ms();
        let mut results: BTreeMap<String, NodeResult> =
            flow.nodes.iter().map(|n| (n.id.clone(), NodeResult::pending())).collect();

        let nodes: HashMap<&str, &super::Node> =
            flow.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        let mut incoming: HashMap<&str, Vec<&Edge>> = HashMap::new();
        for edge in &flow.edges {
            incoming.entry(edge.target.as_str()).or_default().push(edge);
        }

        let entries: Vec<String> = flow
            .nodes
            .iter()
            .filter(|n| !incoming.contains_key(n.id.as_str()))
            .map(|n| n.id.clone())
            .collect();
        if entries.is_empty() {
            return Execution {
                id: execution_id.to_owned(),
                flow_id: flow.id.clone(),
                session_id,
                started_at: started_wall,
                ended_at: Some(now_ms()),
                status: ExecStatus::Failed,
                results,
                error: Some(ErrorCode::NoEntry.to_string()),
            };
        }

        let (done_tx, mut done_rx) = mpsc::channel::<(String, NodeResult)>(64);
        let mut running: HashSet<String> = HashSet::new();
        let mut dispatched: HashSet<String> = HashSet::new();
        let mut interrupt_sent = false;

        for id in &entries {
            self.dispatch(id, execution_id, &nodes, &mut results, &mut running, &mut dispatched, &done_tx);
        }
        self.settle(execution_id, flow, &nodes, &incoming, &mut results, &mut running, &mut dispatched, &done_tx, cancel);

        while !running.is_empty() {
            tokio::select! {
                received = done_rx.recv() => {
                    let Some((node_id, result)) = received else { break };
                    if cancel.is_cancelled()
                        && matches!(nodes.get(node_id.as_str()).map(|n| &n.data), Some(NodeData::Ai(_)))
                    {
                        // Late AI result after the flip — discard.
                        debug!("dropping AI result for {node_id} after cancellation");
                        self.record(execution_id, &node_id, skipped_result("cancelled"), &mut results);
                        running.remove(&node_id);
                        continue;
                    }
                    running.remove(&node_id);
                    self.record(execution_id, &node_id, result, &mut results);
                    self.settle(execution_id, flow, &nodes, &incoming, &mut results, &mut running, &mut dispatched, &done_tx, cancel);
                }
                _ = cancel.cancelled(), if !interrupt_sent => {
                    interrupt_sent = true;
                    self.deps.shell.interrupt().await;
                    // In-flight AI turns are left to complete detached;
                    // their nodes are settled as skipped right away.
                    let ai_in_flight: Vec<String> = running
                        .iter()
                        .filter(|id| {
                            matches!(nodes.get(id.as_str()).map(|n| &n.data), Some(NodeData::Ai(_)))
                        })
                        .cloned()
                        .collect();
                    for id in ai_in_flight {
                        running.remove(&id);
                        self.record(execution_id, &id, skipped_result("cancelled"), &mut results);
                    }
                }
            }
        }

        // Settle whatever never ran: cancelled executions skip the rest so
        // every node still gets exactly one terminal status.
        if cancel.is_cancelled() {
            let pending: Vec<String> = results
                .iter()
                .filter(|(_, r)| !r.status.is_terminal())
                .map(|(id, _)| id.clone())
                .collect();
            for id in pending {
                self.record(execution_id, &id, skipped_result("cancelled"), &mut results);
            }
        }

        let status = if cancel.is_cancelled() {
            ExecStatus::Cancelled
        } else if results.values().any(|r| r.status == NodeStatus::Failed) {
            ExecStatus::Failed
        } else {
            ExecStatus::Completed
        };

        Execution {
            id: execution_id.to_owned(),
            flow_id: flow.id.clone(),
            session_id,
            started_at: started_wall,
            ended_at: Some(now_ms()),
            status,
            results,
            error: None,
        }
    }

    /// Promote a node to running and spawn its task.
    #[allow(clippy::too_many_arguments)]
    fn dispatch(
        &self,
        node_id: &str,
        execution_id: &str,
        nodes: &HashMap<&str, &super::Node>,
        results: &mut BTreeMap<String, NodeResult>,
        running: &mut HashSet<String>,
        dispatched: &mut HashSet<String>,
        done_tx: &mpsc::Sender<(String, NodeResult)>,
    ) {
        let Some(node) = nodes.get(node_id) else { return };
        if !dispatched.insert(node_id.to_owned()) {
            return;
        }
        let started_at = now_ms();
        if let Some(result) = results.get_mut(node_id) {
            result.status = NodeStatus::Running;
            result.started_at = Some(started_at);
        }
        running.insert(node_id.to_owned());
        let _ = self.events_tx.send(ExecEvent::Node {
            execution_id: execution_id.to_owned(),
            node_id: node_id.to_owned(),
            status: NodeStatus::Running,
        });

        // Interpolate against a snapshot of already-complete results.
        let view = interpolate::results_view(results);
        let data = interpolate::interpolate_data(&node.data, &view);

        let deps = Arc::clone(&self.deps);
        let tx = done_tx.clone();
        let id = node_id.to_owned();
        tokio::spawn(async move {
            let clock = Instant::now();
            let outcome = execute_node(&data, &deps).await;
            let duration_ms = clock.elapsed().as_millis() as u64;
            let result = match outcome {
                NodeOutcome::Success(payload) => NodeResult {
                    status: NodeStatus::Success,
                    started_at: Some(started_at),
                    duration_ms: Some(duration_ms),
                    payload: Some(payload),
                    error: None,
                },
                NodeOutcome::Failure { reason, payload } => NodeResult {
                    status: NodeStatus::Failed,
                    started_at: Some(started_at),
                    duration_ms: Some(duration_ms),
                    payload,
                    error: Some(reason),
                },
            };
            let _ = tx.send((id, result)).await;
        });
    }

    fn record(
        &self,
        execution_id: &str,
        node_id: &str,
        result: NodeResult,
        results: &mut BTreeMap<String, NodeResult>,
    ) {
        let status = result.status;
        results.insert(node_id.to_owned(), result);
        let _ = self.events_tx.send(ExecEvent::Node {
            execution_id: execution_id.to_owned(),
            node_id: node_id.to_owned(),
            status,
        });
    }

    /// Re-evaluate readiness after a result lands, to a fixpoint: skips
    /// cascade through successors without re-entering dispatch.
    #[allow(clippy::too_many_arguments)]
    fn settle(
        &self,
        execution_id: &str,
        flow: &Flow,
        nodes: &HashMap<&str, &super::Node>,
        incoming: &HashMap<&str, Vec<&Edge>>,
        results: &mut BTreeMap<String, NodeResult>,
        running: &mut HashSet<String>,
        dispatched: &mut HashSet<String>,
        done_tx: &mpsc::Sender<(String, NodeResult)>,
        cancel: &CancellationToken,
    ) {
        loop {
            let mut changed = false;
            for node in &flow.nodes {
                let id = node.id.as_str();
                if dispatched.contains(id) {
                    continue;
                }
                if results.get(id).map(|r| r.status.is_terminal()).unwrap_or(false) {
                    continue;
                }
                let Some(edges) = incoming.get(id) else { continue };

                match gate_node(node, edges, nodes, results) {
                    GateState::Waiting => {}
                    GateState::Skip => {
                        // Mark dispatched so the skip is recorded once.
                        dispatched.insert(id.to_owned());
                        self.record(execution_id, id, skipped_result("upstream"), results);
                        changed = true;
                    }
                    GateState::Ready => {
                        if cancel.is_cancelled() {
                            // Newly-ready nodes check the execution status
                            // and exit without executing.
                            dispatched.insert(id.to_owned());
                            self.record(execution_id, id, skipped_result("cancelled"), results);
                            changed = true;
                        } else {
                            self.dispatch(id, execution_id, nodes, results, running, dispatched, done_tx);
                            changed = true;
                        }
                    }
                }
            }
            if !changed {
                break;
            }
        }
    }
}

enum GateState {
    Waiting,
    Ready,
    Skip,
}

/// Decide whether a node may run, must wait, or is skipped, from the
/// terminal statuses of its predecessors and branch routing.
fn gate_node(
    node: &super::Node,
    edges: &[&Edge],
    nodes: &HashMap<&str, &super::Node>,
    results: &BTreeMap<String, NodeResult>,
) -> GateState {
    for edge in edges {
        let Some(source) = results.get(edge.source.as_str()) else {
            return GateState::Waiting;
        };
        if !source.status.is_terminal() {
            return GateState::Waiting;
        }
        match source.status {
            NodeStatus::Skipped => return GateState::Skip,
            NodeStatus::Failed => {
                if !node.data.continue_on_error() {
                    return GateState::Skip;
                }
            }
            NodeStatus::Success => {
                if !handle_taken(edge, nodes, source) {
                    return GateState::Skip;
                }
            }
            NodeStatus::Pending | NodeStatus::Running => return GateState::Waiting,
        }
    }
    GateState::Ready
}

/// Branch routing: `true`/`false` edges only carry when the condition
/// matched; `default` always carries.
fn handle_taken(
    edge: &Edge,
    nodes: &HashMap<&str, &super::Node>,
    source: &NodeResult,
) -> bool {
    let is_branch =
        matches!(nodes.get(edge.source.as_str()).map(|n| &n.data), Some(NodeData::Branch(_)));
    if !is_branch {
        return true;
    }
    let condition = match &source.payload {
        Some(NodePayload::Branch { condition_result, .. }) => *condition_result,
        _ => false,
    };
    match edge.source_handle {
        Handle::Default => true,
        Handle::True => condition,
        Handle::False => !condition,
    }
}

fn skipped_result(reason: &str) -> NodeResult {
    NodeResult {
        status: NodeStatus::Skipped,
        started_at: None,
        duration_ms: None,
        payload: None,
        error: Some(reason.to_owned()),
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;

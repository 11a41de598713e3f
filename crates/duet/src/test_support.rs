// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for unit tests and the spec harness.

use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::pin::Pin;

use parking_lot::Mutex;

use crate::llm::{ChatMessage, LlmChat};
use crate::probe::{
    CommandRecord, ConfigFile, ContextSnapshot, EnvironmentInfo, ErrorRecord, GitInfo,
    ProjectInfo, ProjectKind, StateInfo,
};

/// Build context snapshots without running the real probe.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    project_kind: Option<ProjectKind>,
    errors: Vec<String>,
    commands: Vec<(String, Option<i32>)>,
    git: Option<GitInfo>,
    toolchain: BTreeMap<String, String>,
    files: Vec<String>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(mut self, kind: ProjectKind) -> Self {
        self.project_kind = Some(kind);
        self
    }

    pub fn recent_error(mut self, message: &str) -> Self {
        self.errors.push(message.to_owned());
        self
    }

    pub fn recent_command(mut self, command: &str, exit_code: Option<i32>) -> Self {
        self.commands.push((command.to_owned(), exit_code));
        self
    }

    pub fn git(mut self, has_changes: bool) -> Self {
        self.git = Some(GitInfo {
            branch: Some("main".to_owned()),
            has_changes,
            staged: 0,
            unstaged: u32::from(has_changes),
            untracked: 0,
            has_remote: true,
        });
        self
    }

    pub fn tool(mut self, name: &str, version: &str) -> Self {
        self.toolchain.insert(name.to_owned(), version.to_owned());
        self
    }

    pub fn file(mut self, name: &str) -> Self {
        self.files.push(name.to_owned());
        self
    }

    pub fn build(self) -> ContextSnapshot {
        let kind = self.project_kind.unwrap_or(ProjectKind::None);
        ContextSnapshot {
            environment: EnvironmentInfo {
                os: "linux".to_owned(),
                shell: "/bin/bash".to_owned(),
                cwd: "/work".to_owned(),
                user: "dev".to_owned(),
                hostname: "box".to_owned(),
            },
            toolchain: self.toolchain,
            project: ProjectInfo {
                kind,
                package_manager: None,
                framework: None,
                primary_language: None,
            },
            state: StateInfo {
                recent_commands: self
                    .commands
                    .into_iter()
                    .enumerate()
                    .map(|(i, (command, exit_code))| CommandRecord {
                        command,
                        exit_code,
                        at_ms: 1_000 + i as u64,
                    })
                    .collect(),
                recent_errors: self
                    .errors
                    .into_iter()
                    .enumerate()
                    .map(|(i, message)| ErrorRecord {
                        pattern: crate::intent::patterns::extract_error_pattern(&message)
                            .map(str::to_owned),
                        message,
                        at_ms: 2_000 + i as u64,
                    })
                    .collect(),
            },
            git: self.git,
            files: self
                .files
                .into_iter()
                .map(|name| ConfigFile { name, content: String::new(), truncated: false })
                .collect(),
            completeness: 0.5,
            gather_ms: 1,
        }
    }
}

pub mod flows {
    //! Flow fixtures for engine and validation tests.

    use crate::flow::{
        AiData, BranchData, Edge, FileData, FileOp, Flow, Handle, Node, NodeData, Position,
        ShellData,
    };

    pub fn shell_node(id: &str, command: &str) -> Node {
        node(
            id,
            NodeData::Shell(ShellData {
                command: command.to_owned(),
                timeout_ms: 10_000,
                cwd: None,
                continue_on_error: false,
            }),
        )
    }

    pub fn shell_node_continue(id: &str, command: &str) -> Node {
        let mut n = shell_node(id, command);
        if let NodeData::Shell(ref mut data) = n.data {
            data.continue_on_error = true;
        }
        n
    }

    pub fn ai_node(id: &str, prompt: &str) -> Node {
        node(
            id,
            NodeData::Ai(AiData {
                prompt: prompt.to_owned(),
                system_prompt: None,
                provider: None,
                model: None,
                continue_on_error: false,
            }),
        )
    }

    pub fn branch_node(id: &str, condition: &str) -> Node {
        node(id, NodeData::Branch(BranchData { condition: condition.to_owned() }))
    }

    pub fn file_node(id: &str, operation: FileOp, path: &str, content: Option<&str>) -> Node {
        node(
            id,
            NodeData::File(FileData {
                operation,
                file_path: path.to_owned(),
                content: content.map(str::to_owned),
                continue_on_error: false,
            }),
        )
    }

    pub fn node(id: &str, data: NodeData) -> Node {
        Node { id: id.to_owned(), data, position: Position::default() }
    }

    pub fn edge(source: &str, target: &str) -> Edge {
        edge_via(source, target, Handle::Default)
    }

    pub fn edge_via(source: &str, target: &str, source_handle: Handle) -> Edge {
        Edge {
            id: format!("{source}->{target}"),
            source: source.to_owned(),
            target: target.to_owned(),
            source_handle,
        }
    }

    pub fn flow(name: &str, nodes: Vec<Node>, edges: Vec<Edge>) -> Flow {
        Flow {
            id: format!("flow-{name}"),
            name: name.to_owned(),
            folder: None,
            nodes,
            edges,
            created_at: 0,
            updated_at: 0,
        }
    }
}

/// LLM double that replays canned replies, then errors when exhausted.
pub struct ScriptedChat {
    replies: Mutex<VecDeque<String>>,
    provider: String,
    model: String,
}

impl ScriptedChat {
    pub fn new<S: Into<String>>(replies: impl IntoIterator<Item = S>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            provider: "scripted".to_owned(),
            model: "scripted-1".to_owned(),
        }
    }
}

impl LlmChat for ScriptedChat {
    fn chat<'a>(
        &'a self,
        _messages: &'a [ChatMessage],
        _system: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            self.replies
                .lock()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("scripted replies exhausted"))
        })
    }

    fn provider(&self) -> &str {
        &self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }
}

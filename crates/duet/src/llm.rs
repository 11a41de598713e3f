// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External LLM capability seam.
//!
//! Providers live outside the core; everything here is the one method the
//! core needs. A session or engine holding no capability degrades
//! deterministically (AI nodes fail, refinement is skipped).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Object-safe chat capability: messages in, text out.
pub trait LlmChat: Send + Sync {
    fn chat<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        system: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>>;

    /// Provider name reported in AI node results.
    fn provider(&self) -> &str;

    /// Model name reported in AI node results.
    fn model(&self) -> &str;
}

pub type SharedLlm = Arc<dyn LlmChat>;

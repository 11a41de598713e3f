// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-category requirement tables and gap analysis.
//!
//! A field is satisfied by a fixed rule over the snapshot; unsatisfied
//! fields become gaps with canned prompt text, required before helpful.

use serde::{Deserialize, Serialize};

use crate::probe::ContextSnapshot;
use crate::probe::ProjectKind;

use super::Category;

/// Snapshot fields a category may need before a good answer is possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    ErrorOutput,
    ProjectKind,
    RecentCommands,
    GitState,
    Toolchain,
    ConfigFiles,
}

impl Field {
    /// Fixed satisfaction rule per field.
    pub fn satisfied(&self, snapshot: &ContextSnapshot) -> bool {
        match self {
            Self::ErrorOutput => !snapshot.state.recent_errors.is_empty(),
            Self::ProjectKind => snapshot.project.kind != ProjectKind::None,
            Self::RecentCommands => !snapshot.state.recent_commands.is_empty(),
            Self::GitState => snapshot.git.is_some(),
            Self::Toolchain => !snapshot.toolchain.is_empty(),
            Self::ConfigFiles => !snapshot.files.is_empty(),
        }
    }

    /// Canned clarification prompt for an unsatisfied field.
    pub fn prompt(&self) -> &'static str {
        match self {
            Self::ErrorOutput => "What error output are you seeing? Paste the exact message.",
            Self::ProjectKind => "What kind of project is this (node, python, rust, ...)?",
            Self::RecentCommands => "Which commands did you run before this happened?",
            Self::GitState => "Is this directory a git repository, and on which branch?",
            Self::Toolchain => "Which tool versions are involved (node --version, rustc --version, ...)?",
            Self::ConfigFiles => "Which configuration files does the project use?",
        }
    }

    /// Stated assumption used when answering despite the missing field.
    pub fn assumption(&self) -> &'static str {
        match self {
            Self::ErrorOutput => "Assuming the problem reproduces with the most recent command.",
            Self::ProjectKind => "Assuming a generic project layout; no project markers were found.",
            Self::RecentCommands => "Assuming no earlier commands changed the relevant state.",
            Self::GitState => "Assuming the directory is not under version control.",
            Self::Toolchain => "Assuming current stable tool versions.",
            Self::ConfigFiles => "Assuming default configuration.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Importance {
    Required,
    Helpful,
}

/// A missing piece of information for the selected category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gap {
    pub field: Field,
    pub importance: Importance,
    pub prompt: String,
}

/// The requirement table row for a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirements {
    pub required: Vec<Field>,
    pub helpful: Vec<Field>,
}

/// Fixed requirements per category.
pub fn requirements(category: Category) -> Requirements {
    use Field::*;
    let (required, helpful): (&[Field], &[Field]) = match category {
        Category::Installation => (&[ProjectKind], &[ErrorOutput, Toolchain]),
        Category::Configuration => (&[ConfigFiles], &[ProjectKind]),
        Category::Build => (&[ErrorOutput, ProjectKind], &[Toolchain, RecentCommands]),
        Category::Runtime => (&[ErrorOutput], &[RecentCommands, ProjectKind]),
        Category::Network => (&[ErrorOutput], &[RecentCommands]),
        Category::Permissions => (&[ErrorOutput], &[RecentCommands]),
        Category::Git => (&[GitState], &[RecentCommands]),
        Category::Docker => (&[ErrorOutput], &[ConfigFiles]),
        Category::Deployment => (&[ProjectKind], &[ConfigFiles, GitState]),
        Category::HowTo => (&[], &[ProjectKind]),
        Category::Optimization => (&[ProjectKind], &[Toolchain, RecentCommands]),
        Category::Debugging => (&[ErrorOutput], &[RecentCommands, ProjectKind]),
        Category::Unknown => (&[], &[]),
    };
    Requirements { required: required.to_vec(), helpful: helpful.to_vec() }
}

/// Compute ordered gaps for a category against a snapshot: unsatisfied
/// required fields first, helpful fields trailing.
pub fn analyze(category: Category, snapshot: &ContextSnapshot) -> (Requirements, Vec<Gap>) {
    let reqs = requirements(category);
    let mut gaps = Vec::new();
    for field in &reqs.required {
        if !field.satisfied(snapshot) {
            gaps.push(Gap {
                field: *field,
                importance: Importance::Required,
                prompt: field.prompt().to_owned(),
            });
        }
    }
    for field in &reqs.helpful {
        if !field.satisfied(snapshot) {
            gaps.push(Gap {
                field: *field,
                importance: Importance::Helpful,
                prompt: field.prompt().to_owned(),
            });
        }
    }
    (reqs, gaps)
}

#[cfg(test)]
#[path = "gaps_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectKind {
    Node,
    Python,
    Rust,
    Go,
    Ruby,
    Java,
    Docker,
    Terraform,
    Make,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub kind: ProjectKind,
    pub package_manager: Option<String>,
    pub framework: Option<String>,
    pub primary_language: Option<String>,
}

impl Default for ProjectInfo {
    fn default() -> Self {
        Self { kind: ProjectKind::None, package_manager: None, framework: None, primary_language: None }
    }
}

struct Marker {
    file: &'static str,
    kind: ProjectKind,
    package_manager: Option<&'static str>,
    language: Option<&'static str>,
}

/// Ordered detection table — the first marker file that exists wins.
const MARKERS: &[Marker] = &[
    Marker { file: "package.json", kind: ProjectKind::Node, package_manager: Some("npm"), language: Some("javascript") },
    Marker { file: "yarn.lock", kind: ProjectKind::Node, package_manager: Some("yarn"), language: Some("javascript") },
    Marker { file: "pnpm-lock.yaml", kind: ProjectKind::Node, package_manager: Some("pnpm"), language: Some("javascript") },
    Marker { file: "requirements.txt", kind: ProjectKind::Python, package_manager: Some("pip"), language: Some("python") },
    Marker { file: "pyproject.toml", kind: ProjectKind::Python, package_manager: Some("pip"), language: Some("python") },
    Marker { file: "Pipfile", kind: ProjectKind::Python, package_manager: Some("pipenv"), language: Some("python") },
    Marker { file: "Cargo.toml", kind: ProjectKind::Rust, package_manager: Some("cargo"), language: Some("rust") },
    Marker { file: "go.mod", kind: ProjectKind::Go, package_manager: Some("go"), language: Some("go") },
    Marker { file: "Gemfile", kind: ProjectKind::Ruby, package_manager: Some("bundler"), language: Some("ruby") },
    Marker { file: "build.gradle", kind: ProjectKind::Java, package_manager: Some("gradle"), language: Some("java") },
    Marker { file: "pom.xml", kind: ProjectKind::Java, package_manager: Some("maven"), language: Some("java") },
    Marker { file: "Dockerfile", kind: ProjectKind::Docker, package_manager: None, language: None },
    Marker { file: "docker-compose.yml", kind: ProjectKind::Docker, package_manager: None, language: None },
    Marker { file: "docker-compose.yaml", kind: ProjectKind::Docker, package_manager: None, language: None },
    Marker { file: "terraform.tf", kind: ProjectKind::Terraform, package_manager: None, language: Some("hcl") },
    Marker { file: "main.tf", kind: ProjectKind::Terraform, package_manager: None, language: Some("hcl") },
    Marker { file: "Makefile", kind: ProjectKind::Make, package_manager: None, language: None },
];

/// Frameworks recognized in `package.json` dependencies, checked in order.
const NODE_FRAMEWORKS: &[&str] = &["next", "nuxt", "react", "vue", "svelte", "express", "fastify"];

/// Detect the project in `cwd` from its marker files.
pub fn detect(cwd: &Path) -> ProjectInfo {
    for marker in MARKERS {
        if cwd.join(marker.file).is_file() {
            let framework = match marker.kind {
                ProjectKind::Node => node_framework(cwd),
                _ => None,
            };
            return ProjectInfo {
                kind: marker.kind,
                package_manager: marker.package_manager.map(str::to_owned),
                framework,
                primary_language: marker.language.map(str::to_owned),
            };
        }
    }
    ProjectInfo::default()
}

/// Best-effort framework hint from `package.json` dependency names.
fn node_framework(cwd: &Path) -> Option<String> {
    let text = std::fs::read_to_string(cwd.join("package.json")).ok()?;
    let json: serde_json::Value = serde_json::from_str(&text).ok()?;
    for section in ["dependencies", "devDependencies"] {
        if let Some(deps) = json.get(section).and_then(|d| d.as_object()) {
            for name in NODE_FRAMEWORKS {
                if deps.contains_key(*name) {
                    return Some((*name).to_owned());
                }
            }
        }
    }
    None
}

#[cfg(test)]
#[path = "project_tests.rs"]
mod tests;

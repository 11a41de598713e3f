// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::probe::ProjectKind;
use crate::test_support::{ScriptedChat, SnapshotBuilder};

fn classifier() -> Classifier {
    match Classifier::new() {
        Ok(c) => c,
        Err(e) => unreachable!("fixed tables must compile: {e}"),
    }
}

#[test]
fn npm_enoent_classifies_as_installation() {
    let snapshot = SnapshotBuilder::new().project(ProjectKind::Node).build();
    let label = classifier().classify("npm ERR! ENOENT node_modules", &snapshot);

    assert_eq!(label.category, Category::Installation);
    assert!(label.confidence >= 0.6, "confidence {}", label.confidence);
    assert!(!label.signals.is_empty());
    assert!(!label.refined);
}

#[test]
fn classification_is_deterministic() {
    let snapshot = SnapshotBuilder::new().project(ProjectKind::Node).build();
    let classifier = classifier();
    let first = classifier.classify("npm ERR! ENOENT node_modules", &snapshot);
    for _ in 0..5 {
        let again = classifier.classify("npm ERR! ENOENT node_modules", &snapshot);
        assert_eq!(again, first);
    }
}

#[test]
fn gibberish_is_unknown_with_zero_confidence() {
    let snapshot = SnapshotBuilder::new().build();
    let label = classifier().classify("qwzx blorple", &snapshot);
    assert_eq!(label.category, Category::Unknown);
    assert_eq!(label.confidence, 0.0);
    assert!(label.signals.is_empty());
}

#[test]
fn git_category_boosted_by_dirty_tree() {
    let clean = SnapshotBuilder::new().git(false).build();
    let dirty = SnapshotBuilder::new().git(true).build();
    let classifier = classifier();

    let on_clean = classifier.classify("how do I undo the last git commit", &clean);
    let on_dirty = classifier.classify("how do I undo the last git commit", &dirty);
    assert_eq!(on_dirty.category, Category::Git);
    if on_clean.category == Category::Git && on_clean.confidence < 1.0 {
        assert!(on_dirty.confidence >= on_clean.confidence);
    }
}

#[test]
fn recent_error_in_snapshot_feeds_scoring() {
    let snapshot = SnapshotBuilder::new()
        .recent_error("connect ECONNREFUSED 127.0.0.1:5432")
        .build();
    let label = classifier().classify("the connection keeps failing", &snapshot);
    assert_eq!(label.category, Category::Network);
    assert!(label.signals.iter().any(|s| s.starts_with("recent-error:")));
}

#[test]
fn how_to_without_errors_stays_how_to() {
    let snapshot = SnapshotBuilder::new().build();
    let label = classifier().classify("how do I list files sorted by size", &snapshot);
    assert_eq!(label.category, Category::HowTo);
}

#[tokio::test]
async fn high_confidence_skips_refinement() {
    let snapshot = SnapshotBuilder::new().project(ProjectKind::Node).build();
    // The scripted reply would change the category; it must not be consulted.
    let llm = ScriptedChat::new([r#"{"category": "docker", "confidence": 0.9, "signals": []}"#]);
    let label = classifier()
        .classify_refined("npm ERR! ENOENT node_modules", &snapshot, Some(&llm), 0.5)
        .await;
    assert_eq!(label.category, Category::Installation);
    assert!(!label.refined);
}

#[tokio::test]
async fn low_confidence_refines_through_llm() {
    let snapshot = SnapshotBuilder::new().build();
    let llm = ScriptedChat::new(
        [r#"{"category": "docker", "confidence": 0.8, "signals": ["mentions containers"]}"#],
    );
    let label = classifier().classify_refined("why", &snapshot, Some(&llm), 0.9).await;
    assert_eq!(label.category, Category::Docker);
    assert!(label.refined);
    assert!((label.confidence - 0.8).abs() < f64::EPSILON);
}

#[tokio::test]
async fn refinement_without_llm_keeps_pattern_label() {
    let snapshot = SnapshotBuilder::new().build();
    let classifier = classifier();
    let plain = classifier.classify("why", &snapshot);
    let refined = classifier.classify_refined("why", &snapshot, None, 0.9).await;
    assert_eq!(refined, plain);
}

#[test]
fn category_parse_covers_closed_set() {
    assert_eq!(Category::parse("how-to"), Some(Category::HowTo));
    assert_eq!(Category::parse(" GIT "), Some(Category::Git));
    assert_eq!(Category::parse("telepathy"), None);
}

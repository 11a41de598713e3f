// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn decodes_a_complete_sequence() {
    let mut scanner = Osc7Scanner::new();
    let paths = scanner.scan(b"\x1b]7;file://myhost/home/dev\x07");
    assert_eq!(paths, vec!["/home/dev".to_owned()]);
}

#[test]
fn decodes_st_terminated_sequence() {
    let mut scanner = Osc7Scanner::new();
    let paths = scanner.scan(b"\x1b]7;file://h/tmp\x1b\\rest");
    assert_eq!(paths, vec!["/tmp".to_owned()]);
}

#[test]
fn empty_host_is_accepted() {
    let mut scanner = Osc7Scanner::new();
    let paths = scanner.scan(b"\x1b]7;file:///var/log\x07");
    assert_eq!(paths, vec!["/var/log".to_owned()]);
}

#[test]
fn percent_encoded_path_is_decoded() {
    let mut scanner = Osc7Scanner::new();
    let paths = scanner.scan(b"\x1b]7;file://h/home/dev/my%20project\x07");
    assert_eq!(paths, vec!["/home/dev/my project".to_owned()]);
}

#[test]
fn sequence_split_across_chunks() {
    let mut scanner = Osc7Scanner::new();
    assert!(scanner.scan(b"before \x1b]7;file://h/ho").is_empty());
    let paths = scanner.scan(b"me/dev\x07 after");
    assert_eq!(paths, vec!["/home/dev".to_owned()]);
}

#[test]
fn prefix_split_at_escape_byte() {
    let mut scanner = Osc7Scanner::new();
    assert!(scanner.scan(b"output\x1b").is_empty());
    let paths = scanner.scan(b"]7;file://h/etc\x07");
    assert_eq!(paths, vec!["/etc".to_owned()]);
}

#[test]
fn multiple_sequences_in_one_chunk() {
    let mut scanner = Osc7Scanner::new();
    let paths = scanner.scan(b"\x1b]7;file://h/a\x07mid\x1b]7;file://h/b\x07");
    assert_eq!(paths, vec!["/a".to_owned(), "/b".to_owned()]);
}

#[test]
fn other_osc_sequences_are_ignored() {
    let mut scanner = Osc7Scanner::new();
    assert!(scanner.scan(b"\x1b]0;title\x07plain output").is_empty());
}

#[test]
fn malformed_body_is_skipped() {
    let mut scanner = Osc7Scanner::new();
    // No file:// scheme — sequence consumed, nothing reported.
    assert!(scanner.scan(b"\x1b]7;gopher://h/a\x07").is_empty());
    // Scanner still works afterwards.
    let paths = scanner.scan(b"\x1b]7;file://h/ok\x07");
    assert_eq!(paths, vec!["/ok".to_owned()]);
}

#[test]
fn runaway_unterminated_sequence_is_dropped() {
    let mut scanner = Osc7Scanner::new();
    assert!(scanner.scan(b"\x1b]7;file://h/").is_empty());
    let filler = vec![b'x'; 8192];
    assert!(scanner.scan(&filler).is_empty());
    // Buffer was abandoned; new sequences still decode.
    let paths = scanner.scan(b"\x1b]7;file://h/fresh\x07");
    assert_eq!(paths, vec!["/fresh".to_owned()]);
}

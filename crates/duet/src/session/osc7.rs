// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Incremental scanner for OSC-7 working-directory reports.
//!
//! The only control sequence the session interprets:
//! `ESC ] 7 ; file://<host><path> BEL` (or ST-terminated). Sequences may be
//! split across PTY read chunks, so the scanner carries unterminated
//! prefixes between calls.

const ESC: u8 = 0x1b;
const BEL: u8 = 0x07;

const OSC7_PREFIX: &[u8] = b"\x1b]7;";

/// Longest unterminated sequence carried between chunks before giving up.
const MAX_PENDING: usize = 4096;

#[derive(Debug, Default)]
pub struct Osc7Scanner {
    pending: Vec<u8>,
}

impl Osc7Scanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns decoded paths for every complete OSC-7
    /// sequence seen, in order.
    pub fn scan(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut paths = Vec::new();

        loop {
            let Some(start) = find_osc7_start(&self.pending) else {
                // Keep only a partial prefix at the very end of the buffer.
                let keep = partial_prefix_len(&self.pending);
                let drop = self.pending.len() - keep;
                self.pending.drain(..drop);
                return paths;
            };

            match find_terminator(&self.pending[start..]) {
                Some((body_end, term_len)) => {
                    let body = &self.pending[start + OSC7_PREFIX.len()..start + body_end];
                    if let Some(path) = decode_osc7_body(body) {
                        paths.push(path);
                    }
                    self.pending.drain(..start + body_end + term_len);
                }
                None => {
                    // Unterminated: hold from the sequence start for the
                    // next chunk, bounded.
                    self.pending.drain(..start);
                    if self.pending.len() > MAX_PENDING {
                        self.pending.clear();
                    }
                    return paths;
                }
            }
        }
    }
}

fn find_osc7_start(buf: &[u8]) -> Option<usize> {
    buf.windows(OSC7_PREFIX.len()).position(|w| w == OSC7_PREFIX)
}

/// Find the end of the sequence body relative to the sequence start.
/// Returns (body end offset, terminator length).
fn find_terminator(buf: &[u8]) -> Option<(usize, usize)> {
    for (i, &b) in buf.iter().enumerate().skip(OSC7_PREFIX.len()) {
        if b == BEL {
            return Some((i, 1));
        }
        if b == ESC && buf.get(i + 1) == Some(&b'\\') {
            return Some((i, 2));
        }
    }
    None
}

/// How many trailing bytes look like the beginning of an OSC-7 prefix.
fn partial_prefix_len(buf: &[u8]) -> usize {
    for take in (1..OSC7_PREFIX.len()).rev() {
        if buf.len() >= take && buf[buf.len() - take..] == OSC7_PREFIX[..take] {
            return take;
        }
    }
    0
}

/// Decode `file://<host><path>` into a percent-decoded absolute path.
fn decode_osc7_body(body: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(body).ok()?;
    let rest = text.strip_prefix("file://")?;
    // Host (possibly empty) runs to the first slash.
    let path_start = rest.find('/')?;
    Some(percent_decode(&rest[path_start..]))
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(v) = u8::from_str_radix(&s[i + 1..i + 3], 16) {
                out.push(v);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
#[path = "osc7_tests.rs"]
mod tests;

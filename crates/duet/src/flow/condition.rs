// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restricted branch-condition evaluator.
//!
//! Deliberately not an expression language: a fixed list of patterns is
//! tried in order and the first match wins, so evaluation is total and
//! bounded, and interpolated strings cannot inject code. Operands ending
//! in `.length` are left for the length pattern.

use regex::Regex;
use tracing::debug;

use crate::error::ErrorCode;

/// Outcome of evaluating one condition string.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub result: bool,
    /// The condition as evaluated (after interpolation).
    pub evaluated: String,
}

/// Compiled pattern list. Evaluation never fails; an unmatchable input
/// falls through to truthiness of the whole string.
#[derive(Debug)]
pub struct ConditionEvaluator {
    equality: Regex,
    ordering: Regex,
    containment: Regex,
    length: Regex,
}

impl ConditionEvaluator {
    pub fn compile() -> anyhow::Result<Self> {
        Ok(Self {
            equality: Regex::new(r"(?s)^(.*?)\s*(===|!==|==|!=)\s*(.*)$")?,
            ordering: Regex::new(r"(?s)^(.*?)\s*(>=|<=|>|<)\s*(.*)$")?,
            containment: Regex::new(
                r#"(?s)^(.*?)\.(includes|startsWith|endsWith)\(\s*(?:"([^"]*)"|'([^']*)')\s*\)\s*$"#,
            )?,
            length: Regex::new(r"(?s)^(.*?)\.length\s*(===|!==|>=|<=|>|<)\s*(-?\d+)\s*$")?,
        })
    }

    /// Evaluate an interpolated condition string to a boolean.
    pub fn evaluate(&self, condition: &str) -> Evaluation {
        let evaluated = condition.to_owned();
        let result = self.eval_bool(condition);
        Evaluation { result, evaluated }
    }

    fn eval_bool(&self, condition: &str) -> bool {
        let trimmed = condition.trim();
        if trimmed.is_empty() {
            debug!(code = %ErrorCode::EvaluatorUnknown, "empty branch condition treated as false");
            return false;
        }

        // 1. Binary (in)equality.
        if let Some(caps) = self.equality.captures(trimmed) {
            let (lhs, op, rhs) = (&caps[1], &caps[2], &caps[3]);
            if !defers_to_length(lhs) {
                let eq = terms_equal(&parse_term(lhs), &parse_term(rhs));
                return match op {
                    "===" | "==" => eq,
                    _ => !eq,
                };
            }
        }

        // 2. Ordering.
        if let Some(caps) = self.ordering.captures(trimmed) {
            let (lhs, op, rhs) = (&caps[1], &caps[2], &caps[3]);
            if !defers_to_length(lhs) {
                return compare_terms(&parse_term(lhs), &parse_term(rhs), op);
            }
        }

        // 3. Containment.
        if let Some(caps) = self.containment.captures(trimmed) {
            let subject = term_string(&parse_term(&caps[1]));
            let needle = caps.get(3).or_else(|| caps.get(4)).map(|m| m.as_str()).unwrap_or("");
            return match &caps[2] {
                "includes" => subject.contains(needle),
                "startsWith" => subject.starts_with(needle),
                _ => subject.ends_with(needle),
            };
        }

        // 4. Length comparison.
        if let Some(caps) = self.length.captures(trimmed) {
            let length = term_string(&parse_term(&caps[1])).chars().count() as i64;
            let Ok(expected) = caps[3].parse::<i64>() else {
                return false;
            };
            return match &caps[2] {
                "===" => length == expected,
                "!==" => length != expected,
                ">" => length > expected,
                "<" => length < expected,
                ">=" => length >= expected,
                _ => length <= expected,
            };
        }

        // 5. Truthiness of the bare expression.
        truthy(&parse_term(trimmed))
    }
}

/// `x.length == 3` must reach the length pattern even though the generic
/// operator patterns also match it.
fn defers_to_length(lhs: &str) -> bool {
    lhs.trim_end().ends_with(".length")
}

#[derive(Debug, Clone, PartialEq)]
enum Term {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
}

fn parse_term(raw: &str) -> Term {
    let t = raw.trim();
    if t.len() >= 2 {
        let bytes = t.as_bytes();
        if (bytes[0] == b'"' && bytes[t.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[t.len() - 1] == b'\'')
        {
            return Term::Str(t[1..t.len() - 1].to_owned());
        }
    }
    match t {
        "true" => return Term::Bool(true),
        "false" => return Term::Bool(false),
        "null" | "undefined" => return Term::Null,
        _ => {}
    }
    if let Ok(n) = t.parse::<f64>() {
        return Term::Num(n);
    }
    // Unquoted bare token.
    Term::Str(t.to_owned())
}

fn term_string(term: &Term) -> String {
    match term {
        Term::Str(s) => s.clone(),
        Term::Num(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                n.to_string()
            }
        }
        Term::Bool(b) => b.to_string(),
        Term::Null => "null".to_owned(),
    }
}

fn as_number(term: &Term) -> Option<f64> {
    match term {
        Term::Num(n) => Some(*n),
        Term::Str(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Numeric when both sides are numbers, string comparison otherwise.
fn terms_equal(lhs: &Term, rhs: &Term) -> bool {
    if let (Some(a), Some(b)) = (as_number(lhs), as_number(rhs)) {
        return a == b;
    }
    term_string(lhs) == term_string(rhs)
}

fn compare_terms(lhs: &Term, rhs: &Term, op: &str) -> bool {
    if let (Some(a), Some(b)) = (as_number(lhs), as_number(rhs)) {
        return match op {
            ">" => a > b,
            "<" => a < b,
            ">=" => a >= b,
            _ => a <= b,
        };
    }
    let (a, b) = (term_string(lhs), term_string(rhs));
    match op {
        ">" => a > b,
        "<" => a < b,
        ">=" => a >= b,
        _ => a <= b,
    }
}

fn truthy(term: &Term) -> bool {
    match term {
        Term::Str(s) => {
            let t = s.trim();
            !(t.is_empty() || t == "false" || t == "0" || t == "null" || t == "undefined")
        }
        Term::Num(n) => *n != 0.0 && !n.is_nan(),
        Term::Bool(b) => *b,
        Term::Null => false,
    }
}

#[cfg(test)]
#[path = "condition_tests.rs"]
mod tests;

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! A small JSONPath subset for asserting on rendered objects.
//!
//! Supported: dotted keys (`spec.replicas`, with `\.` escaping a literal dot),
//! quoted keys (`['app.kubernetes.io/name']`), indices (`containers[0]`) and
//! equality filters (`volumes[?(@.name=='keystore')]`). A surrounding `{...}`
//! and a leading `$.` are accepted and ignored.

use crate::error::{BootstrapError, Result};
use serde_json::Value;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
    Filter { field: Vec<String>, value: String },
}

/// A parsed selector, reusable across documents
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    segments: Vec<Segment>,
}

impl FromStr for Selector {
    type Err = BootstrapError;

    fn from_str(selector: &str) -> Result<Self> {
        let invalid = |reason: &str| {
            BootstrapError::InvalidArgument(format!("invalid selector '{}': {}", selector, reason))
        };

        let mut path = selector.trim();
        if let Some(inner) = path.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
            path = inner.trim();
        }
        path = path.strip_prefix('$').unwrap_or(path);
        path = path.strip_prefix('.').unwrap_or(path);

        let chars: Vec<char> = path.chars().collect();
        let mut segments = Vec::new();
        let mut key = String::new();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '\\' if i + 1 < chars.len() => {
                    key.push(chars[i + 1]);
                    i += 2;
                }
                '.' => {
                    flush_key(&mut key, &mut segments);
                    i += 1;
                }
                '[' => {
                    flush_key(&mut key, &mut segments);
                    let close = closing_bracket(&chars, i).ok_or_else(|| invalid("unclosed '['"))?;
                    let inner: String = chars[i + 1..close].iter().collect();
                    segments.push(parse_bracket(inner.trim()).map_err(|reason| invalid(&reason))?);
                    i = close + 1;
                }
                c => {
                    key.push(c);
                    i += 1;
                }
            }
        }
        flush_key(&mut key, &mut segments);

        if segments.is_empty() {
            return Err(invalid("empty path"));
        }
        Ok(Self { segments })
    }
}

impl Selector {
    /// Resolve the selector against one document
    pub fn find<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(document, |current, segment| match segment {
                Segment::Key(key) => current.get(key.as_str()),
                Segment::Index(index) => current.get(*index),
                Segment::Filter { field, value } => current.as_array()?.iter().find(|item| {
                    lookup(item, field).is_some_and(|v| scalar_string(v) == *value)
                }),
            })
    }
}

fn flush_key(key: &mut String, segments: &mut Vec<Segment>) {
    if !key.is_empty() {
        segments.push(Segment::Key(std::mem::take(key)));
    }
}

/// Position of the `]` closing the bracket opened at `open`; filters close with `)]`
/// Index of the `]` closing the bracket at `open`; quoted text is skipped
fn closing_bracket(chars: &[char], open: usize) -> Option<usize> {
    let filter = chars.get(open + 1) == Some(&'?');
    let mut quote: Option<char> = None;
    for i in open + 1..chars.len() {
        match (quote, chars[i]) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, c @ ('\'' | '"')) => quote = Some(c),
            (None, ']') if !filter || chars[i - 1] == ')' => return Some(i),
            _ => {}
        }
    }
    None
}

fn parse_bracket(inner: &str) -> std::result::Result<Segment, String> {
    if let Some(expression) = inner.strip_prefix('?') {
        let expression = expression
            .trim()
            .strip_prefix('(')
            .and_then(|e| e.strip_suffix(')'))
            .ok_or("filter must be written as ?(...)")?;
        let (lhs, rhs) = expression
            .split_once("==")
            .ok_or("only '==' filters are supported")?;
        let field = lhs
            .trim()
            .strip_prefix("@.")
            .ok_or("filter must start with '@.'")?;
        return Ok(Segment::Filter {
            field: field.split('.').map(str::to_string).collect(),
            value: unquote(rhs.trim()).to_string(),
        });
    }

    if inner.starts_with('\'') || inner.starts_with('"') {
        return Ok(Segment::Key(unquote(inner).to_string()));
    }

    inner
        .parse::<usize>()
        .map(Segment::Index)
        .map_err(|_| format!("unsupported bracket expression '{}'", inner))
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| s.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
        .unwrap_or(s)
}

fn lookup<'a>(value: &'a Value, field: &[String]) -> Option<&'a Value> {
    field
        .iter()
        .try_fold(value, |current, key| current.get(key.as_str()))
}

/// String form used for comparisons: strings as-is, other values as JSON
pub fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Parse `selector` and resolve it against `document`
pub fn select<'a>(document: &'a Value, selector: &str) -> Result<Option<&'a Value>> {
    Ok(selector.parse::<Selector>()?.find(document))
}

/// Resolve `selector` against the first document in which it exists
pub fn select_first<'a>(documents: &'a [Value], selector: &str) -> Result<Option<&'a Value>> {
    let selector: Selector = selector.parse()?;
    Ok(documents.iter().find_map(|document| selector.find(document)))
}

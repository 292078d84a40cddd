// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Differential Response Analyzer
 * Structural JSON comparison with key pruning, hash/length fallbacks
 *
 * Two JSON bodies are compared structurally after pruning the configured
 * ignore keys at every nesting depth; a parse failure degrades to a
 * normalized content-hash comparison, and non-JSON bodies degrade to a raw
 * byte-length comparison.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

/// Cheap JSON sniff: trimmed text delimited by matching braces/brackets.
pub fn looks_like_json(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 2 {
        return false;
    }
    let first = t.chars().next();
    let last = t.chars().next_back();
    matches!(
        (first, last),
        (Some('{'), Some('}')) | (Some('['), Some(']'))
    )
}

/// Drops ignored keys (case-sensitive) from objects at any depth; arrays
/// recurse element-wise, scalars pass through unchanged.
pub fn prune_ignored_json_keys(node: Value, ignore: &HashSet<String>) -> Value {
    if ignore.is_empty() {
        return node;
    }
    match node {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| !ignore.contains(key))
                .map(|(key, child)| (key, prune_ignored_json_keys(child, ignore)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| prune_ignored_json_keys(item, ignore))
                .collect(),
        ),
        scalar => scalar,
    }
}

/// Decides whether two response bodies are materially different.
pub fn responses_different(a_body: &str, b_body: &str, ignored_keys: &HashSet<String>) -> bool {
    if looks_like_json(a_body) && looks_like_json(b_body) {
        match (
            serde_json::from_str::<Value>(a_body),
            serde_json::from_str::<Value>(b_body),
        ) {
            (Ok(a), Ok(b)) => {
                let a = prune_ignored_json_keys(a, ignored_keys);
                let b = prune_ignored_json_keys(b, ignored_keys);
                return a != b;
            }
            _ => {
                debug!("json sniff matched but parse failed, falling back to hash compare");
                return stable_body_hash(a_body) != stable_body_hash(b_body);
            }
        }
    }
    a_body.len() != b_body.len()
}

/// Fast equality-only hash; leading/trailing whitespace is the only
/// normalization, so whitespace-only reformatting reads as "same".
pub fn stable_body_hash(body: &str) -> String {
    let norm = body.trim();
    let mut h: i32 = 1125899907;
    for c in norm.chars() {
        h = h.wrapping_mul(16777619) ^ (c as i32);
    }
    format!("{:x}", h as u32)
}

/// Case-insensitive any-substring check against pre-lowercased needles.
pub fn contains_any_ignore_case(haystack: &str, needles_lower: &[String]) -> bool {
    if needles_lower.is_empty() {
        return false;
    }
    let lower = haystack.to_lowercase();
    needles_lower.iter().any(|needle| lower.contains(needle))
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Identifier Groups
 * Operator-curated identifier sets and dummy-value generation
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

static UUID_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("valid uuid pattern")
});

/// Inferred shape of a group's identifiers, used only to generate a
/// same-shape dummy value that is never a member of the real set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupType {
    Numeric,
    Alpha,
    #[default]
    Alphanum,
    Uuid,
}

impl GroupType {
    /// Scans all members: all-digits wins, then all-letters, then
    /// all-UUID-shaped, then all-alphanumeric; anything mixed falls back to
    /// alphanumeric, as does an empty group.
    pub fn infer<'a, I>(values: I) -> GroupType
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut any = false;
        let mut all_numeric = true;
        let mut all_alpha = true;
        let mut all_alnum = true;
        let mut all_uuid = true;
        for v in values {
            any = true;
            if v.is_empty() || !v.chars().all(|c| c.is_ascii_digit()) {
                all_numeric = false;
            }
            if v.is_empty() || !v.chars().all(|c| c.is_ascii_alphabetic()) {
                all_alpha = false;
            }
            if v.is_empty() || !v.chars().all(|c| c.is_ascii_alphanumeric()) {
                all_alnum = false;
            }
            if !UUID_SHAPE.is_match(v) {
                all_uuid = false;
            }
        }
        if !any {
            return GroupType::Alphanum;
        }
        if all_uuid {
            GroupType::Uuid
        } else if all_numeric {
            GroupType::Numeric
        } else if all_alpha {
            GroupType::Alpha
        } else {
            GroupType::Alphanum
        }
    }

    /// Generates a random value with the same shape and length as `like`.
    /// UUIDs ignore the template length and are always a fresh random v4.
    pub fn generate_dummy(&self, like: &str) -> String {
        let len = if like.is_empty() {
            8
        } else {
            like.chars().count()
        };
        let mut rng = rand::rng();
        match self {
            GroupType::Uuid => Uuid::new_v4().to_string(),
            GroupType::Numeric => (0..len)
                .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
                .collect(),
            GroupType::Alpha => {
                const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
                (0..len)
                    .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
                    .collect()
            }
            GroupType::Alphanum => {
                const ALPHABET: &[u8] =
                    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
                (0..len)
                    .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
                    .collect()
            }
        }
    }
}

/// A named set of real identifiers believed to belong to distinct
/// principals. Insertion order is preserved so substitution order is
/// deterministic; the inferred type is recomputed on every membership
/// change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdGroup {
    pub name: String,
    ids: Vec<String>,
    #[serde(default)]
    group_type: GroupType,
}

impl IdGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ids: Vec::new(),
            group_type: GroupType::Alphanum,
        }
    }

    pub fn from_ids<I, S>(name: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut group = Self::new(name);
        for id in ids {
            group.add_id(id);
        }
        group
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn group_type(&self) -> GroupType {
        self.group_type
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Adds an id, ignoring blanks and duplicates.
    pub fn add_id(&mut self, id: impl Into<String>) {
        let id = id.into().trim().to_string();
        if id.is_empty() || self.ids.iter().any(|existing| *existing == id) {
            return;
        }
        self.ids.push(id);
        self.recalculate_type();
    }

    pub fn remove_id(&mut self, id: &str) {
        self.ids.retain(|existing| existing != id);
        self.recalculate_type();
    }

    pub fn recalculate_type(&mut self) {
        self.group_type = GroupType::infer(self.ids.iter().map(String::as_str));
    }

    /// A fresh dummy shaped like `like` but never a member of the group.
    pub fn generate_dummy_like(&self, like: &str) -> String {
        loop {
            let dummy = self.group_type.generate_dummy(like);
            if !self.ids.iter().any(|id| *id == dummy) {
                return dummy;
            }
        }
    }
}

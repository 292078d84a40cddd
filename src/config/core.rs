// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use std::collections::{BTreeSet, HashMap, HashSet};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::config::groups::IdGroup;
use crate::errors::EngineError;
use crate::http::ParameterKind;

/// How scan-dedup keys are composed.
///
/// `Strict` keys on the request shape alone; `ContentAware` additionally
/// folds in a signature of the base response, so a changed backend response
/// reopens scanning for an otherwise-identical request shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DedupMode {
    #[default]
    Strict,
    ContentAware,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EngineSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Substrings whose presence in a test response vetoes a finding
    /// (matched case-insensitively).
    #[serde(default)]
    pub denied_strings: Vec<String>,

    /// Parameter names to skip per location kind, stored lowercase.
    #[serde(default)]
    pub ignored_parameters: HashMap<ParameterKind, BTreeSet<String>>,

    /// Header names to skip, stored lowercase.
    #[serde(default = "default_ignored_headers")]
    pub ignored_headers: Vec<String>,

    /// JSON keys pruned before structural comparison (case-sensitive).
    #[serde(default)]
    pub ignored_json_keys: Vec<String>,

    /// Static-asset path extensions, dot-prefixed and lowercase.
    #[serde(default = "default_skip_extensions")]
    pub skip_extensions: Vec<String>,

    /// Regexes excluding whole paths from scanning.
    #[serde(default)]
    pub path_exclude_regex: Vec<String>,

    /// Soft cap per outbound send; 0 disables the bound.
    #[validate(range(max = 600_000))]
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[validate(range(max = 60_000))]
    #[serde(default)]
    pub delay_ms_between_mutations: u64,

    #[validate(range(min = 1))]
    #[serde(default = "default_max_mutations_per_base")]
    pub max_mutations_per_base: usize,

    #[validate(range(min = 1, max = 256))]
    #[serde(default = "default_max_parallel_mutations")]
    pub max_parallel_mutations: usize,

    #[serde(default)]
    pub dedup_mode: DedupMode,

    #[serde(default = "default_dedup_ttl_ms")]
    pub dedup_ttl_ms: i64,

    #[validate(range(min = 100))]
    #[serde(default = "default_dedup_lru_max")]
    pub dedup_lru_max: usize,

    #[serde(default)]
    pub id_groups: Vec<IdGroup>,
}

fn default_true() -> bool {
    true
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_max_mutations_per_base() -> usize {
    20
}

fn default_max_parallel_mutations() -> usize {
    4
}

fn default_dedup_ttl_ms() -> i64 {
    12 * 60 * 60 * 1000
}

fn default_dedup_lru_max() -> usize {
    20_000
}

fn default_ignored_headers() -> Vec<String> {
    [
        "host",
        "cookie",
        "content-length",
        "sec-ch-ua-platform",
        "sec-ch-ua",
        "sec-ch-ua-mobile",
        "content-type",
        "user-agent",
        "accept",
        "origin",
        "sec-fetch-site",
        "sec-fetch-mode",
        "sec-fetch-dest",
        "referer",
        "accept-encoding",
        "priority",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_skip_extensions() -> Vec<String> {
    [
        ".gif", ".jpg", ".png", ".ico", ".css", ".woff", ".woff2", ".ttf", ".svg",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            denied_strings: Vec::new(),
            ignored_parameters: HashMap::new(),
            ignored_headers: default_ignored_headers(),
            ignored_json_keys: Vec::new(),
            skip_extensions: default_skip_extensions(),
            path_exclude_regex: Vec::new(),
            request_timeout_ms: default_request_timeout_ms(),
            delay_ms_between_mutations: 0,
            max_mutations_per_base: default_max_mutations_per_base(),
            max_parallel_mutations: default_max_parallel_mutations(),
            dedup_mode: DedupMode::default(),
            dedup_ttl_ms: default_dedup_ttl_ms(),
            dedup_lru_max: default_dedup_lru_max(),
            id_groups: Vec::new(),
        }
    }
}

impl EngineSettings {
    pub fn is_param_ignored(&self, kind: ParameterKind, name: &str) -> bool {
        self.ignored_parameters
            .get(&kind)
            .is_some_and(|names| names.contains(&name.trim().to_lowercase()))
    }

    pub fn is_header_ignored(&self, name: &str) -> bool {
        let lower = name.trim().to_lowercase();
        self.ignored_headers.iter().any(|h| *h == lower)
    }

    pub fn ignored_json_key_set(&self) -> HashSet<String> {
        self.ignored_json_keys.iter().cloned().collect()
    }
}

/// Live engine configuration.
///
/// Getters snapshot the current settings; worker tasks copy what they need
/// at task start and never hold a live reference across awaits. Setters
/// clamp to sane minimums rather than rejecting.
#[derive(Debug, Default)]
pub struct EngineConfig {
    settings: RwLock<EngineSettings>,
}

impl EngineConfig {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    /// Full copy of the current settings, groups included.
    pub fn snapshot(&self) -> EngineSettings {
        self.settings.read().clone()
    }

    /// Replaces the settings wholesale after validation.
    pub fn replace(&self, settings: EngineSettings) -> Result<(), EngineError> {
        settings
            .validate()
            .map_err(|e| EngineError::Configuration(e.to_string()))?;
        *self.settings.write() = settings;
        Ok(())
    }

    /// In-place edit under the write lock, for operator UI actions.
    pub fn update<F>(&self, edit: F)
    where
        F: FnOnce(&mut EngineSettings),
    {
        let mut guard = self.settings.write();
        edit(&mut guard);
        guard.max_mutations_per_base = guard.max_mutations_per_base.max(1);
        guard.max_parallel_mutations = guard.max_parallel_mutations.max(1);
        guard.dedup_lru_max = guard.dedup_lru_max.max(100);
        guard.dedup_ttl_ms = guard.dedup_ttl_ms.max(0);
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.read().enabled
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.settings.write().enabled = enabled;
    }

    pub fn dedup_mode(&self) -> DedupMode {
        self.settings.read().dedup_mode
    }

    pub fn dedup_ttl_ms(&self) -> i64 {
        self.settings.read().dedup_ttl_ms.max(0)
    }

    pub fn dedup_lru_max(&self) -> usize {
        self.settings.read().dedup_lru_max
    }

    pub fn max_parallel_mutations(&self) -> usize {
        self.settings.read().max_parallel_mutations.max(1)
    }

    pub fn groups(&self) -> Vec<IdGroup> {
        self.settings.read().id_groups.clone()
    }

    pub fn add_group(&self, group: IdGroup) {
        let mut guard = self.settings.write();
        guard.id_groups.retain(|g| g.name != group.name);
        guard.id_groups.push(group);
    }

    pub fn remove_group(&self, name: &str) {
        self.settings.write().id_groups.retain(|g| g.name != name);
    }

    pub fn group(&self, name: &str) -> Option<IdGroup> {
        self.settings
            .read()
            .id_groups
            .iter()
            .find(|g| g.name == name)
            .cloned()
    }
}

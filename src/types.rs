// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::http::{ScanRequest, ScanResponse};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "CRITICAL"),
            Severity::High => write!(f, "HIGH"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::Low => write!(f, "LOW"),
            Severity::Info => write!(f, "INFO"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::High => write!(f, "HIGH"),
            Confidence::Medium => write!(f, "MEDIUM"),
            Confidence::Low => write!(f, "LOW"),
        }
    }
}

/// A confirmed differential finding, handed to the host's sink.
///
/// `base_*` is the traffic as originally observed; `evidence_*` is the
/// mutated request that produced a materially different response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub title: String,
    pub detail: String,
    pub remediation: String,
    pub url: String,
    pub severity: Severity,
    pub confidence: Confidence,
    pub base_request: ScanRequest,
    pub base_response: ScanResponse,
    pub evidence_request: ScanRequest,
    pub evidence_response: ScanResponse,
    pub discovered_at: String,
}

/// Finding intake, implemented by the host (issue tracker, site map, report
/// pipeline). The engine deduplicates before calling this; sinks may assume
/// each call is a distinct finding within the dedup window.
#[async_trait]
pub trait FindingSink: Send + Sync {
    async fn report(&self, finding: Finding);
}

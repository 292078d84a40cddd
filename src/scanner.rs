// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - IDOR Scan Orchestrator
 * Differential authorization checks over observed HTTP traffic
 *
 * One worker task per distinct match: build and send a dummy-substituted
 * request first, then each alternate identifier, and report when a swap
 * yields a response materially different from both the original and the
 * dummy. The scan-dedup cache bounds re-checking, the report-dedup cache
 * bounds re-raising, and a semaphore bounds concurrent tasks. Nothing in
 * here may propagate a failure to the traffic-handling caller.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use parking_lot::RwLock;
use regex::Regex;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::config::groups::IdGroup;
use crate::config::{DedupMode, EngineConfig, EngineSettings};
use crate::dedup::{CacheLimits, TtlLruCache};
use crate::diff::{contains_any_ignore_case, responses_different, stable_body_hash};
use crate::errors::EngineError;
use crate::http::{RequestSender, ScanRequest, ScanResponse};
use crate::matcher::{find_all_matches, Match};
use crate::mutation::apply_replacement;
use crate::types::{Confidence, Finding, FindingSink, Severity};

pub struct IdorScanner {
    config: Arc<EngineConfig>,
    sender: Arc<dyn RequestSender>,
    sink: Arc<dyn FindingSink>,
    /// Scan-dedup: suppresses re-running checks for a recently seen match.
    seen: Arc<TtlLruCache>,
    /// Report-dedup: suppresses re-raising the same finding.
    reported: Arc<TtlLruCache>,
    /// Worker gate; replaced wholesale when settings change so in-flight
    /// tasks drain against the old limit while new tasks use the new one.
    gate: RwLock<Arc<Semaphore>>,
    in_flight: Arc<AtomicUsize>,
    accepting: Arc<AtomicBool>,
}

impl IdorScanner {
    pub fn new(
        config: Arc<EngineConfig>,
        sender: Arc<dyn RequestSender>,
        sink: Arc<dyn FindingSink>,
    ) -> Self {
        let seen_config = Arc::clone(&config);
        let seen = Arc::new(TtlLruCache::new(move || CacheLimits {
            max_entries: seen_config.dedup_lru_max(),
            ttl_ms: seen_config.dedup_ttl_ms(),
        }));
        let reported_config = Arc::clone(&config);
        let reported = Arc::new(TtlLruCache::new(move || CacheLimits {
            max_entries: reported_config.dedup_lru_max(),
            ttl_ms: reported_config.dedup_ttl_ms(),
        }));
        let gate = RwLock::new(Arc::new(Semaphore::new(config.max_parallel_mutations())));

        Self {
            config,
            sender,
            sink,
            seen,
            reported,
            gate,
            in_flight: Arc::new(AtomicUsize::new(0)),
            accepting: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Per-response entry point. Extracts matches against the current group
    /// set and schedules one bounded task per match not recently checked.
    /// Never returns an error: the worst outcome of any internal fault is a
    /// missed finding.
    pub async fn handle_response(&self, base_request: &ScanRequest, base_response: &ScanResponse) {
        if !self.accepting.load(Ordering::SeqCst) {
            return;
        }
        // Snapshot once; worker tasks get their own copy and never read the
        // live config mid-flight.
        let settings = self.config.snapshot();
        if !settings.enabled {
            return;
        }

        let path = base_request.path_without_query();
        if is_static_asset_path(path, &settings.skip_extensions) {
            return;
        }
        if is_path_excluded(path, &settings.path_exclude_regex) {
            return;
        }

        let matches = find_all_matches(base_request, &settings);
        if matches.is_empty() {
            return;
        }
        debug!(
            "{} match(es) for {} {}",
            matches.len(),
            base_request.method,
            base_request.path
        );

        let now = Utc::now().timestamp_millis();
        for matched in matches {
            let scan_key = compute_scan_key(
                base_request,
                base_response,
                &matched,
                settings.dedup_mode,
            );
            if self.seen.is_fresh(&scan_key, now) {
                continue;
            }

            let task = CheckTask {
                settings: settings.clone(),
                sender: Arc::clone(&self.sender),
                sink: Arc::clone(&self.sink),
                seen: Arc::clone(&self.seen),
                reported: Arc::clone(&self.reported),
                base_request: base_request.clone(),
                base_response: base_response.clone(),
                matched,
                scan_key,
            };
            let gate = self.gate.read().clone();
            let in_flight = Arc::clone(&self.in_flight);
            in_flight.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let _permit = gate.acquire_owned().await.ok();
                task.run().await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            });
        }
    }

    /// Re-reads the configured parallelism into a fresh worker gate.
    pub fn apply_settings(&self) {
        let parallel = self.config.max_parallel_mutations();
        *self.gate.write() = Arc::new(Semaphore::new(parallel));
    }

    /// Operator reset: forget which matches were recently checked.
    pub fn clear_scan_cache(&self) {
        self.seen.clear();
    }

    /// Operator reset: forget which findings were recently raised.
    pub fn clear_reported_cache(&self) {
        self.reported.clear();
    }

    /// Stops accepting new work and waits briefly for in-flight tasks.
    pub async fn shutdown(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        let deadline = Instant::now() + Duration::from_secs(2);
        while self.in_flight.load(Ordering::SeqCst) > 0 && Instant::now() < deadline {
            sleep(Duration::from_millis(20)).await;
        }
    }

    /// Blocks until every scheduled task has finished.
    pub async fn wait_for_idle(&self) {
        while self.in_flight.load(Ordering::SeqCst) > 0 {
            sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Everything one check task needs, copied at schedule time.
struct CheckTask {
    settings: EngineSettings,
    sender: Arc<dyn RequestSender>,
    sink: Arc<dyn FindingSink>,
    seen: Arc<TtlLruCache>,
    reported: Arc<TtlLruCache>,
    base_request: ScanRequest,
    base_response: ScanResponse,
    matched: Match,
    scan_key: String,
}

impl CheckTask {
    /// Runs the checks and unconditionally marks the scan key, so a failed
    /// or errored check is not retried until the TTL lapses.
    async fn run(self) {
        if let Err(e) = self.execute().await {
            error!("idor check failed for {}: {e:#}", self.base_request.url());
        }
        self.seen.mark(&self.scan_key, Utc::now().timestamp_millis());
    }

    async fn execute(&self) -> Result<()> {
        let settings = &self.settings;
        let denied: Vec<String> = settings
            .denied_strings
            .iter()
            .map(|s| s.to_lowercase())
            .collect();
        let ignored_keys = settings.ignored_json_key_set();

        let base_body = &self.base_response.body;
        let base_hash = stable_body_hash(base_body);
        let base_len = base_body.len();

        let matched = &self.matched;
        let other_ids: Vec<&String> = matched
            .group
            .ids()
            .iter()
            .filter(|id| **id != matched.matched_id)
            .collect();
        let dummy = matched.group.generate_dummy_like(&matched.matched_id);

        // The dummy response is the negative control for every comparison
        // in this task, so it is always sent and measured first.
        let dummy_request = apply_replacement(&self.base_request, matched, &dummy);
        let dummy_response = self.send_with_timeout(&dummy_request).await?;
        let dummy_len = dummy_response.body.len();

        let mut processed = 0usize;
        for id in other_ids {
            let test_request = apply_replacement(&self.base_request, matched, id);
            if settings.delay_ms_between_mutations > 0 {
                sleep(Duration::from_millis(settings.delay_ms_between_mutations)).await;
            }
            let test_response = self.send_with_timeout(&test_request).await?;
            let test_len = test_response.body.len();

            let different_from_base =
                responses_different(base_body, &test_response.body, &ignored_keys);
            let different_from_dummy =
                responses_different(&dummy_response.body, &test_response.body, &ignored_keys);
            let contains_denied = contains_any_ignore_case(&test_response.body, &denied);
            // Same length as base but different length from dummy and a
            // different hash: catches content shifted within an identical
            // byte count, which the coarse length compare cannot see.
            let same_length_content_shift = test_len == base_len
                && test_len != dummy_len
                && stable_body_hash(&test_response.body) != base_hash;

            if ((different_from_base && different_from_dummy) || same_length_content_shift)
                && !contains_denied
            {
                self.report(&test_request, &test_response, id, &dummy).await;
                break; // one finding per base request
            }

            processed += 1;
            if processed >= settings.max_mutations_per_base.max(1) {
                break;
            }
        }

        Ok(())
    }

    /// Time-bounded send. The budget is a soft cap: on timeout or error the
    /// request is retried once without a bound rather than failing the
    /// whole task on a single slow backend.
    async fn send_with_timeout(&self, request: &ScanRequest) -> Result<ScanResponse> {
        let timeout_ms = self.settings.request_timeout_ms;
        if timeout_ms == 0 {
            return self.sender.send(request).await;
        }
        let budget = Duration::from_millis(timeout_ms);
        match timeout(budget, self.sender.send(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                warn!("{}, retrying unbounded", EngineError::Send(e.to_string()));
                self.sender.send(request).await
            }
            Err(_) => {
                warn!(
                    "{}, retrying unbounded",
                    EngineError::Timeout { duration: budget }
                );
                self.sender.send(request).await
            }
        }
    }

    async fn report(
        &self,
        evidence_request: &ScanRequest,
        evidence_response: &ScanResponse,
        to_id: &str,
        dummy: &str,
    ) {
        let report_key = compute_report_key(&self.base_request, &self.matched);
        let now = Utc::now().timestamp_millis();
        if self.reported.is_fresh(&report_key, now) {
            return;
        }

        let matched = &self.matched;
        let finding = Finding {
            title: "Potential IDOR".to_string(),
            detail: format!(
                "Base ID '{}' in {} replaced with '{}' produced a different response, \
                 also different from dummy '{}'.",
                matched.matched_id,
                matched.location_description(),
                to_id,
                dummy
            ),
            remediation: "Enforce object-level authorization checks. Tie access to the \
                          user or session, not to client-supplied identifiers."
                .to_string(),
            url: self.base_request.url(),
            severity: Severity::High,
            confidence: Confidence::Medium,
            base_request: self.base_request.clone(),
            base_response: self.base_response.clone(),
            evidence_request: evidence_request.clone(),
            evidence_response: evidence_response.clone(),
            discovered_at: Utc::now().to_rfc3339(),
        };

        self.reported.mark(&report_key, now);
        self.sink.report(finding).await;
        info!("reported IDOR at {}", self.base_request.url());
    }
}

/// Scan key: request shape, location, chain and group signature. In
/// content-aware mode the base response signature is folded in, so a
/// changed backend response reopens scanning for the same shape.
fn compute_scan_key(
    request: &ScanRequest,
    base_response: &ScanResponse,
    matched: &Match,
    mode: DedupMode,
) -> String {
    let mut key = format!(
        "{}|{}|{}|{}|{}|{}",
        request.method,
        request.host,
        request.path_without_query(),
        matched.candidate.location.key(),
        matched.chain.signature(),
        group_signature(&matched.group)
    );
    if mode == DedupMode::ContentAware {
        key.push('|');
        key.push_str(&base_signature(base_response));
    }
    key
}

/// Report key: coarser than the scan key by design. A finding is not
/// re-raised merely because the base response drifted.
fn compute_report_key(request: &ScanRequest, matched: &Match) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        request.method,
        request.host,
        request.path_without_query(),
        matched.candidate.location.key(),
        matched.group.name
    )
}

fn base_signature(response: &ScanResponse) -> String {
    format!(
        "{}:{}",
        response.status_code,
        stable_body_hash(&response.body)
    )
}

fn group_signature(group: &IdGroup) -> String {
    let mut ids: Vec<&String> = group.ids().iter().collect();
    ids.sort();
    let joined = ids
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}#{}", group.name, stable_body_hash(&joined))
}

fn is_static_asset_path(path: &str, skip_extensions: &[String]) -> bool {
    let lower = path.to_lowercase();
    skip_extensions.iter().any(|ext| lower.ends_with(ext))
}

fn is_path_excluded(path: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| match Regex::new(pattern) {
        Ok(re) => re.is_match(path),
        Err(e) => {
            warn!("invalid path exclude pattern '{pattern}': {e}");
            false
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ParameterKind;
    use crate::matcher::find_occurrence;
    use crate::matcher::{Candidate, CandidateLocation};

    fn request() -> ScanRequest {
        ScanRequest {
            method: "GET".to_string(),
            host: "app.example.com".to_string(),
            secure: true,
            path: "/api/orders/42?full=1".to_string(),
            headers: Vec::new(),
            parameters: Vec::new(),
            body: String::new(),
        }
    }

    fn response(status: u16, body: &str) -> ScanResponse {
        ScanResponse {
            status_code: status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    fn match_for(value: &str, id: &str) -> Match {
        let (chain, occurrence) = find_occurrence(value, id).unwrap();
        Match {
            group: IdGroup::from_ids("orders", [id, "9922"]),
            matched_id: id.to_string(),
            candidate: Candidate {
                location: CandidateLocation::PathSegment { index: 3 },
                value: value.to_string(),
            },
            chain,
            occurrence,
        }
    }

    #[test]
    fn test_scan_key_strict_ignores_base_response() {
        let req = request();
        let m = match_for("42", "42");
        let a = compute_scan_key(&req, &response(200, "a"), &m, DedupMode::Strict);
        let b = compute_scan_key(&req, &response(500, "b"), &m, DedupMode::Strict);
        assert_eq!(a, b);
        assert!(a.starts_with("GET|app.example.com|/api/orders/42|S|3|PLAIN|orders#"));
    }

    #[test]
    fn test_scan_key_content_aware_tracks_base_response() {
        let req = request();
        let m = match_for("42", "42");
        let a = compute_scan_key(&req, &response(200, "a"), &m, DedupMode::ContentAware);
        let b = compute_scan_key(&req, &response(200, "b"), &m, DedupMode::ContentAware);
        let a_again = compute_scan_key(&req, &response(200, "a"), &m, DedupMode::ContentAware);
        assert_ne!(a, b);
        assert_eq!(a, a_again);
    }

    #[test]
    fn test_scan_key_tracks_group_membership() {
        let req = request();
        let resp = response(200, "a");
        let mut m = match_for("42", "42");
        let before = compute_scan_key(&req, &resp, &m, DedupMode::Strict);
        m.group.add_id("7733");
        let after = compute_scan_key(&req, &resp, &m, DedupMode::Strict);
        assert_ne!(before, after, "edited group must reopen scanning");
    }

    #[test]
    fn test_report_key_is_coarser_than_scan_key() {
        let req = request();
        let m = match_for("42", "42");
        let key = compute_report_key(&req, &m);
        assert_eq!(key, "GET|app.example.com|/api/orders/42|S|3|orders");
        // No chain, no base-response signature: a drifted backend response
        // or an alternate chain does not re-raise the finding.
        assert!(!key.contains("PLAIN"));
    }

    #[test]
    fn test_static_asset_paths_are_skipped() {
        let exts = EngineSettings::default().skip_extensions;
        assert!(is_static_asset_path("/assets/logo.PNG", &exts));
        assert!(is_static_asset_path("/style.css", &exts));
        assert!(!is_static_asset_path("/api/orders/42", &exts));
    }

    #[test]
    fn test_path_exclusion_regex() {
        let patterns = vec!["^/health".to_string(), "static".to_string()];
        assert!(is_path_excluded("/health/live", &patterns));
        assert!(is_path_excluded("/app/static/x", &patterns));
        assert!(!is_path_excluded("/api/orders", &patterns));
        // Invalid patterns are skipped, not fatal.
        assert!(!is_path_excluded("/api", &vec!["(".to_string()]));
    }

    #[test]
    fn test_location_keys() {
        let param = CandidateLocation::Parameter {
            name: "ref".to_string(),
            kind: ParameterKind::Json,
        };
        assert_eq!(param.key(), "P|ref|JSON");
        assert_eq!(
            CandidateLocation::Header {
                name: "X-Id".to_string()
            }
            .key(),
            "H|X-Id"
        );
        assert_eq!(CandidateLocation::PathSegment { index: 2 }.key(), "S|2");
        assert_eq!(CandidateLocation::RawQuery.key(), "Q");
    }
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Identifier Matcher
 * Candidate extraction and encoded-occurrence location inside requests
 *
 * Extraction walks every conventional identifier location of a request in a
 * fixed order (parameters, headers, path segments, raw query). The
 * occurrence finder then checks each candidate against every group id under
 * every supported encoding chain, preferring an encoded-fragment hit (only
 * the matched span is touched by mutation) over a decode-whole hit (the id
 * is nested inside a larger decoded blob, so mutation must re-encode the
 * entire value).
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::{EngineSettings, IdGroup};
use crate::encoding::{EncodingChain, EncodingStep, SUPPORTED_CHAINS};
use crate::http::{ParameterKind, ScanRequest};

/// One extractable identifier location. A closed set on purpose: every
/// consumer switches exhaustively, so a new location kind cannot be added
/// without updating keying, mutation and description in the same change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum CandidateLocation {
    Parameter { name: String, kind: ParameterKind },
    Header { name: String },
    PathSegment { index: usize },
    RawQuery,
}

impl CandidateLocation {
    /// The variant tag alone, used in the match identity tuple.
    pub fn kind_tag(&self) -> &'static str {
        match self {
            CandidateLocation::Parameter { .. } => "PARAMETER",
            CandidateLocation::Header { .. } => "HEADER",
            CandidateLocation::PathSegment { .. } => "PATH_SEGMENT",
            CandidateLocation::RawQuery => "RAW_QUERY",
        }
    }

    /// Compact location tag used in dedup keys.
    pub fn key(&self) -> String {
        match self {
            CandidateLocation::Parameter { name, kind } => format!("P|{name}|{kind}"),
            CandidateLocation::Header { name } => format!("H|{name}"),
            CandidateLocation::PathSegment { index } => format!("S|{index}"),
            CandidateLocation::RawQuery => "Q".to_string(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            CandidateLocation::Parameter { name, kind } => {
                format!("parameter '{name}' ({kind})")
            }
            CandidateLocation::Header { name } => format!("header '{name}'"),
            CandidateLocation::PathSegment { .. } => "URL path segment".to_string(),
            CandidateLocation::RawQuery => "raw query".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub location: CandidateLocation,
    /// The raw string found at the location, exactly as observed.
    pub value: String,
}

/// Where and how an identifier was located inside a candidate value.
/// Exactly one mode applies per occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Occurrence {
    /// The id, encoded through the chain, appears verbatim inside the raw
    /// value; mutation splices over `[start, start + fragment.len())`.
    Fragment { fragment: String, start: usize },
    /// The id appears only inside the fully decoded value; mutation edits
    /// the decoded text and re-encodes the whole value.
    DecodeWhole {
        decoded_full: String,
        decoded_start: usize,
    },
}

impl Occurrence {
    /// Mode tag + offset, part of the match identity tuple.
    pub fn mode_key(&self) -> String {
        match self {
            Occurrence::Fragment { start, .. } => format!("E:{start}"),
            Occurrence::DecodeWhole { decoded_start, .. } => format!("D:{decoded_start}"),
        }
    }
}

/// A candidate bound to the group, id, chain and occurrence that matched it.
#[derive(Debug, Clone)]
pub struct Match {
    pub group: IdGroup,
    pub matched_id: String,
    pub candidate: Candidate,
    pub chain: EncodingChain,
    pub occurrence: Occurrence,
}

impl Match {
    /// Stable identity for deduplication: the same literal value can match
    /// several chains and styles, and each distinct combination is a
    /// separate unit of work exactly once. The candidate contributes its
    /// variant tag and raw value, so the same value observed at two
    /// locations of the same kind is a single unit of work.
    pub fn identity_key(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}",
            self.candidate.location.kind_tag(),
            self.candidate.value,
            self.group.name,
            self.matched_id,
            self.chain.signature(),
            self.occurrence.mode_key()
        )
    }

    pub fn location_description(&self) -> String {
        self.candidate.location.describe()
    }
}

/// Walks the request's identifier locations in a stable order: parameters,
/// headers, path segments, raw query. Ignore-lists come from settings;
/// empty path segments are skipped but still advance the index so segment
/// positions stay stable.
pub fn extract_candidates(request: &ScanRequest, settings: &EngineSettings) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for param in &request.parameters {
        if settings.is_param_ignored(param.kind, &param.name) {
            continue;
        }
        candidates.push(Candidate {
            location: CandidateLocation::Parameter {
                name: param.name.clone(),
                kind: param.kind,
            },
            value: param.value.clone(),
        });
    }

    for (name, value) in &request.headers {
        if settings.is_header_ignored(name) {
            continue;
        }
        candidates.push(Candidate {
            location: CandidateLocation::Header { name: name.clone() },
            value: value.clone(),
        });
    }

    let path = request.path_without_query();
    if !path.is_empty() {
        for (index, segment) in path.split('/').enumerate() {
            if segment.is_empty() {
                continue;
            }
            candidates.push(Candidate {
                location: CandidateLocation::PathSegment { index },
                value: segment.to_string(),
            });
        }
    }

    if let Some(raw_query) = request.raw_query() {
        candidates.push(Candidate {
            location: CandidateLocation::RawQuery,
            value: raw_query.to_string(),
        });
    }

    candidates
}

/// Locates `wanted` inside `candidate_value` under the supported chains.
///
/// For each chain, in table order: encode the id through the chain under
/// each applicable style sample and search for it verbatim (fragment mode),
/// then decode the whole value and search the decoded text (decode-whole
/// mode). The first hit wins, so plain beats encoded, shorter chains beat
/// longer ones, and fragment mode beats decode-whole for the same chain.
pub fn find_occurrence(candidate_value: &str, wanted: &str) -> Option<(EncodingChain, Occurrence)> {
    if candidate_value.is_empty() || wanted.is_empty() {
        return None;
    }

    for steps in SUPPORTED_CHAINS {
        let chain = EncodingChain::of(steps);

        // Style samples disambiguating surface forms for this chain.
        let mut samples: Vec<Option<&str>> = vec![None];
        if chain.contains(EncodingStep::Unicode) {
            samples.push(Some("%u0000"));
        }
        if chain.contains(EncodingStep::Base64Url) {
            samples.push(Some("="));
        }

        for sample in samples {
            let encoded = chain.encode(wanted, sample);
            if let Some(start) = candidate_value.find(&encoded) {
                return Some((
                    chain,
                    Occurrence::Fragment {
                        fragment: encoded,
                        start,
                    },
                ));
            }
        }

        // Fallback for ids nested inside a larger encoded structure, e.g.
        // a base64 token wrapping several fields.
        if let Some(decoded) = chain.decode_all(candidate_value) {
            if let Some(decoded_start) = decoded.find(wanted) {
                return Some((
                    chain,
                    Occurrence::DecodeWhole {
                        decoded_full: decoded,
                        decoded_start,
                    },
                ));
            }
        }
    }

    None
}

/// The full (candidate x group x id) sweep, deduplicated by match identity.
pub fn find_all_matches(request: &ScanRequest, settings: &EngineSettings) -> Vec<Match> {
    let candidates = extract_candidates(request, settings);
    let mut seen = HashSet::new();
    let mut matches = Vec::new();

    for candidate in &candidates {
        for group in &settings.id_groups {
            for id in group.ids() {
                let Some((chain, occurrence)) = find_occurrence(&candidate.value, id) else {
                    continue;
                };
                let m = Match {
                    group: group.clone(),
                    matched_id: id.clone(),
                    candidate: candidate.clone(),
                    chain,
                    occurrence,
                };
                if seen.insert(m.identity_key()) {
                    matches.push(m);
                }
            }
        }
    }

    matches
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Mutation Builder
 * Position-preserving identifier substitution in captured requests
 *
 * Fragment matches splice the re-encoded replacement over the matched span
 * and leave every other byte of the value untouched. Decode-whole matches
 * edit the decoded text and re-encode the entire value, using the original
 * raw value as the style sample so the surface form replays byte-exact.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use crate::http::{RequestParameter, ScanRequest};
use crate::matcher::{CandidateLocation, Match, Occurrence};

/// Builds the request with `new_id` substituted at the match location.
pub fn apply_replacement(request: &ScanRequest, m: &Match, new_id: &str) -> ScanRequest {
    let encoded = m.chain.encode(new_id, Some(&m.candidate.value));

    match &m.candidate.location {
        CandidateLocation::Parameter { name, kind } => {
            let new_value = rebuild_value(m, new_id, &encoded, &m.candidate.value);
            request.with_updated_parameter(RequestParameter::new(name.clone(), new_value, *kind))
        }
        CandidateLocation::Header { name } => {
            let new_value = rebuild_value(m, new_id, &encoded, &m.candidate.value);
            request.with_updated_header(name, &new_value)
        }
        CandidateLocation::PathSegment { index } => {
            let rebuilt: Vec<String> = request
                .path
                .split('/')
                .enumerate()
                .map(|(i, segment)| {
                    if i != *index || segment.is_empty() {
                        return segment.to_string();
                    }
                    // A '?' inside the segment starts the query string;
                    // only the segment core is rebuilt.
                    let (core, suffix) = match segment.find('?') {
                        Some(q) => (&segment[..q], &segment[q..]),
                        None => (segment, ""),
                    };
                    let new_core = rebuild_value(m, new_id, &encoded, core);
                    format!("{new_core}{suffix}")
                })
                .collect();
            let mut new_path = rebuilt.join("/");
            if !new_path.starts_with('/') {
                new_path.insert(0, '/');
            }
            request.with_path(new_path)
        }
        CandidateLocation::RawQuery => {
            let full = &request.path;
            let (base, old_query) = match full.find('?') {
                Some(q) => (&full[..q], &full[q + 1..]),
                None => (full.as_str(), ""),
            };
            let new_query = rebuild_value(m, new_id, &encoded, old_query);
            let rebuilt = if new_query.is_empty() {
                base.to_string()
            } else {
                format!("{base}?{new_query}")
            };
            request.with_path(rebuilt)
        }
    }
}

fn rebuild_value(m: &Match, new_id: &str, encoded: &str, original: &str) -> String {
    match &m.occurrence {
        Occurrence::Fragment { fragment, start } => {
            replace_at(original, *start, fragment.len(), encoded)
        }
        Occurrence::DecodeWhole {
            decoded_full,
            decoded_start,
        } => {
            let mutated = replace_at(decoded_full, *decoded_start, m.matched_id.len(), new_id);
            m.chain.encode(&mutated, Some(original))
        }
    }
}

/// Splices `replacement` over `[start, start + length)`. Out-of-bounds
/// indices are clamped: a corrupted splice must degrade to a harmless
/// mismatch downstream, never a panic in the traffic path.
fn replace_at(original: &str, start: usize, length: usize, replacement: &str) -> String {
    let start = floor_char_boundary(original, start.min(original.len()));
    let end = floor_char_boundary(original, start.saturating_add(length).min(original.len()));
    let mut out = String::with_capacity(original.len() + replacement.len());
    out.push_str(&original[..start]);
    out.push_str(replacement);
    out.push_str(&original[end..]);
    out
}

/// Largest valid UTF-8 char boundary at or before `index`.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdGroup;
    use crate::encoding::{EncodingChain, EncodingStep};
    use crate::http::ParameterKind;
    use crate::matcher::{find_occurrence, Candidate};

    fn request(path: &str) -> ScanRequest {
        ScanRequest {
            method: "GET".to_string(),
            host: "app.example.com".to_string(),
            secure: true,
            path: path.to_string(),
            headers: Vec::new(),
            parameters: Vec::new(),
            body: String::new(),
        }
    }

    fn match_for(location: CandidateLocation, value: &str, id: &str) -> Match {
        let (chain, occurrence) = find_occurrence(value, id).expect("occurrence");
        Match {
            group: IdGroup::from_ids("g", [id]),
            matched_id: id.to_string(),
            candidate: Candidate {
                location,
                value: value.to_string(),
            },
            chain,
            occurrence,
        }
    }

    #[test]
    fn test_base64_path_segment_mutation() {
        let req = request("/orders/dXNlcjEyMw==");
        let m = match_for(
            CandidateLocation::PathSegment { index: 2 },
            "dXNlcjEyMw==",
            "user123",
        );
        let mutated = apply_replacement(&req, &m, "user456");
        assert_eq!(mutated.path, "/orders/dXNlcjQ1Ng==");
    }

    #[test]
    fn test_url_encoded_header_mutation() {
        let req = request("/profile").with_updated_header("X-Id", "%75%73%65%72%31");
        let m = match_for(
            CandidateLocation::Header {
                name: "X-Id".to_string(),
            },
            "%75%73%65%72%31",
            "user1",
        );
        assert_eq!(m.chain.steps(), [EncodingStep::Url]);
        let mutated = apply_replacement(&req, &m, "user2");
        assert_eq!(mutated.header("X-Id"), Some("%75%73%65%72%32"));
    }

    #[test]
    fn test_mutation_is_minimal() {
        // Substituting the matched id itself must reproduce the original
        // value byte-for-byte, across fragment and decode-whole modes.
        let req = request("/orders/pre-dXNlcjEyMw==-post");
        let m = match_for(
            CandidateLocation::PathSegment { index: 2 },
            "pre-dXNlcjEyMw==-post",
            "user123",
        );
        let mutated = apply_replacement(&req, &m, "user123");
        assert_eq!(mutated.path, req.path);

        let blob = EncodingChain::of(&[EncodingStep::Base64])
            .encode(r#"{"user":"user123","role":"x"}"#, None);
        let req = request("/t").with_updated_header("X-Token", &blob);
        let m = match_for(
            CandidateLocation::Header {
                name: "X-Token".to_string(),
            },
            &blob,
            "user123",
        );
        assert!(matches!(m.occurrence, Occurrence::DecodeWhole { .. }));
        let same = apply_replacement(&req, &m, "user123");
        assert_eq!(same.header("X-Token"), Some(blob.as_str()));
    }

    #[test]
    fn test_decode_whole_reencodes_entire_value() {
        let blob = EncodingChain::of(&[EncodingStep::Base64])
            .encode(r#"{"user":"user123","role":"x"}"#, None);
        let req = request("/t").with_updated_header("X-Token", &blob);
        let m = match_for(
            CandidateLocation::Header {
                name: "X-Token".to_string(),
            },
            &blob,
            "user123",
        );
        let mutated = apply_replacement(&req, &m, "user456");
        let new_value = mutated.header("X-Token").unwrap();
        let decoded = EncodingChain::of(&[EncodingStep::Base64])
            .decode_all(new_value)
            .unwrap();
        assert_eq!(decoded, r#"{"user":"user456","role":"x"}"#);
    }

    #[test]
    fn test_parameter_mutation_touches_only_matched_span() {
        let req = ScanRequest {
            parameters: vec![RequestParameter::new(
                "ref",
                "order-4711-export",
                ParameterKind::Query,
            )],
            ..request("/export?ref=order-4711-export")
        };
        let m = match_for(
            CandidateLocation::Parameter {
                name: "ref".to_string(),
                kind: ParameterKind::Query,
            },
            "order-4711-export",
            "4711",
        );
        let mutated = apply_replacement(&req, &m, "9922");
        assert_eq!(mutated.parameters[0].value, "order-9922-export");
    }

    #[test]
    fn test_path_segment_preserves_query_suffix() {
        let req = request("/orders/4711?full=1");
        let m = match_for(CandidateLocation::PathSegment { index: 2 }, "4711", "4711");
        let mutated = apply_replacement(&req, &m, "9922");
        assert_eq!(mutated.path, "/orders/9922?full=1");
    }

    #[test]
    fn test_raw_query_mutation_preserves_base_path() {
        let value = "ref=dXNlcjEyMw==";
        let req = request("/export?ref=dXNlcjEyMw==");
        let m = match_for(CandidateLocation::RawQuery, value, "user123");
        let mutated = apply_replacement(&req, &m, "user456");
        assert_eq!(mutated.path, "/export?ref=dXNlcjQ1Ng==");
    }

    #[test]
    fn test_replace_at_clamps_out_of_bounds() {
        assert_eq!(replace_at("abc", 10, 2, "X"), "abcX");
        assert_eq!(replace_at("abc", 1, 99, "X"), "aX");
        assert_eq!(replace_at("abc", 0, 0, "X"), "Xabc");
    }

    #[test]
    fn test_replace_at_respects_char_boundaries() {
        // 'ä' is two bytes; a splice landing mid-char backs off to the
        // char start instead of panicking.
        assert_eq!(replace_at("aäb", 2, 1, "X"), "aXäb");
        assert_eq!(replace_at("aäb", 1, 2, "X"), "aXb");
    }
}

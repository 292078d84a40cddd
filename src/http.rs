// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Request/Response Model
 * Host-facing HTTP message model and the outbound send contract
 *
 * The engine never performs network I/O itself. The embedding host (proxy,
 * worker, replay harness) supplies captured traffic as `ScanRequest` /
 * `ScanResponse` values and implements `RequestSender` to execute mutated
 * requests. Parameters are authoritative for their own locations; the raw
 * query string on `path` is mutated only for raw-query and path-segment
 * matches. Materializing a `ScanRequest` onto the wire is the host's job.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Where a request parameter lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParameterKind {
    Query,
    Body,
    Json,
    Cookie,
    Multipart,
}

impl ParameterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterKind::Query => "QUERY",
            ParameterKind::Body => "BODY",
            ParameterKind::Json => "JSON",
            ParameterKind::Cookie => "COOKIE",
            ParameterKind::Multipart => "MULTIPART",
        }
    }
}

impl std::fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestParameter {
    pub name: String,
    pub value: String,
    pub kind: ParameterKind,
}

impl RequestParameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            kind,
        }
    }
}

/// One captured (or mutated) HTTP request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub method: String,
    pub host: String,
    #[serde(default = "default_secure")]
    pub secure: bool,
    /// Path including the raw query string, e.g. `/api/users/7?full=1`.
    pub path: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub parameters: Vec<RequestParameter>,
    #[serde(default)]
    pub body: String,
}

fn default_secure() -> bool {
    true
}

impl ScanRequest {
    pub fn path_without_query(&self) -> &str {
        match self.path.find('?') {
            Some(q) => &self.path[..q],
            None => &self.path,
        }
    }

    /// The raw, undecoded query string, without the leading `?`.
    pub fn raw_query(&self) -> Option<&str> {
        let q = self.path.find('?')?;
        let rest = &self.path[q + 1..];
        if rest.is_empty() {
            None
        } else {
            Some(rest)
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}{}", scheme, self.host, self.path)
    }

    /// Returns a new request with the matching parameter (by name and kind)
    /// replaced, appending it if absent.
    pub fn with_updated_parameter(&self, param: RequestParameter) -> Self {
        let mut out = self.clone();
        match out
            .parameters
            .iter_mut()
            .find(|p| p.kind == param.kind && p.name == param.name)
        {
            Some(existing) => existing.value = param.value,
            None => out.parameters.push(param),
        }
        out
    }

    /// Returns a new request with the named header replaced (case-insensitive),
    /// appending it if absent.
    pub fn with_updated_header(&self, name: &str, value: &str) -> Self {
        let mut out = self.clone();
        match out
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some((_, v)) => *v = value.to_string(),
            None => out.headers.push((name.to_string(), value.to_string())),
        }
        out
    }

    /// Returns a new request with the full path (including query) replaced.
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        let mut out = self.clone();
        out.path = path.into();
        out
    }
}

/// One captured HTTP response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub status_code: u16,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ScanResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Outbound request execution, implemented by the host.
///
/// The engine wraps every call with its own timeout policy; implementations
/// should not retry internally on the engine's behalf.
#[async_trait]
pub trait RequestSender: Send + Sync {
    async fn send(&self, request: &ScanRequest) -> Result<ScanResponse>;
}

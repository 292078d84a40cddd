// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Engine Error Types
 * Error taxonomy for the differential IDOR engine
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::time::Duration;
use thiserror::Error;

/// Errors raised inside the detection engine.
///
/// None of these are allowed to escape the per-response entry point: decode
/// failures skip the offending chain, send failures degrade to a fallback
/// send, and task-level failures are logged and swallowed. The worst
/// observable effect of any of them is a missed or delayed finding.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A decode step rejected its input (malformed base64, bad escape).
    #[error("decode failed in chain {chain}: {reason}")]
    Decode { chain: String, reason: String },

    /// The external sender failed to produce a response.
    #[error("request send failed: {0}")]
    Send(String),

    /// A time-bounded send exceeded its budget.
    #[error("request timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Settings rejected by validation.
    #[error("configuration error: {0}")]
    Configuration(String),
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stable error codes surfaced in `CaptureResult::Failure`.
//
// Device-reported codes are passed through untouched; the codes below are the
// ones the bridge itself assigns when it never got a usable answer from the
// driver.

use serde::{Deserialize, Serialize};

/// The RD service is not running or refused the connection.
pub const DRIVER_UNREACHABLE: i64 = 100;

/// The connection dropped while the request was in flight.
pub const CONNECTION_INTERRUPTED: i64 = 110;

/// The attempt deadline expired.
pub const CAPTURE_TIMEOUT: i64 = 120;

/// Empty/malformed response, missing envelope, or anything unclassified.
pub const UNCLASSIFIED: i64 = 999;

/// Transport-level failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaultClass {
    ConnectionRefused,
    TimedOut,
    ConnectionReset,
    Other,
}

impl FaultClass {
    /// Stable wire name (`connection-refused`, `timed-out`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectionRefused => "connection-refused",
            Self::TimedOut => "timed-out",
            Self::ConnectionReset => "connection-reset",
            Self::Other => "other",
        }
    }

    /// Error code reported for this class.
    pub fn error_code(&self) -> i64 {
        match self {
            Self::ConnectionRefused => DRIVER_UNREACHABLE,
            Self::ConnectionReset => CONNECTION_INTERRUPTED,
            Self::TimedOut => CAPTURE_TIMEOUT,
            Self::Other => UNCLASSIFIED,
        }
    }

    /// Operator-facing summary used as the failure message prefix.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::ConnectionRefused => "RD service is not running or unreachable",
            Self::ConnectionReset => "Connection to RD service was interrupted",
            Self::TimedOut => "Capture timed out",
            Self::Other => "RD service request failed",
        }
    }
}

impl std::fmt::Display for FaultClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP status for a failure the bridge itself produced.
///
/// Device-reported failures never go through this table; they are always 200.
pub fn http_status_for_bridge_code(code: i64) -> u16 {
    match code {
        DRIVER_UNREACHABLE => 503,
        CAPTURE_TIMEOUT => 408,
        _ => 500,
    }
}

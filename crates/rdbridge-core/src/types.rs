// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the RD bridge.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codes;
use crate::error::BridgeError;

/// Biometric capture modality. One device profile exists per modality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Fingerprint,
    Iris,
    Photograph,
}

impl Modality {
    /// All supported modalities, in registry order.
    pub fn all() -> &'static [Modality] {
        &[Modality::Fingerprint, Modality::Iris, Modality::Photograph]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fingerprint => "fingerprint",
            Self::Iris => "iris",
            Self::Photograph => "photograph",
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fingerprint" => Ok(Self::Fingerprint),
            "iris" => Ok(Self::Iris),
            "photograph" | "photo" => Ok(Self::Photograph),
            _ => Err(BridgeError::UnknownModality(s.to_string())),
        }
    }
}

/// Default capture parameters baked into a device profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureDefaults {
    pub finger_count: u32,
    pub iris_count: u32,
    pub photo_count: u32,
    pub format_code: u32,
}

/// Static description of how to reach and drive one modality.
///
/// Built once at startup from `BridgeConfig` and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfile {
    pub modality: Modality,
    /// `https://` base URL; the only endpoint capture calls may use.
    pub secure_endpoint: String,
    /// Same host and path as `secure_endpoint` over plain `http://`.
    pub insecure_endpoint: String,
    pub timeout_ms: u64,
    pub defaults: CaptureDefaults,
}

impl DeviceProfile {
    /// Secure endpoint only. Capture never falls back to plain HTTP.
    pub fn capture_candidates(&self) -> Vec<String> {
        vec![self.secure_endpoint.clone()]
    }

    /// Secure first, then insecure. Used for info, status and health calls.
    pub fn info_candidates(&self) -> Vec<String> {
        vec![self.secure_endpoint.clone(), self.insecure_endpoint.clone()]
    }
}

/// Swap the `https` scheme of a secure endpoint for `http`, keeping host and
/// path as they are.
pub fn derive_insecure_endpoint(secure: &str) -> crate::error::Result<String> {
    let trimmed = secure.trim();
    let rest = trimmed
        .get(..8)
        .filter(|scheme| scheme.eq_ignore_ascii_case("https://"))
        .map(|_| &trimmed[8..])
        .ok_or_else(|| {
            BridgeError::Config(format!("secure endpoint must use https: '{secure}'"))
        })?;
    if rest.is_empty() {
        return Err(BridgeError::Config(format!(
            "secure endpoint has no host: '{secure}'"
        )));
    }
    Ok(format!("http://{rest}"))
}

/// Caller-supplied overrides for a single capture call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureOptions {
    pub timeout_ms: Option<u64>,
    pub post_capture_timeout_ms: Option<u64>,
    pub page_count: Option<u32>,
    pub device_auth_key: Option<String>,
    pub device_auth_hash: Option<String>,
}

// ---------------------------------------------------------------------------
// Capture results
// ---------------------------------------------------------------------------

/// Encrypted biometric payload plus the material that accompanies it.
/// Opaque to the bridge.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiometricTemplate {
    pub raw: String,
    pub session_key: String,
    pub session_key_cipher_id: String,
    pub integrity_code: String,
}

impl std::fmt::Debug for BiometricTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BiometricTemplate")
            .field("raw_len", &self.raw.len())
            .field("session_key_len", &self.session_key.len())
            .field("session_key_cipher_id", &self.session_key_cipher_id)
            .field("integrity_code_len", &self.integrity_code.len())
            .finish()
    }
}

/// Device metadata reported alongside a successful capture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureDeviceInfo {
    pub model: String,
    pub manufacturer: String,
    pub device_provider_id: String,
    pub device_code: String,
    pub serial_number: String,
    pub system_id: String,
    pub driver_version: String,
    pub driver_id: String,
    pub modality_type: String,
    pub device_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSuccess {
    /// Passed through exactly as the driver reported it.
    pub quality_score: i64,
    pub match_points: i64,
    pub message: String,
    pub modality: Modality,
    pub template: BiometricTemplate,
    pub device_info: CaptureDeviceInfo,
    /// RFC 3339 timestamp.
    pub captured_at: String,
}

/// Who produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOrigin {
    /// The driver answered with a non-zero `errCode`.
    Device,
    /// Transport, parse or envelope fault inside the bridge.
    Bridge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFailure {
    pub error_code: i64,
    pub error_message: String,
    pub origin: FailureOrigin,
    pub modality: Modality,
    pub captured_at: String,
}

impl CaptureFailure {
    /// A failure never carries code 0; that value is reserved for success.
    pub fn new(
        error_code: i64,
        error_message: impl Into<String>,
        origin: FailureOrigin,
        modality: Modality,
        captured_at: String,
    ) -> Self {
        let error_code = if error_code == 0 {
            codes::UNCLASSIFIED
        } else {
            error_code
        };
        Self {
            error_code,
            error_message: error_message.into(),
            origin,
            modality,
            captured_at,
        }
    }
}

/// Outcome of one capture call. `error_code() == 0` exactly when `Success`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureResult {
    Success(CaptureSuccess),
    Failure(CaptureFailure),
}

impl CaptureResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn error_code(&self) -> i64 {
        match self {
            Self::Success(_) => 0,
            Self::Failure(f) => f.error_code,
        }
    }

    pub fn modality(&self) -> Modality {
        match self {
            Self::Success(s) => s.modality,
            Self::Failure(f) => f.modality,
        }
    }

    pub fn captured_at(&self) -> &str {
        match self {
            Self::Success(s) => &s.captured_at,
            Self::Failure(f) => &f.captured_at,
        }
    }

    /// Status code for the upward HTTP response.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Success(_) => 200,
            Self::Failure(f) if f.origin == FailureOrigin::Device => 200,
            Self::Failure(f) => codes::http_status_for_bridge_code(f.error_code),
        }
    }
}

/// Wire shape of a [`CaptureResult`] for the upward JSON API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResponse {
    pub success: bool,
    pub error_code: i64,
    pub error_message: String,
    pub q_score: Option<i64>,
    pub nm_points: Option<i64>,
    #[serde(rename = "type")]
    pub modality: Modality,
    pub templates: Option<BiometricTemplate>,
    pub device_info: Option<CaptureDeviceInfo>,
    pub timestamp: String,
}

impl From<&CaptureResult> for CaptureResponse {
    fn from(result: &CaptureResult) -> Self {
        match result {
            CaptureResult::Success(s) => Self {
                success: true,
                error_code: 0,
                error_message: s.message.clone(),
                q_score: Some(s.quality_score),
                nm_points: Some(s.match_points),
                modality: s.modality,
                templates: Some(s.template.clone()),
                device_info: Some(s.device_info.clone()),
                timestamp: s.captured_at.clone(),
            },
            CaptureResult::Failure(f) => Self {
                success: false,
                error_code: f.error_code,
                error_message: f.error_message.clone(),
                q_score: None,
                nm_points: None,
                modality: f.modality,
                templates: None,
                device_info: None,
                timestamp: f.captured_at.clone(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Connectivity and health
// ---------------------------------------------------------------------------

/// Result of one connectivity probe against the driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub connected: bool,
    pub endpoint_used: Option<String>,
    pub response_time_ms: Option<u64>,
    pub error: Option<String>,
}

/// Health-check status keywords.
pub mod health_status {
    pub const READY: &str = "ready";
    pub const NOT_DETECTED: &str = "not-detected";
    pub const INFERRED_AVAILABLE: &str = "inferred-available";
    pub const NOT_CONNECTED: &str = "rdservice-not-connected";
    pub const PARSE_ERROR: &str = "info-parse-error";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModalityHealth {
    pub available: bool,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub status: String,
}

impl ModalityHealth {
    pub fn unavailable(status: &str) -> Self {
        Self {
            available: false,
            manufacturer: None,
            model: None,
            status: status.to_string(),
        }
    }
}

/// Per-modality availability summary. Recomputed on every probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceHealth {
    pub fingerprint: ModalityHealth,
    pub iris: ModalityHealth,
    pub photograph: ModalityHealth,
}

impl DeviceHealth {
    /// Same status for every modality.
    pub fn uniform(status: &str) -> Self {
        Self {
            fingerprint: ModalityHealth::unavailable(status),
            iris: ModalityHealth::unavailable(status),
            photograph: ModalityHealth::unavailable(status),
        }
    }

    pub fn get(&self, modality: Modality) -> &ModalityHealth {
        match modality {
            Modality::Fingerprint => &self.fingerprint,
            Modality::Iris => &self.iris,
            Modality::Photograph => &self.photograph,
        }
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Result normalizer — folds extractor output and every recoverable fault into
// a `CaptureResult`.

use chrono::{SecondsFormat, Utc};

use rdbridge_core::codes;
use rdbridge_core::error::BridgeError;
use rdbridge_core::types::{
    CaptureDeviceInfo, CaptureFailure, CaptureResult, CaptureSuccess, FailureOrigin, Modality,
};

use crate::pid::{PidEnvelope, PidOutcome};

/// Map the outcome of one capture pipeline run onto a `CaptureResult`.
///
/// Transport faults keep their class code (100/110/120/999); parse and
/// envelope faults become 999; device-reported codes pass through unchanged.
/// The quality score is never clamped.
pub fn normalize(
    outcome: Result<PidOutcome, BridgeError>,
    modality: Modality,
) -> CaptureResult {
    match outcome {
        Ok(PidOutcome::Captured(envelope)) => success(envelope, modality),
        Ok(PidOutcome::DeviceError { code, message }) => CaptureResult::Failure(
            CaptureFailure::new(code, message, FailureOrigin::Device, modality, now()),
        ),
        Err(err) => failure_from_error(&err, modality),
    }
}

/// Bridge-side failure for an error that never reached the extractor.
pub fn failure_from_error(err: &BridgeError, modality: Modality) -> CaptureResult {
    let code = match err {
        BridgeError::Transport { class, .. } => class.error_code(),
        _ => codes::UNCLASSIFIED,
    };
    CaptureResult::Failure(CaptureFailure::new(
        code,
        err.to_string(),
        FailureOrigin::Bridge,
        modality,
        now(),
    ))
}

fn success(envelope: PidEnvelope, modality: Modality) -> CaptureResult {
    let PidEnvelope {
        status,
        device,
        template,
    } = envelope;
    let additional = device.additional;

    // Prefer the driver's own timestamp when it sent one.
    let captured_at = additional
        .timestamp
        .clone()
        .filter(|ts| !ts.trim().is_empty())
        .unwrap_or_else(now);

    CaptureResult::Success(CaptureSuccess {
        quality_score: status.quality_score,
        match_points: status.match_points,
        message: status.message,
        modality,
        template,
        device_info: CaptureDeviceInfo {
            model: device.model,
            manufacturer: device.manufacturer,
            device_provider_id: device.provider_id,
            device_code: device.device_code,
            serial_number: additional.serial_number.unwrap_or_default(),
            system_id: additional.system_id.unwrap_or_default(),
            driver_version: device.driver_version,
            driver_id: device.driver_id,
            modality_type: additional.modality_type.unwrap_or_default(),
            device_type: additional.device_type.unwrap_or_default(),
        },
        captured_at,
    })
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

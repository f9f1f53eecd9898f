// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PID result extractor — validates the shape of a parsed capture response and
// pulls out status, device metadata and the encrypted biometric envelope.
//
// Elements are located by name with a bounded breadth-first search, so both
// shapes seen in the field are handled by one path:
//
//   <PidData><Resp/>...</PidData>
//   <Wrapper><PidData><Resp/>...</PidData></Wrapper>

use tracing::{debug, warn};

use rdbridge_core::error::{BridgeError, Result};
use rdbridge_core::types::{BiometricTemplate, Modality};

use crate::document::Element;

/// How far below the root the envelope elements may sit.
pub const MAX_ENVELOPE_DEPTH: usize = 2;

const RESP: &str = "Resp";
const DEVICE_INFO: &str = "DeviceInfo";
const DATA: &str = "Data";
const SKEY: &str = "Skey";
const HMAC: &str = "Hmac";
const PARAM: &str = "Param";

pub const SUCCESS_MESSAGE: &str = "Capture Success";
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";

/// Contents of the `Resp` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseStatus {
    pub error_code: i64,
    pub quality_score: i64,
    pub match_points: i64,
    pub message: String,
}

/// Vendor `Param` list under `DeviceInfo`. Unknown keys are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdditionalInfo {
    pub serial_number: Option<String>,
    pub system_id: Option<String>,
    pub timestamp: Option<String>,
    pub modality_type: Option<String>,
    pub device_type: Option<String>,
}

/// Attributes of the `DeviceInfo` element plus its additional-info list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDetails {
    pub model: String,
    pub manufacturer: String,
    pub provider_id: String,
    pub device_code: String,
    pub driver_version: String,
    pub driver_id: String,
    pub additional: AdditionalInfo,
}

impl DeviceDetails {
    pub fn from_element(info: &Element) -> Self {
        let attr = |name: &str| info.attr(name).unwrap_or_default().to_string();
        Self {
            model: attr("mi"),
            manufacturer: manufacturer_of(info).unwrap_or_default(),
            provider_id: attr("dpId"),
            device_code: attr("dc"),
            driver_version: attr("rdsVer"),
            driver_id: attr("rdsId"),
            additional: read_additional_info(info),
        }
    }
}

/// `mc`, falling back to the provider id when a driver leaves it out.
pub fn manufacturer_of(info: &Element) -> Option<String> {
    ["mc", "dpId"]
        .iter()
        .filter_map(|name| info.attr(name))
        .find(|value| !value.trim().is_empty())
        .map(str::to_string)
}

/// A validated success envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidEnvelope {
    pub status: ResponseStatus,
    pub device: DeviceDetails,
    pub template: BiometricTemplate,
}

/// What the driver told us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PidOutcome {
    /// `errCode == 0` and the full envelope is present.
    Captured(PidEnvelope),
    /// The driver reported a failure itself.
    DeviceError { code: i64, message: String },
}

/// Validate a parsed capture response.
///
/// A non-zero `errCode` short-circuits to [`PidOutcome::DeviceError`] without
/// looking for the other elements, since drivers omit them on error. On
/// success a missing `DeviceInfo` or `Data` element is a
/// [`BridgeError::MissingEnvelope`]: the driver claimed success but the
/// response was truncated.
pub fn extract(doc: &Element, modality: Modality) -> Result<PidOutcome> {
    let resp = doc.find(RESP, MAX_ENVELOPE_DEPTH).ok_or_else(|| {
        BridgeError::MissingEnvelope(format!("no <{RESP}> element under <{}>", doc.tag))
    })?;
    let status = read_response_status(resp)?;

    if status.error_code != 0 {
        debug!(%modality, err_code = status.error_code, "driver reported capture failure");
        return Ok(PidOutcome::DeviceError {
            code: status.error_code,
            message: status.message,
        });
    }

    let info = doc.find(DEVICE_INFO, MAX_ENVELOPE_DEPTH).ok_or_else(|| {
        BridgeError::MissingEnvelope(format!("success response without <{DEVICE_INFO}>"))
    })?;
    let data = doc.find(DATA, MAX_ENVELOPE_DEPTH).ok_or_else(|| {
        BridgeError::MissingEnvelope(format!("success response without <{DATA}>"))
    })?;

    let skey = doc.find(SKEY, MAX_ENVELOPE_DEPTH);
    let hmac = doc.find(HMAC, MAX_ENVELOPE_DEPTH);
    if skey.is_none() || hmac.is_none() {
        warn!(
            %modality,
            has_skey = skey.is_some(),
            has_hmac = hmac.is_some(),
            "success envelope is missing key material"
        );
    }

    let template = BiometricTemplate {
        raw: data.text.clone(),
        session_key: skey.map(|s| s.text.clone()).unwrap_or_default(),
        session_key_cipher_id: skey
            .and_then(|s| s.attr("ci"))
            .unwrap_or_default()
            .to_string(),
        integrity_code: hmac.map(|h| h.text.clone()).unwrap_or_default(),
    };
    debug!(
        %modality,
        q_score = status.quality_score,
        payload_len = template.raw.len(),
        "PID envelope extracted"
    );

    Ok(PidOutcome::Captured(PidEnvelope {
        status,
        device: DeviceDetails::from_element(info),
        template,
    }))
}

fn read_response_status(resp: &Element) -> Result<ResponseStatus> {
    let error_code = resp.attr("errCode").and_then(parse_int).ok_or_else(|| {
        BridgeError::MissingEnvelope(format!("<{RESP}> has no usable errCode"))
    })?;
    let quality_score = resp.attr("qScore").and_then(parse_int).unwrap_or(0);
    let match_points = resp.attr("nmPoints").and_then(parse_int).unwrap_or(0);

    let message = match resp.attr("errInfo").map(str::trim) {
        Some(info) if !info.is_empty() => info.to_string(),
        _ if error_code == 0 => SUCCESS_MESSAGE.to_string(),
        _ => UNKNOWN_ERROR_MESSAGE.to_string(),
    };

    Ok(ResponseStatus {
        error_code,
        quality_score,
        match_points,
        message,
    })
}

/// Integer attribute; a fractional value is truncated.
fn parse_int(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| v.trunc() as i64)
    })
}

fn read_additional_info(info: &Element) -> AdditionalInfo {
    let mut additional = AdditionalInfo::default();
    // Params sit under `additional_info` on most drivers, directly under
    // `DeviceInfo` on a few.
    let params = info.children.iter().flat_map(|child| {
        if child.tag == PARAM {
            vec![child]
        } else {
            child.children_named(PARAM).collect()
        }
    });

    for param in params {
        let (Some(name), Some(value)) = (param.attr("name"), param.attr("value")) else {
            continue;
        };
        let slot = match name {
            "srno" => &mut additional.serial_number,
            "sysid" => &mut additional.system_id,
            "ts" => &mut additional.timestamp,
            "modality_type" => &mut additional.modality_type,
            "device_type" => &mut additional.device_type,
            _ => continue,
        };
        *slot = Some(value.to_string());
    }
    additional
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse;
    use crate::fixtures::{DEVICE_ERROR_PID, SUCCESS_PID, wrapped};

    fn captured(xml: &str) -> PidEnvelope {
        match extract(&parse(xml).unwrap(), Modality::Fingerprint).unwrap() {
            PidOutcome::Captured(envelope) => envelope,
            other => panic!("expected capture, got {other:?}"),
        }
    }

    #[test]
    fn extracts_full_success_envelope() {
        let envelope = captured(SUCCESS_PID);
        assert_eq!(envelope.status.error_code, 0);
        assert_eq!(envelope.status.quality_score, 72);
        assert_eq!(envelope.status.match_points, 4);
        assert_eq!(envelope.status.message, "Success.");

        assert_eq!(envelope.template.raw, "RW5jcnlwdGVkUGF5bG9hZA==");
        assert_eq!(envelope.template.session_key, "U2Vzc2lvbktleQ==");
        assert_eq!(envelope.template.session_key_cipher_id, "20291231");
        assert_eq!(envelope.template.integrity_code, "SG1hY1ZhbHVl");

        let device = &envelope.device;
        assert_eq!(device.model, "MFS100");
        assert_eq!(device.provider_id, "MANTRA.MSIPL");
        assert_eq!(device.driver_version, "1.0.8");
        assert_eq!(device.driver_id, "RENESAS.MANTRA.001");
        assert_eq!(device.additional.serial_number.as_deref(), Some("2133579"));
        assert_eq!(device.additional.device_type.as_deref(), Some("L1"));
        assert_eq!(
            device.additional.timestamp.as_deref(),
            Some("2026-03-01T10:15:30+05:30")
        );
    }

    #[test]
    fn wrapped_envelope_is_accepted() {
        assert_eq!(captured(&wrapped(SUCCESS_PID)), captured(SUCCESS_PID));
    }

    #[test]
    fn device_error_short_circuits_without_envelope() {
        let outcome = extract(&parse(DEVICE_ERROR_PID).unwrap(), Modality::Iris).unwrap();
        assert_eq!(
            outcome,
            PidOutcome::DeviceError {
                code: 1,
                message: "Capture timed out at device".into()
            }
        );
    }

    #[test]
    fn device_error_without_message_uses_default() {
        let doc = parse(r#"<PidData><Resp errCode="730"/></PidData>"#).unwrap();
        let outcome = extract(&doc, Modality::Fingerprint).unwrap();
        assert_eq!(
            outcome,
            PidOutcome::DeviceError {
                code: 730,
                message: UNKNOWN_ERROR_MESSAGE.into()
            }
        );
    }

    #[test]
    fn success_without_data_is_missing_envelope() {
        let xml = SUCCESS_PID.replace(r#"<Data type="X">RW5jcnlwdGVkUGF5bG9hZA==</Data>"#, "");
        let err = extract(&parse(&xml).unwrap(), Modality::Fingerprint).unwrap_err();
        assert!(matches!(err, BridgeError::MissingEnvelope(_)));
    }

    #[test]
    fn success_without_device_info_is_missing_envelope() {
        let doc = parse(r#"<PidData><Resp errCode="0"/><Data>QQ==</Data></PidData>"#).unwrap();
        assert!(matches!(
            extract(&doc, Modality::Fingerprint),
            Err(BridgeError::MissingEnvelope(_))
        ));
    }

    #[test]
    fn missing_resp_or_err_code_is_missing_envelope() {
        for xml in [
            "<PidData><DeviceInfo/></PidData>",
            r#"<PidData><Resp qScore="50"/></PidData>"#,
            r#"<PidData><Resp errCode="abc"/></PidData>"#,
            // Three levels down is past the search bound.
            r#"<A><B><C><Resp errCode="0"/></C></B></A>"#,
        ] {
            assert!(
                matches!(
                    extract(&parse(xml).unwrap(), Modality::Photograph),
                    Err(BridgeError::MissingEnvelope(_))
                ),
                "expected missing envelope for {xml}"
            );
        }
    }

    #[test]
    fn out_of_range_quality_is_passed_through() {
        let envelope = captured(&SUCCESS_PID.replace(r#"qScore="72""#, r#"qScore="150""#));
        assert_eq!(envelope.status.quality_score, 150);
    }

    #[test]
    fn default_success_message_when_err_info_blank() {
        let envelope = captured(&SUCCESS_PID.replace(r#"errInfo="Success.""#, r#"errInfo=" ""#));
        assert_eq!(envelope.status.message, SUCCESS_MESSAGE);
    }

    #[test]
    fn params_directly_under_device_info_are_read() {
        let doc = parse(
            r#"<PidData><Resp errCode="0"/><DeviceInfo mi="X"><Param name="srno" value="9"/></DeviceInfo><Data>QQ==</Data></PidData>"#,
        )
        .unwrap();
        let PidOutcome::Captured(envelope) = extract(&doc, Modality::Fingerprint).unwrap() else {
            panic!("expected capture");
        };
        assert_eq!(envelope.device.additional.serial_number.as_deref(), Some("9"));
        assert!(envelope.template.session_key.is_empty());
    }

    #[test]
    fn parse_int_accepts_fractional_values() {
        assert_eq!(parse_int(" 72 "), Some(72));
        assert_eq!(parse_int("72.9"), Some(72));
        assert_eq!(parse_int("-1"), Some(-1));
        assert_eq!(parse_int("NaN"), None);
        assert_eq!(parse_int(""), None);
    }

    #[test]
    fn manufacturer_falls_back_to_provider_id() {
        let doc = parse(r#"<DeviceInfo dpId="STARTEK.ACPL" mc=""/>"#).unwrap();
        assert_eq!(manufacturer_of(&doc).as_deref(), Some("STARTEK.ACPL"));
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Capture request builder — serialises a `PidOptions` document from a device
// profile and the caller's overrides.
//
// Field resolution order: caller option, then profile default, then a fixed
// literal. The attribute order matches what RD service drivers emit in their
// own samples; some drivers are picky about it.

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, Event};

use rdbridge_core::error::{BridgeError, Result};
use rdbridge_core::types::{CaptureOptions, DeviceProfile};

/// `PidOptions@ver`.
pub const PID_OPTIONS_VERSION: &str = "1.0";

/// `Opts@pidVer`.
pub const PID_VERSION: &str = "2.0";

/// `Opts@fType` (fingerprint minutiae type; 0 = FMR).
const FINGER_TYPE: &str = "0";

/// `Opts@pTimeout` when the caller does not set one.
pub const DEFAULT_POST_CAPTURE_TIMEOUT_MS: u64 = 20_000;

/// `Opts@pgCount` when the caller does not set one.
pub const DEFAULT_PAGE_COUNT: u32 = 2;

/// `Opts@posh`: finger position is never known up front.
const POSITION_UNKNOWN: &str = "UNKNOWN";

/// `Opts@env`: production environment.
const ENVIRONMENT: &str = "P";

/// Vendor parameter carrying the device auth key.
const AUTH_KEY_PARAM: &str = "mantrakey";

/// Build the `PidOptions` document for one capture call.
pub fn build(profile: &DeviceProfile, opts: &CaptureOptions) -> Result<String> {
    let defaults = &profile.defaults;
    let timeout = opts.timeout_ms.unwrap_or(profile.timeout_ms).to_string();
    let post_timeout = opts
        .post_capture_timeout_ms
        .unwrap_or(DEFAULT_POST_CAPTURE_TIMEOUT_MS)
        .to_string();
    let page_count = opts.page_count.unwrap_or(DEFAULT_PAGE_COUNT).to_string();
    let finger_count = defaults.finger_count.to_string();
    let iris_count = defaults.iris_count.to_string();
    let photo_count = defaults.photo_count.to_string();
    let format = defaults.format_code.to_string();

    let mut writer = Writer::new(Vec::new());

    let mut root = BytesStart::new("PidOptions");
    root.push_attribute(("ver", PID_OPTIONS_VERSION));
    emit(&mut writer, Event::Start(root))?;

    let mut opts_elem = BytesStart::new("Opts");
    opts_elem.push_attribute(("fCount", finger_count.as_str()));
    opts_elem.push_attribute(("fType", FINGER_TYPE));
    opts_elem.push_attribute(("iCount", iris_count.as_str()));
    opts_elem.push_attribute(("pCount", photo_count.as_str()));
    opts_elem.push_attribute(("pgCount", page_count.as_str()));
    opts_elem.push_attribute(("format", format.as_str()));
    opts_elem.push_attribute(("pidVer", PID_VERSION));
    opts_elem.push_attribute(("timeout", timeout.as_str()));
    opts_elem.push_attribute(("pTimeout", post_timeout.as_str()));
    opts_elem.push_attribute(("posh", POSITION_UNKNOWN));
    opts_elem.push_attribute(("env", ENVIRONMENT));
    if let Some(hash) = opts.device_auth_hash.as_deref() {
        opts_elem.push_attribute(("wadh", hash));
    }
    emit(&mut writer, Event::Empty(opts_elem))?;

    emit(&mut writer, Event::Start(BytesStart::new("CustOpts")))?;
    let mut key_param = BytesStart::new("Param");
    key_param.push_attribute(("name", AUTH_KEY_PARAM));
    key_param.push_attribute(("value", opts.device_auth_key.as_deref().unwrap_or("")));
    emit(&mut writer, Event::Empty(key_param))?;
    emit(&mut writer, Event::End(BytesEnd::new("CustOpts")))?;

    emit(&mut writer, Event::End(BytesEnd::new("PidOptions")))?;

    String::from_utf8(writer.into_inner())
        .map_err(|e| BridgeError::MalformedDocument(format!("PID options not UTF-8: {e}")))
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| BridgeError::MalformedDocument(format!("writing PID options: {e}")))
}

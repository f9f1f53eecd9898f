// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Driver responses shared by the unit tests.

/// A complete success response as a Mantra-style driver emits it.
pub const SUCCESS_PID: &str = r#"<?xml version="1.0"?>
<PidData>
  <Resp errCode="0" errInfo="Success." fCount="1" fType="0" nmPoints="4" qScore="72"/>
  <DeviceInfo dpId="MANTRA.MSIPL" rdsId="RENESAS.MANTRA.001" rdsVer="1.0.8" mi="MFS100" mc="MIIEGDCCAwCgAwIBAgIEAde" dc="b9a4c3d2-7f1e">
    <additional_info>
      <Param name="srno" value="2133579"/>
      <Param name="sysid" value="4C4C4544-0038"/>
      <Param name="ts" value="2026-03-01T10:15:30+05:30"/>
      <Param name="modality_type" value="Finger"/>
      <Param name="device_type" value="L1"/>
      <Param name="vendor_flag" value="ignored"/>
    </additional_info>
  </DeviceInfo>
  <Skey ci="20291231">U2Vzc2lvbktleQ==</Skey>
  <Hmac>SG1hY1ZhbHVl</Hmac>
  <Data type="X">RW5jcnlwdGVkUGF5bG9hZA==</Data>
</PidData>"#;

/// The same response wrapped in a redundant outer element.
pub fn wrapped(inner: &str) -> String {
    let body = inner.trim_start_matches(r#"<?xml version="1.0"?>"#);
    format!("<RDResponse>{body}</RDResponse>")
}

/// Device-reported failure; the driver omits everything but `Resp`.
pub const DEVICE_ERROR_PID: &str =
    r#"<PidData><Resp errCode="1" errInfo="Capture timed out at device"/></PidData>"#;

/// Info response for the health probe.
pub const DEVICE_INFO: &str = r#"<DeviceInfo dpId="MANTRA.MSIPL" rdsId="RENESAS.MANTRA.001" rdsVer="1.0.8" dc="b9a4c3d2-7f1e" mi="MFS100" mc="MIIEGDCCAwCgAwIBAgIEAde">
  <additional_info><Param name="srno" value="2133579"/></additional_info>
</DeviceInfo>"#;

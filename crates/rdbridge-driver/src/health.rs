// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Health aggregator — polls the driver's info endpoint and reduces the answer
// to a per-modality availability summary.
//
// Only the fingerprint device has its own info element in the protocol. Iris
// and photograph availability is inferred from the driver being reachable;
// it is an approximation, not a measurement.

use std::time::Duration;

use tracing::{info, instrument, warn};

use rdbridge_core::types::{
    ConnectionStatus, DeviceHealth, DeviceProfile, ModalityHealth, health_status,
};

use crate::document::{self, Element};
use crate::pid::{MAX_ENVELOPE_DEPTH, manufacturer_of};
use crate::transport::{DriverExchange, DriverMethod, DriverRequest, TransportClient};

const DEVICE_INFO: &str = "DeviceInfo";

/// Probe the driver once through `profile`'s secure-then-insecure endpoints.
#[instrument(skip(transport, profile), fields(modality = %profile.modality))]
pub async fn probe<E: DriverExchange>(
    transport: &TransportClient<E>,
    profile: &DeviceProfile,
    info_path: &str,
) -> (ConnectionStatus, DeviceHealth) {
    let request = DriverRequest {
        method: DriverMethod::DeviceInfo,
        path: info_path.to_string(),
        body: None,
    };
    let mut raw = transport
        .send(
            &profile.info_candidates(),
            &request,
            Duration::from_millis(profile.timeout_ms),
        )
        .await;
    let response_time_ms = Some(raw.elapsed.as_millis() as u64);

    if let Some(fault) = raw.transport_error.take() {
        warn!(class = %fault.class, "RD service not reachable");
        let status = ConnectionStatus {
            connected: false,
            endpoint_used: None,
            response_time_ms,
            error: Some(format!("{}: {}", fault.class.describe(), fault.detail)),
        };
        return (status, DeviceHealth::uniform(health_status::NOT_CONNECTED));
    }

    let status = ConnectionStatus {
        connected: true,
        endpoint_used: raw.endpoint_used.clone(),
        response_time_ms,
        error: None,
    };

    let health = match document::parse_bytes(&raw.body) {
        Ok(doc) => summarize(&doc),
        Err(e) => {
            warn!(error = %e, "could not parse device info");
            DeviceHealth::uniform(health_status::PARSE_ERROR)
        }
    };
    info!(
        fingerprint = %health.fingerprint.status,
        endpoint = raw.endpoint_used.as_deref().unwrap_or_default(),
        "health probe complete"
    );
    (status, health)
}

/// Reduce a parsed info document from a reachable driver.
pub fn summarize(doc: &Element) -> DeviceHealth {
    let fingerprint = match doc.find(DEVICE_INFO, MAX_ENVELOPE_DEPTH) {
        Some(info) => {
            let model = info
                .attr("mi")
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string);
            ModalityHealth {
                available: model.is_some(),
                manufacturer: manufacturer_of(info),
                status: if model.is_some() {
                    health_status::READY
                } else {
                    health_status::NOT_DETECTED
                }
                .to_string(),
                model,
            }
        }
        None => ModalityHealth::unavailable(health_status::NOT_DETECTED),
    };

    let inferred = ModalityHealth {
        available: true,
        manufacturer: None,
        model: None,
        status: health_status::INFERRED_AVAILABLE.to_string(),
    };

    DeviceHealth {
        fingerprint,
        iris: inferred.clone(),
        photograph: inferred,
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use rdbridge_core::config::BridgeConfig;
    use rdbridge_core::types::Modality;

    use crate::fixtures::DEVICE_INFO as INFO_XML;
    use crate::registry::DeviceRegistry;
    use crate::transport::RawFault;
    use crate::transport::stub::{Script, StubExchange};

    fn fingerprint_profile() -> DeviceProfile {
        DeviceRegistry::from_config(&BridgeConfig::default())
            .unwrap()
            .resolve(Modality::Fingerprint)
            .unwrap()
            .clone()
    }

    #[tokio::test]
    async fn reachable_driver_reports_fingerprint_details() {
        let profile = fingerprint_profile();
        let transport = TransportClient::new(
            StubExchange::new().on(&profile.secure_endpoint, Script::Reply(200, INFO_XML.into())),
        );
        let (status, health) = probe(&transport, &profile, "/rd/info").await;

        assert!(status.connected);
        assert_eq!(status.endpoint_used.as_deref(), Some("https://127.0.0.1:11100"));
        assert!(status.error.is_none());

        assert!(health.fingerprint.available);
        assert_eq!(health.fingerprint.model.as_deref(), Some("MFS100"));
        assert_eq!(health.fingerprint.status, health_status::READY);
        assert!(health.iris.available);
        assert_eq!(health.photograph.status, health_status::INFERRED_AVAILABLE);
    }

    #[tokio::test]
    async fn insecure_fallback_serves_health() {
        let profile = fingerprint_profile();
        let exchange = StubExchange::new()
            .on(
                &profile.secure_endpoint,
                Script::Fail(RawFault::io(io::ErrorKind::ConnectionReset, "bad tls")),
            )
            .on(&profile.insecure_endpoint, Script::Reply(200, INFO_XML.into()));
        let transport = TransportClient::new(exchange);
        let (status, health) = probe(&transport, &profile, "/rd/info").await;

        assert!(status.connected);
        assert_eq!(status.endpoint_used.as_deref(), Some("http://127.0.0.1:11100"));
        assert!(health.fingerprint.available);
    }

    #[tokio::test]
    async fn unreachable_driver_marks_everything_unavailable() {
        let profile = fingerprint_profile();
        let transport = TransportClient::new(StubExchange::new());
        let (status, health) = probe(&transport, &profile, "/rd/info").await;

        assert!(!status.connected);
        assert!(status.error.unwrap().contains("not running"));
        for modality in Modality::all() {
            let entry = health.get(*modality);
            assert!(!entry.available);
            assert_eq!(entry.status, health_status::NOT_CONNECTED);
        }
    }

    #[tokio::test]
    async fn unparsable_info_is_a_parse_error_for_all() {
        let profile = fingerprint_profile();
        let transport = TransportClient::new(
            StubExchange::new().on(&profile.secure_endpoint, Script::Reply(200, "<DeviceInfo".into())),
        );
        let (status, health) = probe(&transport, &profile, "/rd/info").await;

        assert!(status.connected);
        assert_eq!(health, DeviceHealth::uniform(health_status::PARSE_ERROR));
    }

    #[test]
    fn info_without_model_is_not_detected() {
        let doc = document::parse(r#"<DeviceInfo dpId="MANTRA.MSIPL" mi=""/>"#).unwrap();
        let health = summarize(&doc);
        assert!(!health.fingerprint.available);
        assert_eq!(health.fingerprint.status, health_status::NOT_DETECTED);
        assert_eq!(health.fingerprint.manufacturer.as_deref(), Some("MANTRA.MSIPL"));
        assert!(health.iris.available);
    }
}

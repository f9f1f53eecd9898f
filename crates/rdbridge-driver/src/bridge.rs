// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `RdBridge` — wires the registry, request builder, transport, parser,
// extractor, normalizer and health aggregator into the operations the upward
// HTTP surface calls.
//
// Capture pipeline:
//   profile → PidOptions → transport (secure only) → parse → extract → normalize
//
// Concurrent capture calls are not serialised here beyond the transport's
// one-connection permit; the hardware is single-capture and callers are
// expected to take turns.

use std::time::Duration;

use serde::Serialize;
use tracing::{Instrument, info, info_span, instrument, warn};
use uuid::Uuid;

use rdbridge_core::config::{BridgeConfig, DriverPaths};
use rdbridge_core::error::{BridgeError, Result};
use rdbridge_core::types::{
    CaptureOptions, CaptureResult, ConnectionStatus, DeviceHealth, DeviceProfile, Modality,
};

use crate::document::{self, Element};
use crate::health;
use crate::http::HttpExchange;
use crate::normalize::normalize;
use crate::pid::{self, PidOutcome};
use crate::pid_options;
use crate::registry::DeviceRegistry;
use crate::transport::{DriverExchange, DriverMethod, DriverRequest, RawDriverResponse, TransportClient};

/// Answer to an `RDSERVICE` discovery call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RdServiceStatus {
    pub connected: bool,
    pub rdservice_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The driver bridge. Immutable after construction; share it behind an `Arc`.
pub struct RdBridge<E = HttpExchange> {
    registry: DeviceRegistry,
    paths: DriverPaths,
    transport: TransportClient<E>,
}

impl RdBridge<HttpExchange> {
    /// Production bridge from validated configuration.
    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            DeviceRegistry::from_config(config)?,
            config.driver.clone(),
            HttpExchange::new()?,
        ))
    }
}

impl<E: DriverExchange> RdBridge<E> {
    pub fn new(registry: DeviceRegistry, paths: DriverPaths, exchange: E) -> Self {
        Self {
            registry,
            paths,
            transport: TransportClient::new(exchange),
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Capture one sample.
    ///
    /// Every transport, parse and envelope fault comes back as
    /// `CaptureResult::Failure`; only an unconfigured modality is an `Err`.
    pub async fn capture(&self, modality: Modality, opts: &CaptureOptions) -> Result<CaptureResult> {
        let profile = self.registry.resolve(modality)?;
        let request_id = Uuid::new_v4();
        let span = info_span!("capture", %modality, %request_id);

        let result = async move {
            let outcome = self.run_capture(profile, opts).await;
            let result = normalize(outcome, modality);
            match &result {
                CaptureResult::Success(s) => info!(
                    q_score = s.quality_score,
                    nm_points = s.match_points,
                    "capture succeeded"
                ),
                CaptureResult::Failure(f) => warn!(
                    err_code = f.error_code,
                    origin = ?f.origin,
                    message = %f.error_message,
                    "capture failed"
                ),
            }
            result
        }
        .instrument(span)
        .await;
        Ok(result)
    }

    async fn run_capture(
        &self,
        profile: &DeviceProfile,
        opts: &CaptureOptions,
    ) -> Result<PidOutcome> {
        let body = pid_options::build(profile, opts)?;
        let request = DriverRequest {
            method: DriverMethod::Capture,
            path: self.paths.capture_path.clone(),
            body: Some(body),
        };
        let timeout = Duration::from_millis(opts.timeout_ms.unwrap_or(profile.timeout_ms));

        let raw = self
            .transport
            .send(&profile.capture_candidates(), &request, timeout)
            .await;
        let doc = response_document(raw)?;
        pid::extract(&doc, profile.modality)
    }

    /// Fetch and parse the driver's device-info document.
    #[instrument(skip(self))]
    pub async fn device_info(&self) -> Result<Element> {
        let profile = self.registry.resolve(Modality::Fingerprint)?;
        let request = DriverRequest {
            method: DriverMethod::DeviceInfo,
            path: self.paths.info_path.clone(),
            body: None,
        };
        let raw = self
            .transport
            .send(
                &profile.info_candidates(),
                &request,
                Duration::from_millis(profile.timeout_ms),
            )
            .await;
        response_document(raw)
    }

    /// One connectivity probe plus per-modality health.
    pub async fn probe_health(&self) -> Result<(ConnectionStatus, DeviceHealth)> {
        let profile = self.registry.resolve(Modality::Fingerprint)?;
        Ok(health::probe(&self.transport, profile, &self.paths.info_path).await)
    }

    /// `RDSERVICE` discovery call; returns the driver's raw answer.
    #[instrument(skip(self))]
    pub async fn rdservice_status(&self) -> Result<RdServiceStatus> {
        let profile = self.registry.resolve(Modality::Fingerprint)?;
        let request = DriverRequest {
            method: DriverMethod::RdService,
            path: self.paths.rdservice_path.clone(),
            body: None,
        };
        let raw = self
            .transport
            .send(
                &profile.info_candidates(),
                &request,
                Duration::from_millis(profile.timeout_ms),
            )
            .await;

        Ok(match &raw.transport_error {
            Some(fault) => RdServiceStatus {
                connected: false,
                rdservice_url: profile.secure_endpoint.clone(),
                response: None,
                error: Some(format!("{}: {}", fault.class.describe(), fault.detail)),
            },
            None => RdServiceStatus {
                connected: true,
                rdservice_url: raw
                    .endpoint_used
                    .clone()
                    .unwrap_or_else(|| profile.secure_endpoint.clone()),
                response: Some(raw.body_text().into_owned()),
                error: None,
            },
        })
    }
}

/// Turn a raw driver response into a parsed document, or the fault that
/// prevented it.
fn response_document(mut raw: RawDriverResponse) -> Result<Element> {
    if let Some(fault) = raw.transport_error.take() {
        return Err(BridgeError::Transport {
            class: fault.class,
            detail: fault.detail,
        });
    }
    let status = raw.status_code.unwrap_or_default();
    if raw.is_empty() {
        return Err(BridgeError::MalformedDocument(format!(
            "Empty response from RD service (HTTP {status})"
        )));
    }
    document::parse_bytes(&raw.body)
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;

    use super::*;
    use rdbridge_core::codes;
    use rdbridge_core::types::FailureOrigin;

    use crate::fixtures::{DEVICE_INFO, SUCCESS_PID};
    use crate::transport::RawFault;
    use crate::transport::stub::{Script, StubExchange};

    const SECURE: &str = "https://127.0.0.1:11100";
    const INSECURE: &str = "http://127.0.0.1:11100";

    fn bridge(exchange: Arc<StubExchange>) -> RdBridge<Arc<StubExchange>> {
        let config = BridgeConfig::default();
        RdBridge::new(
            DeviceRegistry::from_config(&config).unwrap(),
            config.driver.clone(),
            exchange,
        )
    }

    #[tokio::test]
    async fn capture_never_touches_insecure_endpoint() {
        let exchange = Arc::new(
            StubExchange::new()
                .on(SECURE, Script::Reply(200, SUCCESS_PID.into()))
                .on(
                    INSECURE,
                    Script::Fail(RawFault::io(io::ErrorKind::ConnectionRefused, "stub")),
                ),
        );
        let result = bridge(exchange.clone())
            .capture(Modality::Fingerprint, &CaptureOptions::default())
            .await
            .unwrap();

        assert!(result.is_success());
        assert!(exchange.called(SECURE));
        assert!(!exchange.called(INSECURE));
        assert_eq!(exchange.calls(), vec![format!("{SECURE}/rd/capture")]);
    }

    #[tokio::test]
    async fn capture_does_not_fall_back_when_secure_fails() {
        let exchange = Arc::new(
            StubExchange::new()
                .on(
                    SECURE,
                    Script::Fail(RawFault::io(io::ErrorKind::ConnectionRefused, "stub")),
                )
                .on(INSECURE, Script::Reply(200, SUCCESS_PID.into())),
        );
        let result = bridge(exchange.clone())
            .capture(Modality::Fingerprint, &CaptureOptions::default())
            .await
            .unwrap();

        assert_eq!(result.error_code(), codes::DRIVER_UNREACHABLE);
        assert_eq!(result.http_status(), 503);
        assert!(!exchange.called(INSECURE));
    }

    #[tokio::test]
    async fn empty_body_is_999_empty_response() {
        let exchange = Arc::new(StubExchange::new().on(SECURE, Script::Reply(200, String::new())));
        let result = bridge(exchange)
            .capture(Modality::Fingerprint, &CaptureOptions::default())
            .await
            .unwrap();

        let CaptureResult::Failure(f) = result else {
            panic!("expected failure");
        };
        assert_eq!(f.error_code, codes::UNCLASSIFIED);
        assert_eq!(f.origin, FailureOrigin::Bridge);
        assert!(f.error_message.contains("Empty response"), "{}", f.error_message);
    }

    #[tokio::test]
    async fn success_envelope_yields_scores() {
        let exchange = Arc::new(StubExchange::new().on(SECURE, Script::Reply(200, SUCCESS_PID.into())));
        let result = bridge(exchange)
            .capture(Modality::Fingerprint, &CaptureOptions::default())
            .await
            .unwrap();

        let CaptureResult::Success(s) = result else {
            panic!("expected success");
        };
        assert_eq!(s.quality_score, 72);
        assert_eq!(s.match_points, 4);
        assert_eq!(s.modality, Modality::Fingerprint);
    }

    #[tokio::test]
    async fn reset_mid_request_is_110() {
        let iris = "https://127.0.0.1:11101";
        let exchange = Arc::new(StubExchange::new().on(
            iris,
            Script::Fail(RawFault::io(io::ErrorKind::ConnectionReset, "peer reset")),
        ));
        let result = bridge(exchange)
            .capture(Modality::Iris, &CaptureOptions::default())
            .await
            .unwrap();
        assert_eq!(result.error_code(), codes::CONNECTION_INTERRUPTED);
        assert_eq!(result.modality(), Modality::Iris);
    }

    #[tokio::test]
    async fn unconfigured_modality_is_an_error() {
        let bridge = RdBridge::new(
            DeviceRegistry::new(Vec::new()),
            DriverPaths::default(),
            Arc::new(StubExchange::new()),
        );
        let err = bridge
            .capture(Modality::Photograph, &CaptureOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnknownModality(_)));
    }

    #[tokio::test]
    async fn device_info_falls_back_to_insecure() {
        let exchange = Arc::new(
            StubExchange::new()
                .on(
                    SECURE,
                    Script::Fail(RawFault::io(io::ErrorKind::ConnectionRefused, "tls broken")),
                )
                .on(INSECURE, Script::Reply(200, DEVICE_INFO.into())),
        );
        let doc = bridge(exchange.clone()).device_info().await.unwrap();

        assert_eq!(doc.tag, "DeviceInfo");
        assert_eq!(doc.attr("mi"), Some("MFS100"));
        assert_eq!(
            exchange.calls(),
            vec![format!("{SECURE}/rd/info"), format!("{INSECURE}/rd/info")]
        );
    }

    #[tokio::test]
    async fn rdservice_status_reports_raw_answer() {
        let answer = r#"<RDService status="READY" info="Mantra Authentication Vendor Device Manager"/>"#;
        let exchange = Arc::new(StubExchange::new().on(SECURE, Script::Reply(200, answer.into())));
        let status = bridge(exchange).rdservice_status().await.unwrap();

        assert!(status.connected);
        assert_eq!(status.rdservice_url, SECURE);
        assert_eq!(status.response.as_deref(), Some(answer));
        assert!(status.error.is_none());
    }

    #[tokio::test]
    async fn rdservice_status_when_down() {
        let status = bridge(Arc::new(StubExchange::new()))
            .rdservice_status()
            .await
            .unwrap();
        assert!(!status.connected);
        assert!(status.error.is_some());
        assert!(status.response.is_none());
    }

    #[tokio::test]
    async fn health_waits_for_a_hung_capture_instead_of_failing() {
        let exchange = Arc::new(
            StubExchange::new()
                .on(&format!("{SECURE}/rd/capture"), Script::Hang)
                .on(&format!("{SECURE}/rd/info"), Script::Reply(200, DEVICE_INFO.into())),
        );
        let bridge = Arc::new(bridge(exchange.clone()));

        let capturing = {
            let bridge = Arc::clone(&bridge);
            tokio::spawn(async move {
                let opts = CaptureOptions {
                    timeout_ms: Some(300),
                    ..Default::default()
                };
                bridge.capture(Modality::Fingerprint, &opts).await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let (status, health) = bridge.probe_health().await.unwrap();
        let captured = capturing.await.unwrap().unwrap();

        assert_eq!(captured.error_code(), codes::CAPTURE_TIMEOUT);
        assert!(status.connected, "{status:?}");
        assert_eq!(status.endpoint_used.as_deref(), Some(SECURE));
        assert_eq!(health.fingerprint.status, rdbridge_core::types::health_status::READY);
        assert_eq!(
            exchange.calls(),
            vec![format!("{SECURE}/rd/capture"), format!("{SECURE}/rd/info")]
        );
    }

    #[tokio::test]
    async fn capture_timeout_is_the_requested_bound() {
        let exchange = Arc::new(StubExchange::new().on(SECURE, Script::Hang));
        let opts = CaptureOptions {
            timeout_ms: Some(200),
            ..Default::default()
        };
        let started = std::time::Instant::now();
        let result = bridge(exchange)
            .capture(Modality::Fingerprint, &opts)
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert_eq!(result.error_code(), codes::CAPTURE_TIMEOUT);
        assert!(elapsed >= Duration::from_millis(200), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(1_000), "{elapsed:?}");
    }
}

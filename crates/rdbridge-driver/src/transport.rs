// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transport client — sends one request to an ordered list of candidate
// endpoints, strictly one at a time.
//
// Only a connection-level failure moves on to the next candidate. Any HTTP
// response, including a 4xx/5xx, ends the walk: the driver answered, and
// asking a second listener would just repeat the question. Capture callers
// pass the secure endpoint alone; info and health callers pass secure, then
// insecure.
//
// Every attempt holds the single connection permit. RD drivers misbehave
// under concurrent connections, so the bridge never opens two at once.

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use rdbridge_core::codes::FaultClass;

/// Driver verbs. RD services use custom HTTP methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverMethod {
    Capture,
    DeviceInfo,
    RdService,
}

impl DriverMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Capture => "CAPTURE",
            Self::DeviceInfo => "DEVICEINFO",
            Self::RdService => "RDSERVICE",
        }
    }
}

/// `Content-Type` on every downward request.
pub const XML_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// One downward request, independent of which endpoint it goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverRequest {
    pub method: DriverMethod,
    pub path: String,
    pub body: Option<String>,
}

/// A completed HTTP exchange (any status).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Raw facts about a failed exchange, gathered before classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFault {
    /// First `io::ErrorKind` found in the error's source chain.
    pub io_kind: Option<io::ErrorKind>,
    /// The HTTP stack itself reported a deadline.
    pub timed_out: bool,
    /// Failed while establishing the connection.
    pub connect: bool,
    pub detail: String,
}

impl RawFault {
    pub fn timeout(detail: impl Into<String>) -> Self {
        Self {
            timed_out: true,
            detail: detail.into(),
            ..Default::default()
        }
    }

    pub fn io(kind: io::ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            io_kind: Some(kind),
            detail: detail.into(),
            ..Default::default()
        }
    }
}

/// Map a raw transport fault onto one of the four stable classes.
///
/// Checked in order: explicit deadline, I/O kind, error text (some stacks
/// only say "ECONNREFUSED"), then the connect phase as a last resort.
pub fn classify_transport_fault(fault: &RawFault) -> FaultClass {
    if fault.timed_out {
        return FaultClass::TimedOut;
    }

    if let Some(kind) = fault.io_kind {
        match kind {
            io::ErrorKind::TimedOut => return FaultClass::TimedOut,
            io::ErrorKind::ConnectionRefused => return FaultClass::ConnectionRefused,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => return FaultClass::ConnectionReset,
            _ => {}
        }
    }

    let lower = fault.detail.to_ascii_lowercase();
    if lower.contains("timed out") || lower.contains("etimedout") {
        return FaultClass::TimedOut;
    }
    if lower.contains("connection refused") || lower.contains("econnrefused") {
        return FaultClass::ConnectionRefused;
    }
    if lower.contains("connection reset")
        || lower.contains("econnreset")
        || lower.contains("broken pipe")
        || lower.contains("epipe")
    {
        return FaultClass::ConnectionReset;
    }

    if fault.connect {
        return FaultClass::ConnectionRefused;
    }
    FaultClass::Other
}

/// A single HTTP exchange with the driver. Implemented over `reqwest` in
/// production and by scripted stubs in tests.
#[async_trait]
pub trait DriverExchange: Send + Sync {
    async fn exchange(
        &self,
        url: &str,
        request: &DriverRequest,
        timeout: Duration,
    ) -> Result<HttpReply, RawFault>;
}

#[async_trait]
impl<T: DriverExchange + ?Sized> DriverExchange for Arc<T> {
    async fn exchange(
        &self,
        url: &str,
        request: &DriverRequest,
        timeout: Duration,
    ) -> Result<HttpReply, RawFault> {
        (**self).exchange(url, request, timeout).await
    }
}

/// Classified transport failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFault {
    pub class: FaultClass,
    pub endpoint: String,
    pub detail: String,
}

/// Diagnostic record of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub endpoint: String,
    pub elapsed: Duration,
    /// `None` when the attempt produced an HTTP response.
    pub fault: Option<TransportFault>,
}

/// What came back from the driver, or why nothing did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDriverResponse {
    pub status_code: Option<u16>,
    pub body: Vec<u8>,
    /// Last transport error when every candidate failed.
    pub transport_error: Option<TransportFault>,
    pub endpoint_used: Option<String>,
    pub attempts: Vec<Attempt>,
    pub elapsed: Duration,
}

impl RawDriverResponse {
    pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn is_empty(&self) -> bool {
        self.body.iter().all(u8::is_ascii_whitespace)
    }
}

/// Join a base endpoint and a request path with exactly one slash.
pub fn join_url(endpoint: &str, path: &str) -> String {
    let base = endpoint.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        format!("{base}/")
    } else {
        format!("{base}/{path}")
    }
}

/// Sequential fallback over candidate endpoints, one connection at a time.
pub struct TransportClient<E> {
    exchange: E,
    permits: Arc<Semaphore>,
}

impl<E: DriverExchange> TransportClient<E> {
    pub fn new(exchange: E) -> Self {
        Self {
            exchange,
            permits: Arc::new(Semaphore::new(1)),
        }
    }

    /// Try each candidate in order until one returns any HTTP response.
    ///
    /// `timeout` bounds each exchange with the driver. Time spent queued
    /// for the connection permit does not count against it.
    #[instrument(skip(self, request), fields(method = request.method.as_str(), path = %request.path))]
    pub async fn send(
        &self,
        candidates: &[String],
        request: &DriverRequest,
        timeout: Duration,
    ) -> RawDriverResponse {
        let started = Instant::now();
        let mut attempts = Vec::with_capacity(candidates.len());

        for (index, endpoint) in candidates.iter().enumerate() {
            let url = join_url(endpoint, &request.path);
            let attempt_started = Instant::now();
            debug!(attempt = index + 1, url = %url, "sending driver request");

            // Waiting behind another in-flight request is not a driver fault;
            // the attempt's clock starts once the permit is held.
            let outcome = match self.permits.acquire().await {
                Ok(_permit) => {
                    let queued = attempt_started.elapsed();
                    if queued >= Duration::from_millis(1) {
                        debug!(
                            url = %url,
                            queued_ms = queued.as_millis() as u64,
                            "waited for connection permit"
                        );
                    }
                    tokio::time::timeout(timeout, self.exchange.exchange(&url, request, timeout))
                        .await
                        .unwrap_or_else(|_| {
                            Err(RawFault::timeout(format!(
                                "no response within {} ms",
                                timeout.as_millis()
                            )))
                        })
                }
                Err(e) => Err(RawFault {
                    detail: format!("connection permit unavailable: {e}"),
                    ..Default::default()
                }),
            };

            let elapsed = attempt_started.elapsed();
            match outcome {
                Ok(reply) => {
                    info!(
                        url = %url,
                        status = reply.status,
                        bytes = reply.body.len(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "driver responded"
                    );
                    attempts.push(Attempt {
                        endpoint: endpoint.clone(),
                        elapsed,
                        fault: None,
                    });
                    return RawDriverResponse {
                        status_code: Some(reply.status),
                        body: reply.body,
                        transport_error: None,
                        endpoint_used: Some(endpoint.clone()),
                        attempts,
                        elapsed: started.elapsed(),
                    };
                }
                Err(raw) => {
                    let class = classify_transport_fault(&raw);
                    warn!(
                        url = %url,
                        class = %class,
                        elapsed_ms = elapsed.as_millis() as u64,
                        detail = %raw.detail,
                        "driver request failed"
                    );
                    attempts.push(Attempt {
                        endpoint: endpoint.clone(),
                        elapsed,
                        fault: Some(TransportFault {
                            class,
                            endpoint: endpoint.clone(),
                            detail: raw.detail,
                        }),
                    });
                }
            }
        }

        let transport_error = attempts
            .last()
            .and_then(|a| a.fault.clone())
            .unwrap_or_else(|| TransportFault {
                class: FaultClass::Other,
                endpoint: String::new(),
                detail: "no candidate endpoints".into(),
            });

        RawDriverResponse {
            status_code: None,
            body: Vec::new(),
            transport_error: Some(transport_error),
            endpoint_used: None,
            attempts,
            elapsed: started.elapsed(),
        }
    }
}

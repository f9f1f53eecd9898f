// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `reqwest`-backed driver exchange.
//
// RD drivers listen on localhost with a fixed self-signed certificate, so the
// TLS layer accepts any server certificate (signatures on the handshake are
// still checked). Idle connections are never pooled: every attempt opens a
// fresh socket and closes it afterwards.

use std::error::Error as StdError;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use tracing::debug;

use rdbridge_core::error::{BridgeError, Result};

use crate::transport::{DriverExchange, DriverRequest, HttpReply, RawFault, XML_CONTENT_TYPE};

/// Accepts the driver's self-signed certificate.
#[derive(Debug)]
struct AcceptDriverCertificate {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptDriverCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// TLS client config for talking to a local RD driver.
fn driver_tls_config() -> Result<rustls::ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| BridgeError::Config(format!("TLS protocol versions: {e}")))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptDriverCertificate { provider }))
        .with_no_client_auth();
    Ok(config)
}

/// Production exchange over HTTP/1.1.
#[derive(Clone)]
pub struct HttpExchange {
    client: reqwest::Client,
}

impl HttpExchange {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .use_preconfigured_tls(driver_tls_config()?)
            .pool_max_idle_per_host(0)
            .http1_only()
            .build()
            .map_err(|e| BridgeError::Config(format!("building HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DriverExchange for HttpExchange {
    async fn exchange(
        &self,
        url: &str,
        request: &DriverRequest,
        timeout: Duration,
    ) -> std::result::Result<HttpReply, RawFault> {
        let method = Method::from_bytes(request.method.as_str().as_bytes()).map_err(|e| RawFault {
            detail: format!("invalid method {}: {e}", request.method.as_str()),
            ..Default::default()
        })?;

        let mut builder = self
            .client
            .request(method, url)
            .header(CONTENT_TYPE, XML_CONTENT_TYPE)
            .header(ACCEPT, "*/*")
            .timeout(timeout);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| raw_fault(&e))?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| raw_fault(&e))?;
        debug!(url, status, bytes = body.len(), "driver exchange complete");

        Ok(HttpReply {
            status,
            body: body.to_vec(),
        })
    }
}

/// Collect the facts the classifier needs from a `reqwest` error.
fn raw_fault(err: &reqwest::Error) -> RawFault {
    RawFault {
        io_kind: io_kind_in_chain(err),
        timed_out: err.is_timeout(),
        connect: err.is_connect(),
        detail: error_chain_text(err),
    }
}

fn io_kind_in_chain(err: &(dyn StdError + 'static)) -> Option<io::ErrorKind> {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        current = e.source();
    }
    None
}

fn error_chain_text(err: &(dyn StdError + 'static)) -> String {
    let mut text = err.to_string();
    let mut current = err.source();
    while let Some(e) = current {
        text.push_str(": ");
        text.push_str(&e.to_string());
        current = e.source();
    }
    text
}

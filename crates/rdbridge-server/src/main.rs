// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// RD bridge — local HTTP/JSON bridge to a biometric RD service
//
// Entry point. Initialises logging, resolves configuration, builds the driver
// bridge, and serves the upward HTTP surface until Ctrl-C.

mod routes;
mod settings;
mod state;

use std::process::ExitCode;

use tokio::net::TcpListener;
use tracing::{error, info, warn};

use rdbridge_core::error::Result;
use rdbridge_driver::RdBridge;

use state::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "rdbridge stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let config = settings::load()?;
    let bridge = RdBridge::from_config(&config)?;
    for profile in bridge.registry().profiles() {
        info!(
            modality = %profile.modality,
            endpoint = %profile.secure_endpoint,
            timeout_ms = profile.timeout_ms,
            "device profile"
        );
    }

    let app = routes::router(AppState::new(bridge, &config.service_name));
    let listener = TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, service = %config.service_name, "rdbridge listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("rdbridge shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared handler state. Read-only after startup.

use std::sync::Arc;

use rdbridge_driver::{HttpExchange, RdBridge};

/// Cloned into every axum handler.
pub struct AppState<E = HttpExchange> {
    pub bridge: Arc<RdBridge<E>>,
    pub service_name: Arc<str>,
}

impl<E> AppState<E> {
    pub fn new(bridge: RdBridge<E>, service_name: &str) -> Self {
        Self {
            bridge: Arc::new(bridge),
            service_name: Arc::from(service_name),
        }
    }
}

// Derive would demand `E: Clone`.
impl<E> Clone for AppState<E> {
    fn clone(&self) -> Self {
        Self {
            bridge: Arc::clone(&self.bridge),
            service_name: Arc::clone(&self.service_name),
        }
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// RD bridge driver — talks to a locally installed RD service over its custom
// HTTP verbs, parses the XML it returns, and folds every outcome into the
// types defined in `rdbridge-core`.

pub mod bridge;
pub mod document;
pub mod health;
pub mod http;
pub mod normalize;
pub mod pid;
pub mod pid_options;
pub mod registry;
pub mod transport;

#[cfg(test)]
mod fixtures;

pub use bridge::{RdBridge, RdServiceStatus};
pub use document::Element;
pub use http::HttpExchange;
pub use registry::DeviceRegistry;
pub use transport::{DriverExchange, TransportClient};

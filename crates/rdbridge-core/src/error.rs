// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for the RD bridge.

use thiserror::Error;

use crate::codes::FaultClass;

/// Top-level error type for all bridge operations.
///
/// Only [`BridgeError::UnknownModality`] and the startup variants ever reach
/// callers of the capture API; the rest are folded into a
/// `CaptureResult::Failure` by the normalizer.
#[derive(Debug, Error)]
pub enum BridgeError {
    // -- Programmer / caller errors --
    #[error("unknown modality: {0}")]
    UnknownModality(String),

    // -- Driver response errors --
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("missing PID envelope: {0}")]
    MissingEnvelope(String),

    #[error("{}: {detail}", .class.describe())]
    Transport { class: FaultClass, detail: String },

    // -- Startup --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BridgeError>;

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge configuration. Built once at startup and handed to the driver crate;
// nothing reads device settings from a global.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::types::{CaptureDefaults, DeviceProfile, Modality, derive_insecure_endpoint};

/// Per-modality settings as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileConfig {
    pub secure_endpoint: String,
    /// Derived from `secure_endpoint` when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_endpoint: Option<String>,
    pub timeout_ms: u64,
    pub defaults: CaptureDefaults,
}

impl ProfileConfig {
    fn into_profile(self, modality: Modality) -> Result<DeviceProfile> {
        let insecure_endpoint = match self.insecure_endpoint {
            Some(endpoint) => endpoint,
            None => derive_insecure_endpoint(&self.secure_endpoint)?,
        };
        Ok(DeviceProfile {
            modality,
            secure_endpoint: self.secure_endpoint,
            insecure_endpoint,
            timeout_ms: self.timeout_ms,
            defaults: self.defaults,
        })
    }
}

/// Paths and HTTP methods the driver listens on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriverPaths {
    pub capture_path: String,
    pub info_path: String,
    pub rdservice_path: String,
}

impl Default for DriverPaths {
    fn default() -> Self {
        Self {
            capture_path: "/rd/capture".into(),
            info_path: "/rd/info".into(),
            rdservice_path: "/".into(),
        }
    }
}

/// Top-level bridge settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeConfig {
    /// Address the upward HTTP surface binds to.
    pub bind_address: String,
    /// Name reported by the health endpoint.
    pub service_name: String,
    pub driver: DriverPaths,
    pub profiles: BTreeMap<Modality, ProfileConfig>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(
            Modality::Fingerprint,
            ProfileConfig {
                secure_endpoint: "https://127.0.0.1:11100".into(),
                insecure_endpoint: None,
                timeout_ms: 10_000,
                defaults: CaptureDefaults {
                    finger_count: 1,
                    iris_count: 0,
                    photo_count: 0,
                    format_code: 0,
                },
            },
        );
        profiles.insert(
            Modality::Iris,
            ProfileConfig {
                secure_endpoint: "https://127.0.0.1:11101".into(),
                insecure_endpoint: None,
                timeout_ms: 15_000,
                defaults: CaptureDefaults {
                    finger_count: 0,
                    iris_count: 1,
                    photo_count: 0,
                    format_code: 0,
                },
            },
        );
        profiles.insert(
            Modality::Photograph,
            ProfileConfig {
                secure_endpoint: "https://127.0.0.1:11102".into(),
                insecure_endpoint: None,
                timeout_ms: 10_000,
                defaults: CaptureDefaults {
                    finger_count: 0,
                    iris_count: 0,
                    photo_count: 1,
                    format_code: 0,
                },
            },
        );

        Self {
            bind_address: "127.0.0.1:3001".into(),
            service_name: "arms-biometric-bridge".into(),
            driver: DriverPaths::default(),
            profiles,
        }
    }
}

impl BridgeConfig {
    /// Read a JSON config file. Fields left out fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Reject settings the bridge cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.bind_address.trim().is_empty() {
            return Err(BridgeError::Config("bind address is empty".into()));
        }
        for path in [
            &self.driver.capture_path,
            &self.driver.info_path,
            &self.driver.rdservice_path,
        ] {
            if !path.starts_with('/') {
                return Err(BridgeError::Config(format!(
                    "driver path must start with '/': '{path}'"
                )));
            }
        }
        for (modality, profile) in &self.profiles {
            if profile.timeout_ms == 0 {
                return Err(BridgeError::Config(format!(
                    "{modality}: timeout must be greater than zero"
                )));
            }
            // Also rejects empty and non-https secure endpoints.
            derive_insecure_endpoint(&profile.secure_endpoint)
                .map_err(|e| BridgeError::Config(format!("{modality}: {e}")))?;
            if let Some(insecure) = &profile.insecure_endpoint
                && insecure.trim().is_empty()
            {
                return Err(BridgeError::Config(format!(
                    "{modality}: insecure endpoint is empty"
                )));
            }
        }
        Ok(())
    }

    /// Resolve every configured modality into an immutable device profile.
    pub fn device_profiles(&self) -> Result<Vec<DeviceProfile>> {
        self.profiles
            .iter()
            .map(|(modality, profile)| profile.clone().into_profile(*modality))
            .collect()
    }
}

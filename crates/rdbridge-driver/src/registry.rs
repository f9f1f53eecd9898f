// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Device profile registry: read-only lookup from modality to its endpoints,
// timeout and capture defaults.

use std::collections::BTreeMap;

use rdbridge_core::config::BridgeConfig;
use rdbridge_core::error::{BridgeError, Result};
use rdbridge_core::types::{DeviceProfile, Modality};

/// Immutable set of device profiles, one per modality.
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    profiles: BTreeMap<Modality, DeviceProfile>,
}

impl DeviceRegistry {
    /// Build from explicit profiles. A later profile for the same modality
    /// replaces an earlier one.
    pub fn new(profiles: impl IntoIterator<Item = DeviceProfile>) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.modality, p)).collect(),
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        Ok(Self::new(config.device_profiles()?))
    }

    /// Look up the profile for a modality.
    pub fn resolve(&self, modality: Modality) -> Result<&DeviceProfile> {
        self.profiles
            .get(&modality)
            .ok_or_else(|| BridgeError::UnknownModality(modality.to_string()))
    }

    /// Look up a profile by its wire name (`"fingerprint"`, `"iris"`, ...).
    pub fn resolve_name(&self, name: &str) -> Result<&DeviceProfile> {
        self.resolve(name.parse()?)
    }

    pub fn profiles(&self) -> impl Iterator<Item = &DeviceProfile> {
        self.profiles.values()
    }
}

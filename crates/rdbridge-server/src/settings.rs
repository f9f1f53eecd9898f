// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Startup configuration resolution: optional JSON file, then environment
// overrides.

use std::path::PathBuf;

use reqwest::Url;
use tracing::info;

use rdbridge_core::BridgeConfig;
use rdbridge_core::error::{BridgeError, Result};

/// Path of the JSON config file.
pub const CONFIG_VAR: &str = "RDBRIDGE_CONFIG";
/// Overrides `bindAddress`.
pub const BIND_VAR: &str = "RDBRIDGE_BIND";
/// Replaces the host of every driver endpoint.
pub const DRIVER_HOST_VAR: &str = "RDBRIDGE_DRIVER_HOST";

/// Load configuration from the process environment.
pub fn load() -> Result<BridgeConfig> {
    load_with(|name| std::env::var(name).ok())
}

/// Load configuration using `var` to look up environment variables.
pub fn load_with(var: impl Fn(&str) -> Option<String>) -> Result<BridgeConfig> {
    let mut config = match var(CONFIG_VAR).filter(|p| !p.trim().is_empty()) {
        Some(path) => {
            let path = PathBuf::from(path);
            info!(path = %path.display(), "loading config file");
            BridgeConfig::from_file(&path).map_err(|e| {
                BridgeError::Config(format!("reading {}: {e}", path.display()))
            })?
        }
        None => BridgeConfig::default(),
    };

    if let Some(bind) = var(BIND_VAR).filter(|b| !b.trim().is_empty()) {
        config.bind_address = bind;
    }
    if let Some(host) = var(DRIVER_HOST_VAR).filter(|h| !h.trim().is_empty()) {
        override_driver_host(&mut config, host.trim())?;
    }

    config.validate()?;
    Ok(config)
}

/// Point every profile endpoint at `host`, keeping scheme, port and path.
pub fn override_driver_host(config: &mut BridgeConfig, host: &str) -> Result<()> {
    for profile in config.profiles.values_mut() {
        profile.secure_endpoint = with_host(&profile.secure_endpoint, host)?;
        if let Some(insecure) = &profile.insecure_endpoint {
            profile.insecure_endpoint = Some(with_host(insecure, host)?);
        }
    }
    Ok(())
}

fn with_host(endpoint: &str, host: &str) -> Result<String> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| BridgeError::Config(format!("invalid endpoint '{endpoint}': {e}")))?;
    url.set_host(Some(host))
        .map_err(|e| BridgeError::Config(format!("invalid driver host '{host}': {e}")))?;
    let mut rebuilt = url.to_string();
    // `Url` always renders a path; keep bare endpoints bare.
    if url.path() == "/" && !endpoint.ends_with('/') {
        rebuilt.pop();
    }
    Ok(rebuilt)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;
    use rdbridge_core::types::Modality;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn no_variables_gives_defaults() {
        let config = load_with(vars(&[])).unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn bind_override_applies() {
        let config = load_with(vars(&[(BIND_VAR, "0.0.0.0:8080")])).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn driver_host_override_rewrites_every_profile() {
        let config = load_with(vars(&[(DRIVER_HOST_VAR, "10.0.0.7")])).unwrap();
        let profiles = config.device_profiles().unwrap();
        let fingerprint = profiles
            .iter()
            .find(|p| p.modality == Modality::Fingerprint)
            .unwrap();
        assert_eq!(fingerprint.secure_endpoint, "https://10.0.0.7:11100");
        assert_eq!(fingerprint.insecure_endpoint, "http://10.0.0.7:11100");
        assert!(profiles.iter().all(|p| p.secure_endpoint.contains("10.0.0.7")));
    }

    #[test]
    fn config_file_is_read_then_overridden() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"bindAddress": "127.0.0.1:4000", "serviceName": "counter-3"}}"#
        )
        .unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let config = load_with(vars(&[(CONFIG_VAR, path.as_str())])).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:4000");
        assert_eq!(config.service_name, "counter-3");
        assert_eq!(config.profiles.len(), 3);

        let config =
            load_with(vars(&[(CONFIG_VAR, path.as_str()), (BIND_VAR, "127.0.0.1:5000")])).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:5000");
    }

    #[test]
    fn missing_config_file_is_a_startup_error() {
        let err = load_with(vars(&[(CONFIG_VAR, "/nonexistent/rdbridge.json")])).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn invalid_driver_host_is_rejected() {
        let err = load_with(vars(&[(DRIVER_HOST_VAR, "bad host")])).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }
}

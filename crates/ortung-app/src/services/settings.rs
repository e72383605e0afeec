// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `LocationConfig` persistence as `config.json` in the data directory.

use std::path::Path;

use ortung_core::config::LocationConfig;
use ortung_core::error::Result;
use tracing::{info, warn};

const CONFIG_FILE: &str = "config.json";

/// Read the saved config. `None` if there is no file or it does not parse.
pub fn load_config(data_dir: &Path) -> Option<LocationConfig> {
    let path = data_dir.join(CONFIG_FILE);
    let data = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&data) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!(path = %path.display(), "ignoring unreadable config: {e}");
            None
        }
    }
}

pub fn persist_config(data_dir: &Path, config: &LocationConfig) -> Result<()> {
    let path = data_dir.join(CONFIG_FILE);
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;
    Ok(())
}

/// Load the saved config, or write and return the defaults on first run.
pub fn load_or_init(data_dir: &Path) -> Result<LocationConfig> {
    if let Some(config) = load_config(data_dir) {
        return Ok(config);
    }
    let config = LocationConfig::default();
    persist_config(data_dir, &config)?;
    info!(dir = %data_dir.display(), "wrote default location config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ortung_core::types::{Access, Accuracy};

    #[test]
    fn first_run_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_or_init(dir.path()).unwrap();
        assert_eq!(config, LocationConfig::default());
        assert!(dir.path().join(CONFIG_FILE).exists());
    }

    #[test]
    fn saved_config_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let config = LocationConfig {
            provider: "gps".into(),
            update_interval_ms: 250,
            access: Access::Background,
            accuracy: Accuracy::Approximate,
            permission_request_code: 7,
        };
        persist_config(dir.path(), &config).unwrap();
        assert_eq!(load_or_init(dir.path()).unwrap(), config);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{ not json").unwrap();
        assert!(load_config(dir.path()).is_none());
        assert_eq!(load_or_init(dir.path()).unwrap(), LocationConfig::default());
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), r#"{"provider":"network"}"#).unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.provider, "network");
        assert_eq!(config.update_interval_ms, 1000);
    }
}

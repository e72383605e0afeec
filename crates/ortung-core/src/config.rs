// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Location request configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{Access, Accuracy};

/// Settings applied when a provider talks to the platform location service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Platform provider name (Android: "fused", "gps", "network").
    pub provider: String,
    /// Interval between streaming updates, in milliseconds.
    pub update_interval_ms: u64,
    /// Foreground-only or background access.
    pub access: Access,
    /// Coarse or fine location permission.
    pub accuracy: Accuracy,
    /// Request code passed to `Activity.requestPermissions`.
    pub permission_request_code: i32,
}

impl LocationConfig {
    /// Streaming update interval as a [`Duration`].
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            provider: "fused".into(),
            update_interval_ms: 1000,
            access: Access::Foreground,
            accuracy: Accuracy::Precise,
            permission_request_code: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fused_provider() {
        let config = LocationConfig::default();
        assert_eq!(config.provider, "fused");
        assert_eq!(config.update_interval(), Duration::from_secs(1));
        assert_eq!(config.accuracy, Accuracy::Precise);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: LocationConfig =
            serde_json::from_str(r#"{ "update_interval_ms": 250 }"#).unwrap();
        assert_eq!(config.update_interval_ms, 250);
        assert_eq!(config.provider, "fused");
        assert_eq!(config.permission_request_code, 3);
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub provider for desktop/CI builds where no platform location service
// exists.
//
// Every operation returns `PlatformUnavailable`. Use `simulate` to drive
// handlers without a device.

use ortung_core::config::LocationConfig;
use ortung_core::error::{OrtungError, Result};
use ortung_core::types::{Access, Accuracy};

use crate::handle::EncodedHandle;
use crate::traits::LocationProvider;

/// No-op provider returned on non-mobile platforms.
pub struct StubProvider {
    // Held so the weak count is released with the provider.
    _handle: EncodedHandle,
}

impl StubProvider {
    pub fn new(handle: EncodedHandle, _config: &LocationConfig) -> Self {
        Self { _handle: handle }
    }
}

impl LocationProvider for StubProvider {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }

    fn request_authorization(&self, _access: Access, _accuracy: Accuracy) -> Result<()> {
        tracing::warn!("LocationProvider::request_authorization called on stub provider");
        Err(OrtungError::PlatformUnavailable)
    }

    fn update_once(&self) -> Result<()> {
        tracing::warn!("LocationProvider::update_once called on stub provider");
        Err(OrtungError::PlatformUnavailable)
    }

    fn start_updates(&self) -> Result<()> {
        tracing::warn!("LocationProvider::start_updates called on stub provider");
        Err(OrtungError::PlatformUnavailable)
    }

    /// Nothing was started, so there is nothing to stop.
    fn stop_updates(&self) -> Result<()> {
        tracing::debug!("LocationProvider::stop_updates on stub provider: nothing to stop");
        Ok(())
    }
}

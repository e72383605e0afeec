// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Location manager: owns the handler and the platform provider.
//
// The manager holds the only strong reference to the handler. Dropping it
// is how the application cancels: the platform may keep calling its shim,
// but every later invocation finds the handler gone and is dropped.

use std::sync::Arc;

use ortung_core::config::LocationConfig;
use ortung_core::error::Result;
use ortung_core::types::SessionId;
use tracing::{info, warn};

use crate::handle::{EncodedHandle, register_shared};
use crate::traits::{Handler, LocationProvider};

/// A handler connected to a location provider.
pub struct Manager {
    id: SessionId,
    config: LocationConfig,
    provider: Box<dyn LocationProvider>,
    handler: Arc<dyn Handler>,
}

impl Manager {
    /// Connect `handler` to this platform's location service.
    pub fn new<T: Handler>(handler: T, config: &LocationConfig) -> Result<Self> {
        let provider_config = config.clone();
        Self::with_provider(handler, config, move |handle| {
            crate::platform_provider(handle, &provider_config)
        })
    }

    /// Connect `handler` through a caller-supplied provider factory.
    ///
    /// `connect` receives the encoded handle and must pass it to the shim
    /// it gives the platform.
    pub fn with_provider<T, F>(handler: T, config: &LocationConfig, connect: F) -> Result<Self>
    where
        T: Handler,
        F: FnOnce(EncodedHandle) -> Result<Box<dyn LocationProvider>>,
    {
        let handler: Arc<dyn Handler> = Arc::new(handler);
        let provider = connect(register_shared(&handler))?;
        let id = SessionId::new();
        info!(session = %id, platform = provider.platform_name(), "location session opened");
        Ok(Self {
            id,
            config: config.clone(),
            provider,
            handler,
        })
    }

    pub fn session_id(&self) -> SessionId {
        self.id
    }

    pub fn platform_name(&self) -> &str {
        self.provider.platform_name()
    }

    /// Request permission with the configured access and accuracy.
    pub fn request_authorization(&self) -> Result<()> {
        self.provider
            .request_authorization(self.config.access, self.config.accuracy)
    }

    pub fn update_once(&self) -> Result<()> {
        info!(session = %self.id, "requesting single fix");
        self.provider.update_once()
    }

    pub fn start_updates(&mut self) -> Result<()> {
        info!(session = %self.id, interval_ms = self.config.update_interval_ms, "starting updates");
        self.provider.start_updates()
    }

    pub fn stop_updates(&mut self) -> Result<()> {
        info!(session = %self.id, "stopping updates");
        self.provider.stop_updates()
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        if let Err(e) = self.provider.stop_updates() {
            warn!(session = %self.id, "stop_updates on drop failed: {e}");
        }
        info!(
            session = %self.id,
            outstanding_handles = Arc::weak_count(&self.handler),
            "location session closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::DispatchOutcome;
    use crate::simulate::SimulatedPlatform;
    use crate::test_support::{Recorder, fix};
    use ortung_core::error::OrtungError;
    use ortung_core::types::{Access, Accuracy, LocationEvent};
    use std::sync::Mutex;

    fn shared_recorder() -> (Arc<Mutex<Vec<LocationEvent>>>, Recorder) {
        let recorder = Recorder::default();
        (Arc::clone(&recorder.events), recorder)
    }

    fn simulated(
        platform: &Arc<SimulatedPlatform>,
    ) -> impl FnOnce(EncodedHandle) -> Result<Box<dyn LocationProvider>> {
        let platform = Arc::clone(platform);
        move |handle| Ok(Box::new(platform.connect(handle)) as Box<dyn LocationProvider>)
    }

    #[test]
    fn manager_streams_until_dropped() {
        let platform = SimulatedPlatform::new();
        let (events, recorder) = shared_recorder();
        let mut manager =
            Manager::with_provider(recorder, &LocationConfig::default(), simulated(&platform))
                .unwrap();

        manager.start_updates().unwrap();
        assert_eq!(platform.deliver_fix(fix(1.0)), vec![DispatchOutcome::Delivered]);

        drop(manager);
        // Nothing outstanding: the platform lets go of the released shim.
        assert_eq!(platform.receiver_count(), 0);
        assert!(platform.deliver_batch(vec![fix(2.0)]).is_empty());
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[test]
    fn late_single_fix_after_drop_is_stale() {
        let platform = SimulatedPlatform::new();
        let (events, recorder) = shared_recorder();
        let manager =
            Manager::with_provider(recorder, &LocationConfig::default(), simulated(&platform))
                .unwrap();

        manager.update_once().unwrap();
        drop(manager);

        assert_eq!(platform.deliver_fix(fix(1.0)), vec![DispatchOutcome::Stale]);
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn authorization_uses_configured_levels() {
        let platform = SimulatedPlatform::new();
        let config = LocationConfig {
            access: Access::Background,
            accuracy: Accuracy::Approximate,
            ..Default::default()
        };
        let manager =
            Manager::with_provider(Recorder::default(), &config, simulated(&platform)).unwrap();
        manager.request_authorization().unwrap();
        assert_eq!(
            platform.authorization(),
            Some((Access::Background, Accuracy::Approximate))
        );
        assert_eq!(manager.platform_name(), "Simulated");
    }

    #[test]
    fn failed_connect_propagates() {
        let result = Manager::with_provider(
            Recorder::default(),
            &LocationConfig::default(),
            |_handle| Err(OrtungError::PlatformUnavailable),
        );
        assert!(matches!(result, Err(OrtungError::PlatformUnavailable)));
    }

    #[test]
    fn sessions_get_distinct_ids() {
        let platform = SimulatedPlatform::new();
        let config = LocationConfig::default();
        let a = Manager::with_provider(Recorder::default(), &config, simulated(&platform)).unwrap();
        let b = Manager::with_provider(Recorder::default(), &config, simulated(&platform)).unwrap();
        assert_ne!(a.session_id(), b.session_id());
    }
}

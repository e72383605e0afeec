// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process stand-in for a platform location service.
//
// Behaves like the Android `LocationManager` as far as the bridge can tell:
// it keeps a receiver while anything is outstanding on it (a released
// receiver with a pending single fix is still called, and ignores the
// call), serves single-fix requests once, streams to subscribed receivers
// until `stop_updates`, and calls receivers from whatever thread pushes a
// fix. Used on desktop/CI, in tests and by the demo binary.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ortung_core::error::Result;
use ortung_core::types::{Access, Accuracy, Failure, Location};
use tracing::{debug, info};

use crate::dispatch::DispatchOutcome;
use crate::handle::EncodedHandle;
use crate::shim::Shim;
use crate::traits::LocationProvider;

/// Identifies one receiver retained by the simulated platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReceiverId(u64);

struct Receiver {
    id: ReceiverId,
    shim: Arc<Shim>,
    pending_once: bool,
    streaming: bool,
}

#[derive(Default)]
struct PlatformState {
    next_id: u64,
    receivers: Vec<Receiver>,
    authorization: Option<(Access, Accuracy)>,
}

/// Simulated platform location service.
#[derive(Default)]
pub struct SimulatedPlatform {
    state: Mutex<PlatformState>,
}

impl SimulatedPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Take ownership of a receiver. The platform keeps it until `forget`.
    pub fn attach(&self, shim: Shim) -> ReceiverId {
        let mut state = self.lock();
        let id = ReceiverId(state.next_id);
        state.next_id += 1;
        state.receivers.push(Receiver {
            id,
            shim: Arc::new(shim),
            pending_once: false,
            streaming: false,
        });
        id
    }

    /// Build a shim around `handle`, attach it, and return a provider
    /// driving it.
    pub fn connect(self: &Arc<Self>, handle: EncodedHandle) -> SimulatedProvider {
        let id = self.attach(Shim::new(handle));
        info!(receiver = id.0, "simulated platform: receiver attached");
        SimulatedProvider {
            platform: Arc::clone(self),
            id,
        }
    }

    /// Produce a fix: pending single requests get `accept`, streaming
    /// receivers get `on_location_changed`.
    pub fn deliver_fix(&self, location: Location) -> Vec<DispatchOutcome> {
        let targets = self.collect(|receiver| {
            let once = std::mem::take(&mut receiver.pending_once);
            (once || receiver.streaming).then_some(once)
        });
        debug!(receivers = targets.len(), "simulated platform: delivering fix");
        targets
            .into_iter()
            .map(|(shim, once)| {
                if once {
                    shim.accept(location.clone())
                } else {
                    shim.on_location_changed(location.clone())
                }
            })
            .collect()
    }

    /// Flush a batch of fixes to streaming receivers as one callback each.
    pub fn deliver_batch(&self, locations: Vec<Location>) -> Vec<DispatchOutcome> {
        let targets = self.collect(|receiver| receiver.streaming.then_some(()));
        debug!(
            receivers = targets.len(),
            batch = locations.len(),
            "simulated platform: delivering batch"
        );
        targets
            .into_iter()
            .map(|(shim, ())| shim.on_locations_changed(locations.clone()))
            .collect()
    }

    /// Report a failure to every receiver with an outstanding request.
    /// Single requests are completed by it.
    pub fn deliver_failure(&self, failure: Failure) -> Vec<DispatchOutcome> {
        let targets = self.collect(|receiver| {
            let once = std::mem::take(&mut receiver.pending_once);
            (once || receiver.streaming).then_some(())
        });
        debug!(receivers = targets.len(), %failure, "simulated platform: delivering failure");
        targets
            .into_iter()
            .map(|(shim, ())| shim.on_error(failure.clone()))
            .collect()
    }

    /// Let go of a receiver. Returns false if it was unknown.
    pub fn forget(&self, id: ReceiverId) -> bool {
        let mut state = self.lock();
        let before = state.receivers.len();
        state.receivers.retain(|receiver| receiver.id != id);
        state.receivers.len() != before
    }

    /// Release a receiver's shim and stop streaming to it. The receiver is
    /// dropped once no single-fix request is pending on it.
    pub fn release(&self, id: ReceiverId) {
        let mut state = self.lock();
        if let Some(receiver) = state.receivers.iter_mut().find(|r| r.id == id) {
            receiver.streaming = false;
            receiver.shim.release();
        }
        prune(&mut state.receivers);
    }

    pub fn receiver_count(&self) -> usize {
        self.lock().receivers.len()
    }

    pub fn is_streaming(&self, id: ReceiverId) -> bool {
        self.lock()
            .receivers
            .iter()
            .any(|receiver| receiver.id == id && receiver.streaming)
    }

    /// Most recent authorization request, if any.
    pub fn authorization(&self) -> Option<(Access, Accuracy)> {
        self.lock().authorization
    }

    fn update(&self, id: ReceiverId, f: impl FnOnce(&mut Receiver)) {
        if let Some(receiver) = self.lock().receivers.iter_mut().find(|r| r.id == id) {
            f(receiver);
        }
    }

    /// Snapshot the selected shims so they are invoked outside the lock; a
    /// handler may call back into the platform.
    fn collect<T>(
        &self,
        mut select: impl FnMut(&mut Receiver) -> Option<T>,
    ) -> Vec<(Arc<Shim>, T)> {
        let mut state = self.lock();
        let targets = state
            .receivers
            .iter_mut()
            .filter_map(|receiver| {
                select(receiver).map(|tag| (Arc::clone(&receiver.shim), tag))
            })
            .collect();
        prune(&mut state.receivers);
        targets
    }

    fn lock(&self) -> MutexGuard<'_, PlatformState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drop released receivers with nothing left to deliver.
fn prune(receivers: &mut Vec<Receiver>) {
    receivers.retain(|r| !r.shim.is_released() || r.pending_once || r.streaming);
}

/// Provider backed by a [`SimulatedPlatform`].
pub struct SimulatedProvider {
    platform: Arc<SimulatedPlatform>,
    id: ReceiverId,
}

impl SimulatedProvider {
    pub fn receiver_id(&self) -> ReceiverId {
        self.id
    }
}

impl LocationProvider for SimulatedProvider {
    fn platform_name(&self) -> &str {
        "Simulated"
    }

    fn request_authorization(&self, access: Access, accuracy: Accuracy) -> Result<()> {
        self.platform.lock().authorization = Some((access, accuracy));
        Ok(())
    }

    fn update_once(&self) -> Result<()> {
        self.platform.update(self.id, |receiver| receiver.pending_once = true);
        Ok(())
    }

    fn start_updates(&self) -> Result<()> {
        self.platform.update(self.id, |receiver| receiver.streaming = true);
        Ok(())
    }

    fn stop_updates(&self) -> Result<()> {
        self.platform.update(self.id, |receiver| receiver.streaming = false);
        Ok(())
    }
}

impl Drop for SimulatedProvider {
    fn drop(&mut self) {
        self.platform.release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::register;
    use crate::test_support::{Recorder, fix};

    #[test]
    fn single_request_is_served_once() {
        let platform = SimulatedPlatform::new();
        let recorder = Arc::new(Recorder::default());
        let provider = platform.connect(register(&recorder));

        provider.update_once().unwrap();
        assert_eq!(platform.deliver_fix(fix(1.0)), vec![DispatchOutcome::Delivered]);
        assert!(platform.deliver_fix(fix(2.0)).is_empty());
        assert_eq!(recorder.latitudes(), vec![vec![1.0]]);
    }

    #[test]
    fn streaming_stops_after_stop_updates() {
        let platform = SimulatedPlatform::new();
        let recorder = Arc::new(Recorder::default());
        let provider = platform.connect(register(&recorder));

        provider.start_updates().unwrap();
        assert!(platform.is_streaming(provider.receiver_id()));
        platform.deliver_fix(fix(1.0));
        platform.deliver_batch(vec![fix(2.0), fix(3.0)]);
        provider.stop_updates().unwrap();
        platform.deliver_fix(fix(4.0));

        assert_eq!(recorder.latitudes(), vec![vec![1.0], vec![2.0, 3.0]]);
    }

    #[test]
    fn retained_receiver_outlives_handler() {
        let platform = SimulatedPlatform::new();
        let recorder = Arc::new(Recorder::default());
        let provider = platform.connect(register(&recorder));
        provider.start_updates().unwrap();
        drop(recorder);

        assert_eq!(platform.receiver_count(), 1);
        assert_eq!(platform.deliver_fix(fix(1.0)), vec![DispatchOutcome::Stale]);
        assert!(platform.forget(provider.receiver_id()));
        assert_eq!(platform.receiver_count(), 0);
    }

    #[test]
    fn failure_completes_single_request() {
        let platform = SimulatedPlatform::new();
        let recorder = Arc::new(Recorder::default());
        let provider = platform.connect(register(&recorder));

        provider.update_once().unwrap();
        platform.deliver_failure(Failure::platform(3, "timeout"));
        assert!(platform.deliver_fix(fix(1.0)).is_empty());

        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].failure().unwrap().code, Some(3));
    }

    #[test]
    fn authorization_is_recorded() {
        let platform = SimulatedPlatform::new();
        let recorder = Arc::new(Recorder::default());
        let provider = platform.connect(register(&recorder));
        provider
            .request_authorization(Access::Background, Accuracy::Approximate)
            .unwrap();
        assert_eq!(
            platform.authorization(),
            Some((Access::Background, Accuracy::Approximate))
        );
    }

    #[test]
    fn handler_may_reenter_platform() {
        let platform = SimulatedPlatform::new();
        let inner = Arc::clone(&platform);
        let handler = Arc::new(move |_event: ortung_core::types::LocationEvent| {
            // Would deadlock if shims were invoked under the platform lock.
            let _ = inner.receiver_count();
        });
        let provider = platform.connect(register(&handler));
        provider.start_updates().unwrap();
        assert_eq!(platform.deliver_fix(fix(1.0)), vec![DispatchOutcome::Delivered]);
    }

    #[test]
    fn dropped_provider_is_pruned() {
        let platform = SimulatedPlatform::new();
        let recorder = Arc::new(Recorder::default());
        for _ in 0..3 {
            let provider = platform.connect(register(&recorder));
            provider.start_updates().unwrap();
        }
        assert_eq!(platform.receiver_count(), 0);
        assert_eq!(Arc::weak_count(&recorder), 0);
        assert!(platform.deliver_fix(fix(1.0)).is_empty());
    }

    #[test]
    fn pending_single_fix_outlives_provider() {
        let platform = SimulatedPlatform::new();
        let recorder = Arc::new(Recorder::default());
        let provider = platform.connect(register(&recorder));
        provider.update_once().unwrap();
        drop(provider);

        // The platform still answers the request; the released shim drops it.
        assert_eq!(platform.receiver_count(), 1);
        assert_eq!(platform.deliver_fix(fix(1.0)), vec![DispatchOutcome::Stale]);
        assert_eq!(platform.receiver_count(), 0);
        assert!(recorder.events().is_empty());
    }
}

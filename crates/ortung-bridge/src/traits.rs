// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions.
//
// `Handler` is what the application implements; `LocationProvider` is what
// each platform module implements.

use ortung_core::error::Result;
use ortung_core::types::{Access, Accuracy, LocationEvent};

/// Application-owned receiver of location events.
///
/// The platform may deliver on any thread and, for separate requests,
/// concurrently. Any locking the handler needs is its own business; the
/// bridge never serialises calls.
pub trait Handler: Send + Sync + 'static {
    /// Receive one normalized event. Called at most once per delivery.
    fn handle(&self, event: LocationEvent);
}

impl<F> Handler for F
where
    F: Fn(LocationEvent) + Send + Sync + 'static,
{
    fn handle(&self, event: LocationEvent) {
        self(event)
    }
}

/// Requests fixes from the platform location service.
///
/// Implementations hand a shim to the platform; results come back through
/// the dispatcher, never through these return values.
pub trait LocationProvider {
    /// Human-readable platform name (e.g. "Android", "iOS").
    fn platform_name(&self) -> &str;

    /// Ask the user for location permission. Returns once the request has
    /// been issued, not when it is answered.
    fn request_authorization(&self, access: Access, accuracy: Accuracy) -> Result<()>;

    /// Request a single fix.
    fn update_once(&self) -> Result<()>;

    /// Start streaming updates.
    fn start_updates(&self) -> Result<()>;

    /// Stop streaming updates. No invocation happens-after this returns.
    fn stop_updates(&self) -> Result<()>;
}

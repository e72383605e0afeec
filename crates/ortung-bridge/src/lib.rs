// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Ortung: bridge between platform location services and native handlers.
//!
//! The platform (Android `LocationManager`, Apple `CLLocationManager`) keeps a
//! receiver object alive for as long as it likes and calls it whenever it
//! likes. The receiver only carries a weak, two-word handle to the Rust
//! handler; every call upgrades that handle afresh and quietly does nothing
//! once the handler has been dropped.
//!
//! Layers, leaves first: [`handle`] (weak-handle codec), [`normalize`]
//! (callback shapes to one event), [`dispatch`] (upgrade and call), [`shim`]
//! (the receiver object), and the per-platform providers.

pub mod dispatch;
pub mod handle;
pub mod manager;
pub mod normalize;
pub mod shim;
pub mod simulate;
pub mod traits;

#[cfg(target_vendor = "apple")]
pub mod apple;

#[cfg(target_os = "android")]
pub mod android;

#[cfg(not(any(target_vendor = "apple", target_os = "android")))]
pub mod stub;

#[cfg(test)]
mod test_support;

pub use dispatch::{DispatchOutcome, dispatch};
pub use handle::{EncodedHandle, register};
pub use manager::Manager;
pub use normalize::Delivery;
pub use shim::Shim;
pub use traits::{Handler, LocationProvider};

use ortung_core::config::LocationConfig;
use ortung_core::error::Result;

/// Connect `handle` to the location service of the target operating system.
///
/// The returned provider owns the platform-side shim built around `handle`.
pub fn platform_provider(
    handle: EncodedHandle,
    config: &LocationConfig,
) -> Result<Box<dyn LocationProvider>> {
    #[cfg(target_vendor = "apple")]
    {
        // iOS, macOS: CLLocationManager with an objc2-declared delegate.
        Ok(Box::new(apple::AppleProvider::new(handle, config)?))
    }
    #[cfg(target_os = "android")]
    {
        // Android: LocationManager with the Java `LocationShim` over JNI.
        Ok(Box::new(android::AndroidProvider::new(handle, config)?))
    }
    #[cfg(not(any(target_vendor = "apple", target_os = "android")))]
    {
        // DESKTOP/CI: no platform location service.
        Ok(Box::new(stub::StubProvider::new(handle, config)))
    }
}

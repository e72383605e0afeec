// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CoreLocation provider via objc2, for every Apple target (iOS, macOS, ...).
//
// Requires compilation with an Apple SDK (Xcode). `CLLocationManager` does not
// ask for a `MainThreadMarker`, but it must be created on the main thread and
// it delivers delegate callbacks on the thread it was created on.
//
// ## Unsafe code
//
// 1. **ObjC message sends** (CoreLocation methods, `define_class!`
//    `#[unsafe(...)]`): required by the objc2 runtime. Selector correctness
//    follows Apple's SDK headers.
//
// 2. **Weak handle**: the delegate owns one `EncodedHandle`. It is released
//    when the delegate is deallocated, which `CLLocationManager` never causes
//    because it only holds its delegate weakly.

#![cfg(target_vendor = "apple")]

use chrono::DateTime;
use objc2::rc::Retained;
use objc2::runtime::{NSObject, NSObjectProtocol, ProtocolObject};
use objc2::{MainThreadMarker, define_class, msg_send};
use objc2_core_location::{
    CLLocation, CLLocationCoordinate2D, CLLocationManager, CLLocationManagerDelegate,
};
use objc2_foundation::{NSArray, NSError};
use tracing::{debug, info, warn};

use ortung_core::config::LocationConfig;
use ortung_core::error::{OrtungError, Result};
use ortung_core::types::{Access, Accuracy, Coordinates, Failure, FailureKind, Location};

use crate::dispatch::dispatch;
use crate::handle::EncodedHandle;
use crate::normalize::Delivery;
use crate::traits::LocationProvider;

/// Reported by [`AppleProvider::platform_name`].
#[cfg(target_os = "macos")]
const PLATFORM_NAME: &str = "macOS";
#[cfg(target_os = "ios")]
const PLATFORM_NAME: &str = "iOS";
#[cfg(not(any(target_os = "macos", target_os = "ios")))]
const PLATFORM_NAME: &str = "Apple";

/// `kCLErrorLocationUnknown`: no fix yet, the manager keeps trying.
const CL_ERROR_LOCATION_UNKNOWN: isize = 0;

// ---------------------------------------------------------------------------
// Delegate (CLLocationManagerDelegate)
// ---------------------------------------------------------------------------

struct LocationDelegateIvars {
    handle: EncodedHandle,
}

// SAFETY: define_class! #[unsafe(super(NSObject))] declares the delegate as an
// ObjC class inheriting from NSObject. MainThreadOnly matches the thread
// CLLocationManager delivers on when created from the main thread.
define_class! {
    #[unsafe(super(NSObject))]
    #[thread_kind = MainThreadOnly]
    #[name = "OrtungLocationDelegate"]
    #[ivars = LocationDelegateIvars]
    struct LocationDelegate;

    unsafe impl NSObjectProtocol for LocationDelegate {}

    unsafe impl CLLocationManagerDelegate for LocationDelegate {
        /// New fixes, oldest first. May carry several deferred updates.
        #[unsafe(method(locationManager:didUpdateLocations:))]
        fn did_update_locations(
            &self,
            _manager: &CLLocationManager,
            locations: &NSArray<CLLocation>,
        ) {
            let delivery = Delivery::Batch(locations.to_vec());
            dispatch(&self.ivars().handle, delivery, |fix| extract_location(&fix));
        }

        #[unsafe(method(locationManager:didFailWithError:))]
        fn did_fail_with_error(&self, _manager: &CLLocationManager, error: &NSError) {
            let failure = failure_from_error(error);
            debug!(code = ?failure.code, "CoreLocation: location manager reported an error");
            dispatch(
                &self.ivars().handle,
                Delivery::<Retained<CLLocation>>::Error(failure),
                |fix| extract_location(&fix),
            );
        }
    }
}

impl LocationDelegate {
    /// Create a delegate that owns `handle`.
    fn new(mtm: MainThreadMarker, handle: EncodedHandle) -> Retained<Self> {
        let this = mtm.alloc::<Self>();
        let this = this.set_ivars(LocationDelegateIvars { handle });
        // SAFETY: Standard NSObject init via super. The alloc above provides
        // a valid, allocated-but-uninitialised object; init completes it.
        unsafe { msg_send![super(this), init] }
    }
}

/// Read one `CLLocation`. Negative accuracies and courses mark invalid values.
fn extract_location(fix: &CLLocation) -> std::result::Result<Location, Failure> {
    // SAFETY: plain property getters on a live CLLocation.
    let (coordinate, altitude, vertical, course, speed, horizontal, seconds) = unsafe {
        (
            fix.coordinate(),
            fix.altitude(),
            fix.verticalAccuracy(),
            fix.course(),
            fix.speed(),
            fix.horizontalAccuracy(),
            fix.timestamp().timeIntervalSince1970(),
        )
    };

    if horizontal < 0.0 {
        return Err(Failure::new(
            FailureKind::Extraction,
            "CLLocation has no valid coordinate",
        ));
    }
    let CLLocationCoordinate2D {
        latitude,
        longitude,
    } = coordinate;

    let millis = (seconds * 1000.0).round() as i64;
    let timestamp = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        Failure::new(
            FailureKind::Extraction,
            format!("fix time {seconds} s out of range"),
        )
    })?;

    let mut location = Location::new(Coordinates::new(latitude, longitude), timestamp)
        .with_horizontal_accuracy(horizontal);
    if vertical >= 0.0 {
        location = location.with_altitude(altitude);
    }
    if course >= 0.0 {
        location = location.with_bearing(course);
    }
    if speed >= 0.0 {
        location = location.with_speed(speed);
    }
    Ok(location)
}

fn failure_from_error(error: &NSError) -> Failure {
    let code = error.code();
    let message = error.localizedDescription().to_string();
    if code == CL_ERROR_LOCATION_UNKNOWN {
        Failure::new(FailureKind::NoFix, message).with_code(code as i64)
    } else {
        Failure::platform(code as i64, message)
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Apple implementation of [`LocationProvider`].
pub struct AppleProvider {
    manager: Retained<CLLocationManager>,
    // CLLocationManager holds its delegate weakly; keep it alive here.
    _delegate: Retained<LocationDelegate>,
}

impl AppleProvider {
    /// Create the manager and delegate. Fails off the main thread.
    pub fn new(handle: EncodedHandle, _config: &LocationConfig) -> Result<Self> {
        let mtm = MainThreadMarker::new().ok_or(OrtungError::NotMainThread)?;

        // SAFETY: plain alloc/init; we are on the main thread (checked above).
        let manager = unsafe { CLLocationManager::new() };
        let delegate = LocationDelegate::new(mtm, handle);

        // SAFETY: the delegate outlives the manager's use of it: both live in
        // `Self` and the delegate is detached in `Drop`.
        unsafe { manager.setDelegate(Some(ProtocolObject::from_ref(&*delegate))) };

        info!("CoreLocation: CLLocationManager created");
        Ok(Self {
            manager,
            _delegate: delegate,
        })
    }
}

impl LocationProvider for AppleProvider {
    fn platform_name(&self) -> &str {
        PLATFORM_NAME
    }

    /// `requestWhenInUseAuthorization` or `requestAlwaysAuthorization`. The
    /// accuracy level is chosen by the user in the system prompt; we only
    /// set the desired accuracy.
    fn request_authorization(&self, access: Access, accuracy: Accuracy) -> Result<()> {
        let desired = match accuracy {
            // SAFETY: CoreLocation constant.
            Accuracy::Precise => unsafe { objc2_core_location::kCLLocationAccuracyBest },
            Accuracy::Approximate => unsafe { objc2_core_location::kCLLocationAccuracyKilometer },
        };
        // SAFETY: CLLocationManager selectors; main-thread manager.
        unsafe {
            self.manager.setDesiredAccuracy(desired);
            match access {
                Access::Foreground => self.manager.requestWhenInUseAuthorization(),
                Access::Background => self.manager.requestAlwaysAuthorization(),
            }
        }
        info!(?access, ?accuracy, "CoreLocation: authorization requested");
        Ok(())
    }

    fn update_once(&self) -> Result<()> {
        // SAFETY: CLLocationManager selector; the result arrives through the
        // delegate as a one-element `didUpdateLocations`.
        unsafe { self.manager.requestLocation() };
        Ok(())
    }

    fn start_updates(&self) -> Result<()> {
        // SAFETY: CLLocationManager selector.
        unsafe { self.manager.startUpdatingLocation() };
        Ok(())
    }

    fn stop_updates(&self) -> Result<()> {
        // SAFETY: CLLocationManager selector.
        unsafe { self.manager.stopUpdatingLocation() };
        Ok(())
    }
}

impl Drop for AppleProvider {
    fn drop(&mut self) {
        if let Err(e) = self.stop_updates() {
            warn!("CoreLocation: stopUpdatingLocation on drop failed: {e}");
        }
        // SAFETY: detaching the delegate is always allowed.
        unsafe { self.manager.setDelegate(None) };
    }
}

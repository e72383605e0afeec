// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rust-side dispatch shim.
//
// The receiver object handed to a platform that lives in-process (the
// simulated platform, tests, embedders with their own event loop). It has
// the same shape as the Java `LocationShim` and the CoreLocation delegate: it holds
// one encoded handle and turns every callback entry point into exactly one
// dispatcher call, with no filtering, retry or buffering.
//
// Release never waits. `state` counts forwards in flight, with `RELEASED`
// as the top bit. `release` sets the bit; whoever brings the count to zero
// with the bit set (the releaser itself, or the last forward to finish)
// gives the weak count back. The Java shim uses the same protocol.

use std::mem::ManuallyDrop;
use std::sync::atomic::{AtomicUsize, Ordering};

use ortung_core::types::{Failure, Location};

use crate::dispatch::{DispatchOutcome, dispatch_extracted};
use crate::handle::EncodedHandle;
use crate::normalize::Delivery;

const RELEASED: usize = 1 << (usize::BITS - 1);

/// Callback receiver carrying an encoded handler reference.
#[derive(Debug)]
pub struct Shim {
    high: u64,
    low: u64,
    state: AtomicUsize,
}

impl Shim {
    pub fn new(handle: EncodedHandle) -> Self {
        let (high, low) = handle.into_words();
        Self {
            high,
            low,
            state: AtomicUsize::new(0),
        }
    }

    /// Single-result callback.
    pub fn accept(&self, location: Location) -> DispatchOutcome {
        self.deliver(Delivery::Single(location))
    }

    /// Streaming listener, one location.
    pub fn on_location_changed(&self, location: Location) -> DispatchOutcome {
        self.deliver(Delivery::Update(location))
    }

    /// Streaming listener, batched. The whole list is one event.
    pub fn on_locations_changed(&self, locations: Vec<Location>) -> DispatchOutcome {
        self.deliver(Delivery::Batch(locations))
    }

    /// Success half of a split callback.
    pub fn on_success(&self, location: Location) -> DispatchOutcome {
        self.deliver(Delivery::Success(location))
    }

    /// Error half of a split callback.
    pub fn on_error(&self, failure: Failure) -> DispatchOutcome {
        self.deliver(Delivery::Error(failure))
    }

    /// Forward one delivery. After [`Shim::release`] this is `Stale`.
    pub fn deliver(&self, delivery: Delivery<Location>) -> DispatchOutcome {
        match self.enter() {
            Some(forward) => dispatch_extracted(&forward.handle(), delivery),
            None => DispatchOutcome::Stale,
        }
    }

    /// Whether the handler behind this shim is still alive.
    pub fn is_live(&self) -> bool {
        self.enter().is_some_and(|forward| forward.handle().is_live())
    }

    pub fn is_released(&self) -> bool {
        self.state.load(Ordering::Acquire) & RELEASED != 0
    }

    /// Stop forwarding and give the weak count back.
    ///
    /// Returns at once. If forwards are in flight (including the one
    /// calling this from inside a handler) the last of them frees the
    /// handle. Later calls do nothing.
    pub fn release(&self) {
        let previous = self.state.fetch_or(RELEASED, Ordering::AcqRel);
        if previous == 0 {
            self.free();
        }
    }

    fn enter(&self) -> Option<Forward<'_>> {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current & RELEASED != 0 {
                return None;
            }
            match self.state.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(Forward { shim: self }),
                Err(actual) => current = actual,
            }
        }
    }

    fn free(&self) {
        // SAFETY: the words came from `into_words` in `new`, and the state
        // machine reaches "released with nothing in flight" exactly once.
        drop(unsafe { EncodedHandle::from_words(self.high, self.low) });
    }
}

impl Drop for Shim {
    fn drop(&mut self) {
        self.release();
    }
}

/// One forward in flight; leaving it may complete a pending release.
struct Forward<'a> {
    shim: &'a Shim,
}

impl Forward<'_> {
    fn handle(&self) -> ManuallyDrop<EncodedHandle> {
        // SAFETY: a forward in flight keeps the handle from being freed.
        ManuallyDrop::new(unsafe { EncodedHandle::from_words(self.shim.high, self.shim.low) })
    }
}

impl Drop for Forward<'_> {
    fn drop(&mut self) {
        if self.shim.state.fetch_sub(1, Ordering::AcqRel) == RELEASED + 1 {
            self.shim.free();
        }
    }
}

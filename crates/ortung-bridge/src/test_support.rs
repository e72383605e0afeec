// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared helpers for unit tests.

use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use ortung_core::types::{Coordinates, Location, LocationEvent};

use crate::traits::Handler;

/// A fix at `latitude` with a fixed timestamp, so equal inputs compare equal.
pub(crate) fn fix(latitude: f64) -> Location {
    let timestamp = Utc
        .timestamp_opt(1_700_000_000, 0)
        .single()
        .expect("valid timestamp");
    Location::new(Coordinates::new(latitude, 13.405), timestamp)
}

/// Handler that records every event it receives.
#[derive(Default)]
pub(crate) struct Recorder {
    pub(crate) events: Arc<Mutex<Vec<LocationEvent>>>,
}

impl Recorder {
    pub(crate) fn events(&self) -> Vec<LocationEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Latitudes of each delivered batch; failures are skipped.
    pub(crate) fn latitudes(&self) -> Vec<Vec<f64>> {
        self.events()
            .iter()
            .filter_map(LocationEvent::locations)
            .map(|batch| batch.iter().map(|l| l.coordinates.latitude).collect())
            .collect()
    }
}

impl Handler for Recorder {
    fn handle(&self, event: LocationEvent) {
        self.events.lock().unwrap().push(event);
    }
}

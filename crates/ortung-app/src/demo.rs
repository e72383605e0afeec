// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scripted session against the simulated platform.
//
// Two handlers share one platform. The first receives a fix and is dropped
// while a request is still outstanding; the platform's late answer must go
// nowhere. The second receives a deferred batch and then an error.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use ortung_bridge::simulate::SimulatedPlatform;
use ortung_bridge::{DispatchOutcome, EncodedHandle, Handler, LocationProvider, Manager};
use ortung_core::config::LocationConfig;
use ortung_core::error::Result;
use ortung_core::types::{Coordinates, Failure, Location, LocationEvent};
use tracing::info;

/// Events received by handler, in arrival order.
pub type EventLog = Arc<Mutex<Vec<(&'static str, LocationEvent)>>>;

/// Handler that records what it is given under a fixed name.
struct NamedHandler {
    name: &'static str,
    log: EventLog,
}

impl Handler for NamedHandler {
    fn handle(&self, event: LocationEvent) {
        match &event {
            LocationEvent::Locations(batch) => {
                let latest = batch.latest();
                info!(
                    handler = self.name,
                    fixes = batch.len(),
                    lat = latest.coordinates.latitude,
                    lon = latest.coordinates.longitude,
                    "locations received"
                );
            }
            LocationEvent::Failure(failure) => {
                info!(handler = self.name, %failure, "failure received");
            }
        }
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((self.name, event));
    }
}

/// One platform action and what each receiver made of it.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub action: &'static str,
    pub outcomes: Vec<DispatchOutcome>,
}

#[derive(Debug, Default)]
pub struct Report {
    pub steps: Vec<Step>,
    pub events: Vec<(&'static str, LocationEvent)>,
}

/// A fix `n` seconds after `start`, walking north from Alexanderplatz.
fn fix(start: DateTime<Utc>, n: i64) -> Location {
    let coordinates = Coordinates::new(52.5219 + n as f64 * 0.0001, 13.4132);
    Location::new(coordinates, start + Duration::seconds(n))
        .with_horizontal_accuracy(5.0)
        .with_speed(1.4)
}

fn simulated(
    platform: &Arc<SimulatedPlatform>,
) -> impl FnOnce(EncodedHandle) -> Result<Box<dyn LocationProvider>> {
    let platform = Arc::clone(platform);
    move |handle| Ok(Box::new(platform.connect(handle)) as Box<dyn LocationProvider>)
}

/// Play the scripted session and return what happened.
pub fn run(config: &LocationConfig) -> Result<Report> {
    let platform = SimulatedPlatform::new();
    let log: EventLog = Arc::default();
    let start = Utc::now();
    let mut steps = Vec::new();

    // First handler: one fix, then dropped with a request outstanding.
    let mut first = Manager::with_provider(
        NamedHandler {
            name: "first",
            log: Arc::clone(&log),
        },
        config,
        simulated(&platform),
    )?;
    first.request_authorization()?;
    first.start_updates()?;
    steps.push(Step {
        action: "fix L1",
        outcomes: platform.deliver_fix(fix(start, 1)),
    });
    first.update_once()?;
    drop(first);
    steps.push(Step {
        action: "fix L2 after drop",
        outcomes: platform.deliver_fix(fix(start, 2)),
    });

    // Second handler: a deferred batch, then an error.
    let mut second = Manager::with_provider(
        NamedHandler {
            name: "second",
            log: Arc::clone(&log),
        },
        config,
        simulated(&platform),
    )?;
    second.start_updates()?;
    steps.push(Step {
        action: "batch [L3, L4]",
        outcomes: platform.deliver_batch(vec![fix(start, 3), fix(start, 4)]),
    });
    steps.push(Step {
        action: "error E1",
        outcomes: platform
            .deliver_failure(Failure::platform(1, "E1: location service unavailable")),
    });
    second.stop_updates()?;
    drop(second);

    let events = std::mem::take(&mut *log.lock().unwrap_or_else(PoisonError::into_inner));
    Ok(Report { steps, events })
}

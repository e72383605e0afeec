// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Event normalization.
//
// Platforms call back through several unrelated interface shapes. Each shim
// entry point wraps its raw arguments in a `Delivery` and this module turns
// that into the one `LocationEvent` a handler understands.

use ortung_core::types::{Failure, Location, LocationBatch, LocationEvent};

/// One raw shim invocation, tagged by callback shape.
///
/// `R` is the platform's own location object (`android.location.Location`,
/// `CLLocation`, or an already-extracted [`Location`]).
#[derive(Debug)]
pub enum Delivery<R> {
    /// Single-result callback (`Consumer<Location>.accept`).
    Single(R),
    /// Streaming listener, one location per call.
    Update(R),
    /// Streaming listener, an ordered list per call.
    Batch(Vec<R>),
    /// Success half of a split success/error callback.
    Success(R),
    /// Error half of a split success/error callback.
    Error(Failure),
}

impl<R> Delivery<R> {
    /// Shape name, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Single(_) => "single",
            Self::Update(_) => "update",
            Self::Batch(_) => "batch",
            Self::Success(_) => "success",
            Self::Error(_) => "error",
        }
    }
}

/// Map a delivery onto exactly one event, or none.
///
/// `extract` copies a platform location into a [`Location`]. An extraction
/// failure replaces the whole event with that failure; a batch is delivered
/// completely or not at all. An empty batch yields `None`: zero results carry
/// nothing a handler could act on.
pub fn normalize<R, F>(delivery: Delivery<R>, mut extract: F) -> Option<LocationEvent>
where
    F: FnMut(R) -> Result<Location, Failure>,
{
    let event = match delivery {
        Delivery::Single(raw) | Delivery::Update(raw) | Delivery::Success(raw) => {
            match extract(raw) {
                Ok(location) => LocationEvent::Locations(LocationBatch::one(location)),
                Err(failure) => LocationEvent::Failure(failure),
            }
        }
        Delivery::Batch(raws) => {
            if raws.is_empty() {
                return None;
            }
            match raws.into_iter().map(&mut extract).collect::<Result<Vec<_>, _>>() {
                Ok(locations) => LocationEvent::Locations(LocationBatch::new(locations)?),
                Err(failure) => LocationEvent::Failure(failure),
            }
        }
        Delivery::Error(failure) => LocationEvent::Failure(failure),
    };
    Some(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fix;
    use ortung_core::types::FailureKind;

    fn identity(location: Location) -> Result<Location, Failure> {
        Ok(location)
    }

    #[test]
    fn single_shapes_become_one_element_batches() {
        for delivery in [
            Delivery::Single(fix(1.0)),
            Delivery::Update(fix(1.0)),
            Delivery::Success(fix(1.0)),
        ] {
            let event = normalize(delivery, identity).unwrap();
            let batch = event.locations().unwrap();
            assert_eq!(batch.len(), 1);
            assert_eq!(batch.first(), &fix(1.0));
        }
    }

    #[test]
    fn batch_preserves_platform_order() {
        let delivery = Delivery::Batch(vec![fix(3.0), fix(1.0), fix(2.0)]);
        let event = normalize(delivery, identity).unwrap();
        let lats: Vec<f64> = event
            .locations()
            .unwrap()
            .iter()
            .map(|l| l.coordinates.latitude)
            .collect();
        assert_eq!(lats, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn empty_batch_is_dropped() {
        let delivery: Delivery<Location> = Delivery::Batch(Vec::new());
        assert!(normalize(delivery, identity).is_none());
    }

    #[test]
    fn error_becomes_failure_only() {
        let delivery: Delivery<Location> = Delivery::Error(Failure::platform(42, "E1"));
        let event = normalize(delivery, identity).unwrap();
        assert!(event.locations().is_none());
        assert_eq!(event.failure().unwrap().code, Some(42));
    }

    #[test]
    fn extraction_failure_replaces_the_whole_batch() {
        let delivery = Delivery::Batch(vec![1.0, f64::NAN, 3.0]);
        let mut calls = 0;
        let event = normalize(delivery, |lat: f64| {
            calls += 1;
            if lat.is_nan() {
                Err(Failure::new(FailureKind::Extraction, "latitude unreadable"))
            } else {
                Ok(fix(lat))
            }
        })
        .unwrap();
        assert_eq!(event.failure().unwrap().kind, FailureKind::Extraction);
        // Extraction stops at the first bad element.
        assert_eq!(calls, 2);
    }

    #[test]
    fn kind_names_each_shape() {
        let shapes: [Delivery<Location>; 5] = [
            Delivery::Single(fix(0.0)),
            Delivery::Update(fix(0.0)),
            Delivery::Batch(Vec::new()),
            Delivery::Success(fix(0.0)),
            Delivery::Error(Failure::platform(0, "")),
        ];
        let kinds: Vec<&str> = shapes.iter().map(Delivery::kind).collect();
        assert_eq!(kinds, vec!["single", "update", "batch", "success", "error"]);
    }
}

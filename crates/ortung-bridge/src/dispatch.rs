// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Native dispatcher: the single entry point every shim calls.
//
// Per invocation: decode the handle, drop the event if the handler is gone,
// otherwise normalize and call the handler once on the current thread.
// Nothing is remembered between invocations. Panics never cross this
// boundary; platform callback interfaces cannot take them.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use ortung_core::types::{Failure, FailureKind, Location, LocationEvent};
use tracing::{debug, trace, warn};

use crate::handle::EncodedHandle;
use crate::normalize::{Delivery, normalize};

/// What happened to one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler received exactly one event.
    Delivered,
    /// The handler was already released; the event was dropped.
    Stale,
    /// The delivery normalized to nothing (empty batch).
    Empty,
    /// The handler panicked while processing the event; contained here.
    HandlerFault,
}

/// Route one shim invocation to its handler.
pub fn dispatch<R, F>(handle: &EncodedHandle, delivery: Delivery<R>, extract: F) -> DispatchOutcome
where
    F: FnMut(R) -> Result<Location, Failure>,
{
    let kind = delivery.kind();

    let Some(handler) = handle.decode() else {
        trace!(kind, "handler released, dropping delivery");
        return DispatchOutcome::Stale;
    };

    let event = match catch_unwind(AssertUnwindSafe(|| normalize(delivery, extract))) {
        Ok(Some(event)) => event,
        Ok(None) => {
            trace!(kind, "empty delivery dropped");
            return DispatchOutcome::Empty;
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(kind, %message, "producing location event panicked");
            LocationEvent::Failure(Failure::new(FailureKind::Internal, message))
        }
    };

    match catch_unwind(AssertUnwindSafe(|| handler.handle(event))) {
        Ok(()) => {
            debug!(kind, "location event delivered");
            DispatchOutcome::Delivered
        }
        Err(payload) => {
            warn!(
                kind,
                message = %panic_message(payload.as_ref()),
                "handler panicked; fault contained at dispatch boundary"
            );
            DispatchOutcome::HandlerFault
        }
    }
}

/// Dispatch a delivery whose locations are already extracted.
pub fn dispatch_extracted(handle: &EncodedHandle, delivery: Delivery<Location>) -> DispatchOutcome {
    dispatch(handle, delivery, Ok)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::register;
    use crate::test_support::{Recorder, fix};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn live_handler_receives_event() {
        let recorder = Arc::new(Recorder::default());
        let handle = register(&recorder);

        let outcome = dispatch_extracted(&handle, Delivery::Single(fix(1.0)));

        assert_eq!(outcome, DispatchOutcome::Delivered);
        assert_eq!(recorder.latitudes(), vec![vec![1.0]]);
    }

    #[test]
    fn released_handler_drops_event() {
        let recorder = Arc::new(Recorder::default());
        let handle = register(&recorder);
        let observer = Arc::clone(&recorder.events);
        drop(recorder);

        let outcome = dispatch_extracted(&handle, Delivery::Update(fix(2.0)));

        assert_eq!(outcome, DispatchOutcome::Stale);
        assert!(observer.lock().unwrap().is_empty());
    }

    #[test]
    fn stale_dispatch_skips_extraction() {
        let recorder = Arc::new(Recorder::default());
        let handle = register(&recorder);
        drop(recorder);

        let mut extracted = false;
        let outcome = dispatch(&handle, Delivery::Single(1.0), |lat: f64| {
            extracted = true;
            Ok(fix(lat))
        });
        assert_eq!(outcome, DispatchOutcome::Stale);
        assert!(!extracted);
    }

    #[test]
    fn empty_batch_reaches_nobody() {
        let recorder = Arc::new(Recorder::default());
        let handle = register(&recorder);

        let outcome = dispatch_extracted(&handle, Delivery::Batch(Vec::new()));

        assert_eq!(outcome, DispatchOutcome::Empty);
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn handler_panic_is_contained() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handler = Arc::new(move |_event: LocationEvent| {
            if counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                panic!("handler bug");
            }
        });
        let handle = register(&handler);

        let first = dispatch_extracted(&handle, Delivery::Single(fix(1.0)));
        let second = dispatch_extracted(&handle, Delivery::Single(fix(2.0)));

        assert_eq!(first, DispatchOutcome::HandlerFault);
        assert_eq!(second, DispatchOutcome::Delivered);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn extraction_panic_becomes_one_failure() {
        let recorder = Arc::new(Recorder::default());
        let handle = register(&recorder);

        let explode = |_lat: f64| -> Result<Location, Failure> { panic!("reader exploded") };
        let outcome = dispatch(&handle, Delivery::Batch(vec![1.0, 2.0]), explode);

        assert_eq!(outcome, DispatchOutcome::Delivered);
        let events = recorder.events();
        assert_eq!(events.len(), 1);
        let failure = events[0].failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Internal);
        assert_eq!(failure.message, "reader exploded");
    }

    #[test]
    fn concurrent_shims_do_not_cross_talk() {
        let handlers: Vec<Arc<Recorder>> = (0..8).map(|_| Arc::new(Recorder::default())).collect();

        thread::scope(|scope| {
            for (i, recorder) in handlers.iter().enumerate() {
                let handle = register(recorder);
                scope.spawn(move || {
                    for n in 0..50 {
                        let lat = i as f64 * 1000.0 + n as f64;
                        dispatch_extracted(&handle, Delivery::Update(fix(lat)));
                    }
                });
            }
        });

        for (i, recorder) in handlers.iter().enumerate() {
            let expected: Vec<Vec<f64>> =
                (0..50).map(|n| vec![i as f64 * 1000.0 + n as f64]).collect();
            assert_eq!(recorder.latitudes(), expected);
        }
    }

    #[test]
    fn concurrent_dispatch_races_with_release() {
        let recorder = Arc::new(Recorder::default());
        let observer = Arc::clone(&recorder.events);
        let handle = register(&recorder);

        thread::scope(|scope| {
            scope.spawn(|| {
                for n in 0..200 {
                    let outcome = dispatch_extracted(&handle, Delivery::Update(fix(n as f64)));
                    assert!(matches!(outcome, DispatchOutcome::Delivered | DispatchOutcome::Stale));
                }
            });
            drop(recorder);
        });

        assert_eq!(dispatch_extracted(&handle, Delivery::Update(fix(0.0))), DispatchOutcome::Stale);
        assert!(observer.lock().unwrap().len() <= 200);
    }
}

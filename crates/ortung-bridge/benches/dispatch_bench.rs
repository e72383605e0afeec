// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the per-callback path: handle decode, event
// normalization and handler invocation.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{TimeZone, Utc};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

use ortung_bridge::dispatch::dispatch_extracted;
use ortung_bridge::normalize::normalize;
use ortung_bridge::{Delivery, EncodedHandle, Handler, register};
use ortung_core::types::{Coordinates, Location, LocationEvent};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Counter(AtomicUsize);

impl Handler for Counter {
    fn handle(&self, event: LocationEvent) {
        black_box(&event);
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

fn fix(i: usize) -> Location {
    let ts = Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap();
    Location::new(Coordinates::new(52.52 + i as f64 * 1e-5, 13.405), ts)
        .with_horizontal_accuracy(4.0)
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// One location delivered to a live handler: upgrade, normalize, call.
fn bench_dispatch_live(c: &mut Criterion) {
    let counter = Arc::new(Counter::default());
    let handle = register(&counter);
    let location = fix(0);

    c.bench_function("dispatch (live, single)", |b| {
        b.iter(|| {
            let delivery = Delivery::Update(black_box(location.clone()));
            let outcome = dispatch_extracted(&handle, delivery);
            black_box(outcome);
        });
    });
}

/// The handler is gone: the cost a late platform callback pays.
fn bench_dispatch_stale(c: &mut Criterion) {
    let counter = Arc::new(Counter::default());
    let handle: EncodedHandle = register(&counter);
    drop(counter);
    let location = fix(0);

    c.bench_function("dispatch (stale)", |b| {
        b.iter(|| {
            let delivery = Delivery::Update(black_box(location.clone()));
            let outcome = dispatch_extracted(&handle, delivery);
            black_box(outcome);
        });
    });
}

/// Normalizing deferred batches of increasing size.
fn bench_normalize_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize_batch");
    for size in [1usize, 16, 256] {
        let batch: Vec<Location> = (0..size).map(fix).collect();
        group.bench_function(format!("{size} fixes"), |b| {
            b.iter(|| {
                let event = normalize(Delivery::Batch(black_box(batch.clone())), Ok);
                black_box(event);
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_dispatch_live,
    bench_dispatch_stale,
    bench_normalize_batch,
);
criterion_main!(benches);

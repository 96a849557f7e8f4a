use std::sync::Arc;
use std::time::Instant;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use loadnet::base::endpoint::Endpoint;
use loadnet::metrics::NullAccumulator;
use loadnet::socket::stream::SessionId;
use loadnet::socket::timing::TimingTracker;

/// Benchmark the timing tracker's hot path and endpoint parsing.
/// These are pure in-memory operations that don't require network I/O.
fn benchmark_timing_tracker(c: &mut Criterion) {
    let tracker = TimingTracker::new(Arc::new(NullAccumulator));

    // Full connect cycle: record insert, first-byte completion.
    c.bench_function("timing_connect_cycle", |b| {
        b.iter(|| {
            let id = SessionId::next();
            let t0 = Instant::now();
            tracker.connected_at(id, t0);
            black_box(tracker.data_ready_at(id, t0));
        })
    });

    // Stray data-ready events on unknown sessions (keep-alive hot path).
    let stray = SessionId::next();
    c.bench_function("timing_stray_data_ready", |b| {
        b.iter(|| black_box(tracker.data_ready_at(stray, Instant::now())))
    });

    c.bench_function("endpoint_parse", |b| {
        b.iter(|| black_box(Endpoint::parse("https://target.test:8443").unwrap()))
    });
}

criterion_group!(benches, benchmark_timing_tracker);
criterion_main!(benches);

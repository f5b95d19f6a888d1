use std::time::Instant;

use criterion::{criterion_group, criterion_main, Criterion};
use xer::instrumentation::SetLabels;
use xer::metrics::counter::Counter;
use xer::metrics::family::Family;
use xer::metrics::gauge::Gauge;

pub fn family(c: &mut Criterion) {
    c.bench_function("counter family with set label (get_or_create)", |b| {
        let family = Family::<SetLabels, Counter>::default();
        let labels = SetLabels::new("svc-a");

        b.iter(|| {
            family.get_or_create(&labels).inc();
        });
    });

    c.bench_function(
        "counter family with Vec<(String, String)> fixed label set (get_or_create)",
        |b| {
            let family = Family::<Vec<(String, String)>, Counter>::default();

            b.iter(|| {
                family
                    .get_or_create(&vec![
                        ("set".to_owned(), "svc-a".to_owned()),
                        ("ep".to_owned(), "temp".to_owned()),
                    ])
                    .inc();
            });
        },
    );

    c.bench_function("gauge family with dynamic set label (get_or_create)", |b| {
        let family = Family::<SetLabels, Gauge>::default();

        b.iter_custom(|iters| {
            let start = Instant::now();
            for i in 0..iters {
                family
                    .get_or_create(&SetLabels::new(format!("svc_{}", i % 100)))
                    .set(i as f64);
            }
            start.elapsed()
        });
    });
}

criterion_group!(benches, family);
criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use xer::encoding::text::encode;
use xer::{CollectionSet, Endpoint, Instruments, Registry};

pub fn text(c: &mut Criterion) {
    c.bench_function("encode", |b| {
        let sets: Vec<CollectionSet> = (0..20)
            .map(|i| {
                (0..10).fold(CollectionSet::new(format!("svc_{i}"), 5), |set, j| {
                    set.with_endpoint(Endpoint::number(format!("ep_{j}"), "http://sensor"))
                })
            })
            .collect();

        let mut registry = Registry::default();
        let instruments = Instruments::register(&mut registry, &sets).unwrap();

        for set in &sets {
            for (j, endpoint) in set.endpoints.iter().enumerate() {
                instruments.inc_polls(&set.name);
                instruments.record_value(&set.name, &endpoint.name, j as f64 * 1.5);
            }
            instruments.inc_set_runs(&set.name);
            instruments.observe_scrape_time(&set.name, std::time::Duration::from_millis(12));
        }

        let mut buffer = String::new();

        b.iter(|| {
            buffer.clear();
            encode(&mut buffer, &registry).unwrap();
            black_box(&mut buffer);
        })
    });
}

criterion_group!(benches, text);
criterion_main!(benches);

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use iyp::{normalize, properties, CacheKey, InMemoryGraph, Iyp, IypConfig, Provenance, Value};

fn open() -> Iyp {
    Iyp::open(Arc::new(InMemoryGraph::new()), &IypConfig::default()).unwrap()
}

fn bench_cache_hit(c: &mut Criterion) {
    let mut iyp = open();
    let p = properties([("prefix", Value::from("2001:DB8::/32")), ("af", Value::from(6))]);
    iyp.resolve(["PREFIX"], &p, true).unwrap();

    c.bench_function("resolve/cache_hit", |b| {
        b.iter(|| black_box(iyp.resolve(["PREFIX"], black_box(&p), true).unwrap()));
    });
}

fn bench_cache_key(c: &mut Criterion) {
    let p = properties([
        ("asn", Value::from(2497)),
        ("name", Value::from("IIJ")),
        ("country_code", Value::from("JP")),
    ]);
    c.bench_function("cache/node_key", |b| {
        b.iter(|| black_box(CacheKey::node(["AS", "TIER1"], black_box(&p))));
    });
    c.bench_function("normalize/asn_string", |b| {
        let raw = properties([("asn", "2497")]);
        b.iter(|| black_box(normalize(black_box(&raw)).unwrap()));
    });
}

fn bench_upsert_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("upsert_throughput");
    group.throughput(Throughput::Elements(100));
    let reference = Provenance::new("BENCH", "http://bench");

    group.bench_function("100_as_with_country_link", |b| {
        b.iter(|| {
            let mut iyp = open();
            let cc = iyp
                .resolve(["COUNTRY"], &properties([("country_code", "JP")]), true)
                .unwrap()
                .unwrap();
            for asn in 0..100i64 {
                let id = iyp
                    .resolve(["AS"], &properties([("asn", asn)]), true)
                    .unwrap()
                    .unwrap();
                iyp.add_links(id, &[reference.link("COUNTRY", cc)]).unwrap();
            }
            iyp.commit().unwrap();
        });
    });
    group.finish();
}

/// Per-node upsert cost against graphs of growing size; it should stay flat.
fn bench_upsert_graph_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("upsert_graph_size");
    for size in [1_000i64, 10_000, 50_000] {
        let mut iyp = open();
        for asn in 0..size {
            iyp.resolve(["AS"], &properties([("asn", asn)]), true).unwrap();
        }
        iyp.commit().unwrap();

        let mut next = size;
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                next += 1;
                black_box(iyp.resolve(["AS"], &properties([("asn", next)]), true).unwrap())
            });
        });
    }
    group.finish();
}

criterion_group!(
    resolve,
    bench_cache_hit,
    bench_cache_key,
    bench_upsert_throughput,
    bench_upsert_graph_size
);
criterion_main!(resolve);

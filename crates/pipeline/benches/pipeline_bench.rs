//! 파이프라인 벤치마크
//!
//! 정규화와 탐지기 평가의 처리량을 측정합니다.

use std::sync::Arc;

use chrono::Utc;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde_json::{Map, Value, json};

use netsentry_core::event::Event;
use netsentry_core::pipeline::Detector;
use netsentry_pipeline::{IsolationForestDetector, IsolationForestParams, Normalizer, PortScanHeuristicDetector};

fn raw_event(port: u16) -> Map<String, Value> {
    match json!({
        "timestamp": "2024-01-15T12:00:00Z",
        "src_ip": "192.168.1.10",
        "dst_ip": "10.0.0.1",
        "src_port": "51515",
        "dst_port": port,
        "protocol": "TCP",
        "message": "Failed password for root",
        "host": "web-01",
    }) {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn baseline(n: u16) -> Vec<Event> {
    (0..n)
        .map(|i| {
            Event::new(Utc::now())
                .with_source(None, Some(1000 + i))
                .with_destination(None, Some(80))
                .with_protocol("http")
        })
        .collect()
}

fn bench_normalize(c: &mut Criterion) {
    let normalizer = Normalizer::default();
    let raw = raw_event(22);

    let mut group = c.benchmark_group("normalize");
    group.throughput(Throughput::Elements(1));
    group.bench_function("single", |b| {
        b.iter(|| normalizer.normalize(black_box(&raw), Some("bench")).unwrap())
    });

    group.throughput(Throughput::Elements(1000));
    group.bench_function("throughput_1000", |b| {
        b.iter(|| {
            for _ in 0..1000 {
                normalizer.normalize(black_box(&raw), None).unwrap();
            }
        })
    });
    group.finish();
}

fn bench_detect(c: &mut Criterion) {
    let event = Arc::new(Normalizer::default().normalize(&raw_event(22), None).unwrap());
    let heuristic = PortScanHeuristicDetector::default();

    let mut group = c.benchmark_group("detect");
    group.bench_function("heuristic", |b| b.iter(|| heuristic.evaluate(black_box(&event))));

    for trees in [10usize, 100] {
        let params = IsolationForestParams {
            n_estimators: trees,
            seed: Some(42),
            ..Default::default()
        };
        let forest = IsolationForestDetector::new(params)
            .unwrap()
            .fit(&baseline(256))
            .unwrap();
        group.bench_with_input(BenchmarkId::new("isolation_forest", trees), &forest, |b, f| {
            b.iter(|| f.evaluate(black_box(&event)))
        });
    }
    group.finish();
}

fn bench_fit(c: &mut Criterion) {
    let events = baseline(256);
    c.bench_function("isolation_forest_fit_256", |b| {
        b.iter(|| {
            IsolationForestDetector::new(IsolationForestParams::default())
                .unwrap()
                .fit(black_box(&events))
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_normalize, bench_detect, bench_fit);
criterion_main!(benches);

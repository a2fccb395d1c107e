//! Strategy selection and registry decode benchmarks
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serde_json::json;
use shapeshifter_rust::common::Target;
use shapeshifter_rust::dialer::{Connection, Dialer};
use shapeshifter_rust::strategy::{build_strategy, DialOutcome, StrategyKind};
use shapeshifter_rust::{Error, Result, TransportDialer, TransportKind, TransportRegistry};
use std::sync::Arc;
use std::time::Duration;

struct Idle;

#[async_trait::async_trait]
impl Dialer for Idle {
    async fn dial(&self, _target: &Target) -> Result<Box<dyn Connection>> {
        Err(Error::dial_failed(TransportKind::Obfs2, "idle"))
    }
}

impl TransportDialer for Idle {
    fn kind(&self) -> TransportKind {
        TransportKind::Obfs2
    }
}

fn bench_strategy_choose(c: &mut Criterion) {
    let candidates: Vec<Arc<dyn TransportDialer>> =
        (0..8).map(|_| Arc::new(Idle) as Arc<dyn TransportDialer>).collect();

    let mut group = c.benchmark_group("strategy_choose");
    group.throughput(Throughput::Elements(1));

    for kind in StrategyKind::ALL {
        let strategy = build_strategy(kind.as_str(), candidates.clone()).unwrap();
        group.bench_function(kind.as_str(), |b| {
            let mut round = 0u64;
            b.iter(|| {
                let index = strategy.choose().unwrap();
                round += 1;
                let outcome = if round % 5 == 0 {
                    DialOutcome::failure(Duration::from_millis(round % 97))
                } else {
                    DialOutcome::success(Duration::from_millis(round % 97))
                };
                strategy.report(index, &outcome);
                black_box(index)
            })
        });
    }

    group.finish();
}

fn bench_registry_decode(c: &mut Criterion) {
    let registry = TransportRegistry::new();
    let leaf = |i: u8| json!({"name": "obfs2", "config": {"address": format!("192.0.2.{}:443", i)}});
    let nested = json!({
        "transports": [
            leaf(1),
            {"name": "Optimizer", "config": {"transports": [leaf(2), leaf(3)], "strategy": "rotate"}},
            {"name": "shadow", "config": {"password": "pw", "cipherName": "aes-128-gcm", "address": "192.0.2.4:8388"}},
        ],
        "strategy": "track",
    })
    .to_string();

    let mut group = c.benchmark_group("registry_decode");

    group.bench_function("leaf", |b| {
        let raw = r#"{"address": "192.0.2.1:443"}"#;
        b.iter(|| black_box(registry.decode("obfs2", raw, None, None).unwrap()))
    });

    group.bench_function("nested_optimizer", |b| {
        b.iter(|| black_box(registry.decode("Optimizer", &nested, None, None).unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_strategy_choose, bench_registry_decode);
criterion_main!(benches);

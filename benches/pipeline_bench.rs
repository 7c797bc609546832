//! SILKMOTH pipeline throughput benchmarks.
//!
//! Exercises `Engine::search` end-to-end over synthetic source collections
//! of increasing size, comparing several corpus sizes under one
//! `BenchmarkId` group.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use silkmoth_rs::{Engine, EngineConfig, RawSet, SimFunc, SimMetric};

const VOCAB: &[&str] = &[
    "alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel", "india", "juliet",
    "kilo", "lima", "mike", "november", "oscar", "papa",
];

/// Deterministic pseudo-random generator (no `rand` dependency; a simple
/// linear congruential generator is enough for benchmark corpus shaping).
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        self.0
    }

    fn range(&mut self, bound: usize) -> usize {
        (self.next() % bound as u64) as usize
    }
}

fn generate_sources(count: usize, seed: u64) -> Vec<RawSet> {
    let mut rng = Lcg(seed);
    (0..count)
        .map(|_| {
            let elem_count = 2 + rng.range(4);
            let elements: Vec<String> = (0..elem_count)
                .map(|_| {
                    let word_count = 2 + rng.range(3);
                    (0..word_count)
                        .map(|_| VOCAB[rng.range(VOCAB.len())])
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect();
            elements.into()
        })
        .collect()
}

fn benchmark_search_by_corpus_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_search_corpus_size");
    group.measurement_time(Duration::from_secs(10));

    let corpus_sizes = [10usize, 50, 200, 500];

    for &size in &corpus_sizes {
        let sources = generate_sources(size, 0x5EED);
        let reference = generate_sources(1, 0xC0FFEE).into_iter().next().unwrap();
        let config = EngineConfig {
            delta: 0.4,
            sim_metric: SimMetric::SetContainment,
            sim_func: SimFunc::Jaccard,
            ..EngineConfig::default()
        };
        let engine = Engine::new(sources, config).expect("valid engine config");

        group.bench_with_input(BenchmarkId::new("jaccard_containment", size), &size, |b, _| {
            b.iter(|| black_box(engine.search(&reference).unwrap()));
        });
    }

    group.finish();
}

fn benchmark_signature_scheme_overhead(c: &mut Criterion) {
    use silkmoth_rs::SigType;

    let mut group = c.benchmark_group("signature_scheme_overhead");
    let sources = generate_sources(200, 0x5EED);
    let reference = generate_sources(1, 0xC0FFEE).into_iter().next().unwrap();

    for sig_type in [SigType::Weighted, SigType::Skyline, SigType::Dichotomy] {
        let config = EngineConfig {
            delta: 0.4,
            alpha: 0.2,
            sim_metric: SimMetric::SetContainment,
            sim_func: SimFunc::Jaccard,
            sig_type,
            ..EngineConfig::default()
        };
        let engine = Engine::new(sources.clone(), config).expect("valid engine config");
        let label = format!("{:?}", sig_type);

        group.bench_function(label, |b| {
            b.iter(|| black_box(engine.search(&reference).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_search_by_corpus_size, benchmark_signature_scheme_overhead);
criterion_main!(benches);

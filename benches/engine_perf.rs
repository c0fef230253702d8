mod fixtures;

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use capsim::cancel::CancelToken;
use capsim::correlation::{AffinityWeights, CorrelationModel};
use capsim::evolution::Snapshot;
use capsim::sampler::sample_totals;
use capsim::simulation::simulate_cost_evolution;
use capsim::validate::validate;

use fixtures::{LARGE, MEDIUM, SMALL, make_config, make_dataset};

// ── Group 1: correlation_build — element count scaling ───────────────────────

fn bench_correlation_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("correlation_build");
    for &n in &[10usize, 50, 100, 200] {
        let dataset = make_dataset(n / 2, n - n / 2);
        let normalised = validate(&dataset).expect("bench dataset must validate");
        group.throughput(Throughput::Elements((n * n) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                CorrelationModel::from_attrs(&normalised.attrs, &AffinityWeights::default())
                    .expect("factorisation failed")
            })
        });
    }
    group.finish();
}

// ── Group 2: checkpoint_sampling — iteration count scaling ───────────────────

fn bench_checkpoint_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("checkpoint_sampling");
    let dataset = make_dataset(20, 10);
    let normalised = validate(&dataset).expect("bench dataset must validate");
    let snapshot = Snapshot::from_normalised(&normalised);
    let model = CorrelationModel::from_attrs(&normalised.attrs, &AffinityWeights::default())
        .expect("factorisation failed");
    let token = CancelToken::new();
    for &n in &[1_000usize, 5_000, 10_000] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| sample_totals(&snapshot, &model, n, 0, 42, &token).unwrap())
        });
    }
    group.finish();
}

// ── Group 3: full_run — end-to-end scaling ───────────────────────────────────

fn bench_full_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_run");
    group.sample_size(10);
    for (name, scenario) in [("small", &SMALL), ("medium", &MEDIUM), ("large", &LARGE)] {
        let dataset = make_dataset(scenario.items, scenario.risks);
        let config = make_config(5_000);
        group.throughput(Throughput::Elements((scenario.items + scenario.risks) as u64));
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter_batched(
                || (dataset.clone(), config.clone()),
                |(dataset, config)| simulate_cost_evolution(&dataset, &config).unwrap(),
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

// ── Group 4: independent_sampling — identity factor fast path ────────────────

fn bench_independent_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("independent_sampling");
    let dataset = make_dataset(20, 10);
    let config = make_config(5_000).without_correlation();
    group.bench_function("5000_iters", |b| {
        b.iter_batched(
            || (dataset.clone(), config.clone()),
            |(dataset, config)| simulate_cost_evolution(&dataset, &config).unwrap(),
            BatchSize::LargeInput,
        )
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_correlation_build,
    bench_checkpoint_sampling,
    bench_full_run,
    bench_independent_sampling,
);
criterion_main!(benches);

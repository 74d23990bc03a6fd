//! Criterion benchmarks for simtally_core merging
//!
//! Run with: cargo bench -p simtally_core

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Binomial, Distribution};
use simtally_core::{
    MetricAccumulator, MetricKind, ResultCollection, SimulationParameters,
    combine_simulation_results, reduce_partials,
};

const BITS_PER_REP: u64 = 10_000;

/// One worker's share of repetitions at a single operating point
fn create_partial(seed: u64, reps: u64, error_rate: f64) -> ResultCollection {
    let mut rng = StdRng::seed_from_u64(seed);
    let errors = Binomial::new(BITS_PER_REP, error_rate).expect("valid binomial");

    let params = SimulationParameters::new().with_fixed("snr", 6);
    let mut collection = ResultCollection::with_parameters(params);
    let mut ber = MetricAccumulator::ratio("ber");
    let mut bit_errors = MetricAccumulator::additive("bit_errors");
    let mut modulation = MetricAccumulator::categorical("modulation", 4).expect("categories");

    for rep in 0..reps {
        let e = errors.sample(&mut rng) as f64;
        ber.update(e, Some(BITS_PER_REP as f64)).expect("ratio update");
        bit_errors.update(e, None).expect("additive update");
        modulation
            .update_choice((rep % 4) as usize)
            .expect("choice update");
    }
    collection.add(ber);
    collection.add(bit_errors);
    collection.add(modulation);
    collection.repetition_count = Some(reps);
    collection
}

/// A full sweep over `snr` with one ratio entry per point
fn create_sweep(seed: u64, snr: &[i64]) -> ResultCollection {
    let mut rng = StdRng::seed_from_u64(seed);
    let params = SimulationParameters::new()
        .with_fixed("bits", BITS_PER_REP as i64)
        .with_unpacked("snr", snr.iter().copied());
    let mut collection = ResultCollection::with_parameters(params);

    for &point in snr {
        let rate = 0.1 / (1.0 + point as f64);
        let errors = Binomial::new(BITS_PER_REP, rate).expect("valid binomial");
        let e = errors.sample(&mut rng) as f64;
        let bits = Some(BITS_PER_REP as f64);
        let ber =
            MetricAccumulator::create("ber", MetricKind::Ratio, e, bits, false).expect("ratio");
        collection.append(ber).expect("append");
    }
    collection
}

fn bench_accumulate(c: &mut Criterion) {
    c.bench_function("accumulate_1000_reps", |b| {
        b.iter(|| create_partial(black_box(7), black_box(1000), black_box(1e-3)))
    });
}

fn bench_reduce_partials(c: &mut Criterion) {
    let mut group = c.benchmark_group("reduce_partials");

    for workers in [8, 64, 512].iter() {
        let partials: Vec<_> = (0..*workers as u64)
            .map(|seed| create_partial(seed, 100, 1e-3))
            .collect();

        group.bench_with_input(BenchmarkId::new("workers", workers), workers, |b, _| {
            b.iter(|| reduce_partials(black_box(partials.clone())))
        });
    }

    group.finish();
}

fn bench_combine(c: &mut Criterion) {
    let mut group = c.benchmark_group("combine");

    for points in [10_i64, 100, 1000].iter() {
        let evens: Vec<i64> = (0..*points).map(|i| 2 * i).collect();
        let thirds: Vec<i64> = (0..*points).map(|i| 3 * i).collect();
        let first = create_sweep(1, &evens);
        let second = create_sweep(2, &thirds);

        group.bench_with_input(BenchmarkId::new("points", points), points, |b, _| {
            b.iter(|| combine_simulation_results(black_box(&first), black_box(&second)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_accumulate, bench_reduce_partials, bench_combine);
criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tlefit::kepler::{mean_to_true, solve_kepler_equation};

/// Uniform random in [0, 2π)
#[inline]
fn rand_angle(rng: &mut StdRng) -> f64 {
    rng.random::<f64>() * std::f64::consts::TAU
}

fn random_cases(rng: &mut StdRng, samples: usize, ecc: std::ops::Range<f64>) -> Vec<(f64, f64)> {
    (0..samples)
        .map(|_| (rng.random_range(ecc.clone()), rand_angle(rng)))
        .collect()
}

/// Element-set regime: e ∈ [0.0, 0.1)
fn bench_near_circular(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0xDEADBEEF);

    c.bench_function("solve_kepler_equation/e<0.1", |b| {
        b.iter_batched(
            || random_cases(&mut rng, 10_000, 0.0..0.1),
            |cases| {
                for (e, m) in cases {
                    black_box(solve_kepler_equation(black_box(e), black_box(m)));
                }
            },
            BatchSize::LargeInput,
        )
    });
}

/// High eccentricity, still elliptic: e ∈ [0.7, 0.95)
fn bench_high_e(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0xBADF00D);

    c.bench_function("solve_kepler_equation/e_0.7..0.95", |b| {
        b.iter_batched(
            || random_cases(&mut rng, 10_000, 0.7..0.95),
            |cases| {
                for (e, m) in cases {
                    black_box(solve_kepler_equation(black_box(e), black_box(m)));
                }
            },
            BatchSize::LargeInput,
        )
    });
}

/// Mean to true anomaly, the path taken on every propagation
fn bench_mean_to_true(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0xFEEDFACE);

    c.bench_function("mean_to_true/e<0.1", |b| {
        b.iter_batched(
            || random_cases(&mut rng, 10_000, 0.0..0.1),
            |cases| {
                for (e, m) in cases {
                    black_box(mean_to_true(black_box(e), black_box(m)));
                }
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_near_circular, bench_high_e, bench_mean_to_true
);
criterion_main!(benches);

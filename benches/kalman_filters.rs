//! Criterion benchmarks for the censored Kalman filter.
//!
//! Run with: cargo bench
//! Run specific group: cargo bench -- run
//! Run specific method: cargo bench -- log_prob/update

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;

use nalgebra::{DMatrix, DVector};
use ndarray::Array3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

use censored_kalman_filters_rs::{
    BeliefFamily, Design, DesignStep, FilterConfig, FilterInput, KalmanFilter, LikelihoodMethod,
    StateBelief,
};

// =============================================================================
// Scenarios
// =============================================================================

struct Scenario {
    name: &'static str,
    groups: usize,
    times: usize,
    states: usize,
    measures: usize,
    censored: bool,
}

const SCENARIOS: &[Scenario] = &[
    Scenario { name: "g10_t50_n2_m2", groups: 10, times: 50, states: 2, measures: 2, censored: false },
    Scenario { name: "g10_t50_n2_m2_cens", groups: 10, times: 50, states: 2, measures: 2, censored: true },
    Scenario { name: "g50_t100_n4_m3", groups: 50, times: 100, states: 4, measures: 3, censored: false },
    Scenario { name: "g50_t100_n4_m3_cens", groups: 50, times: 100, states: 4, measures: 3, censored: true },
];

struct Prepared {
    filter: KalmanFilter,
    prior: StateBelief,
    input: FilterInput,
}

fn prepare(s: &Scenario, family: BeliefFamily) -> Prepared {
    let mut rng = StdRng::seed_from_u64(42);
    let n = s.states;
    let m = s.measures;

    let f = DMatrix::from_fn(n, n, |i, j| if i == j { 0.95 } else if j == i + 1 { 0.1 } else { 0.0 });
    let q = DMatrix::identity(n, n) * 0.05;
    let h = DMatrix::from_fn(m, n, |i, j| if (i + j) % 2 == 0 { 1.0 } else { 0.3 });
    let r = DMatrix::identity(m, m) * 0.2;
    let design = Design::new(DesignStep::shared(f, q, h, r)).expect("valid design");

    let mut obs = Array3::from_shape_fn((s.groups, s.times, m), |_| {
        let v: f64 = StandardNormal.sample(&mut rng);
        if rng.gen::<f64>() < 0.1 {
            f64::NAN
        } else {
            v
        }
    });
    let input = if s.censored {
        obs.mapv_inplace(|v| if v.is_nan() { v } else { v.clamp(-1.0, 1.0) });
        let lower = Array3::from_elem(obs.dim(), -1.0);
        let upper = Array3::from_elem(obs.dim(), 1.0);
        FilterInput::new(obs, Some(lower), Some(upper)).expect("valid input")
    } else {
        FilterInput::from(obs)
    };

    let config = FilterConfig::builder().family(family).build();
    let prior = StateBelief::from_prior(family, s.groups, DVector::zeros(n), DMatrix::identity(n, n))
        .expect("valid prior");

    Prepared {
        filter: KalmanFilter::new(design, config),
        prior,
        input,
    }
}

// =============================================================================
// Filter run
// =============================================================================

fn bench_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("run");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    for scenario in SCENARIOS {
        let family = if scenario.censored {
            BeliefFamily::CensoredGaussian
        } else {
            BeliefFamily::Gaussian
        };
        let prep = prepare(scenario, family);

        group.bench_function(BenchmarkId::new(family.to_string(), scenario.name), |b| {
            b.iter(|| prep.filter.run(&prep.prior, &prep.input).expect("run"))
        });
    }

    group.finish();
}

// =============================================================================
// Log-likelihood
// =============================================================================

fn bench_log_prob(c: &mut Criterion) {
    for method in [LikelihoodMethod::Update, LikelihoodMethod::Independent] {
        let mut group = c.benchmark_group(format!("log_prob/{}", method));
        group.measurement_time(Duration::from_secs(10));
        group.sample_size(20);

        for scenario in SCENARIOS {
            let prep = prepare(scenario, BeliefFamily::CensoredGaussian);
            let over_time = prep.filter.run(&prep.prior, &prep.input).expect("run");

            group.bench_function(BenchmarkId::new("cells", scenario.name), |b| {
                b.iter(|| over_time.log_prob(&prep.input, method).expect("log_prob"))
            });
        }

        group.finish();
    }
}

criterion_group!(benches, bench_run, bench_log_prob);
criterion_main!(benches);

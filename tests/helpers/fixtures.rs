//! Model and data fixtures
//!
//! Deterministic designs, priors and observation cubes. Randomness always
//! comes from a seeded `StdRng`.

use nalgebra::{DMatrix, DVector};
use ndarray::Array3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

use censored_kalman_filters_rs::{BeliefFamily, Design, DesignStep, StateBelief};

/// 1×1 matrix
pub fn scalar(v: f64) -> DMatrix<f64> {
    DMatrix::from_row_slice(1, 1, &[v])
}

/// Local level model: `F = 1`, `H = 1`
pub fn local_level(q: f64, r: f64) -> Design {
    Design::new(DesignStep::shared(scalar(1.0), scalar(q), scalar(1.0), scalar(r)))
        .expect("valid local level design")
}

/// Level + trend state observed through two correlated measures
pub fn trend_two_measures() -> Design {
    #[rustfmt::skip]
    let f = DMatrix::from_row_slice(2, 2, &[
        1.0, 1.0,
        0.0, 1.0,
    ]);
    let q = DMatrix::from_diagonal(&DVector::from_vec(vec![0.05, 0.01]));
    #[rustfmt::skip]
    let h = DMatrix::from_row_slice(2, 2, &[
        1.0, 0.0,
        1.0, 0.5,
    ]);
    #[rustfmt::skip]
    let r = DMatrix::from_row_slice(2, 2, &[
        0.30, 0.05,
        0.05, 0.20,
    ]);
    Design::new(DesignStep::shared(f, q, h, r)).expect("valid trend design")
}

/// Random stable design with `n` states and `m` measures
pub fn random_design(rng: &mut StdRng, n: usize, m: usize) -> Design {
    let f = DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            rng.gen_range(0.5..1.0)
        } else {
            rng.gen_range(-0.2..0.2)
        }
    });
    let a = DMatrix::from_fn(n, n, |_, _| rng.gen_range(-0.3..0.3));
    let q = &a * a.transpose() + DMatrix::identity(n, n) * 0.01;
    let h = DMatrix::from_fn(m, n, |_, _| rng.gen_range(-1.0..1.0));
    let b = DMatrix::from_fn(m, m, |_, _| rng.gen_range(-0.3..0.3));
    let r = &b * b.transpose() + DMatrix::identity(m, m) * 0.1;
    Design::new(DesignStep::shared(f, q, h, r)).expect("valid random design")
}

/// Prior replicated over groups: zero mean, `scale · I` covariance
pub fn prior(family: BeliefFamily, groups: usize, n: usize, scale: f64) -> StateBelief {
    StateBelief::from_prior(
        family,
        groups,
        DVector::zeros(n),
        DMatrix::identity(n, n) * scale,
    )
    .expect("valid prior")
}

/// i.i.d. standard normal observations, `(groups, time, measures)`
pub fn normal_cube(seed: u64, groups: usize, times: usize, measures: usize) -> Array3<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array3::from_shape_fn((groups, times, measures), |_| StandardNormal.sample(&mut rng))
}

/// Knock out observations with probability `p_missing`
pub fn with_missing(mut obs: Array3<f64>, seed: u64, p_missing: f64) -> Array3<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    obs.mapv_inplace(|v| if rng.gen::<f64>() < p_missing { f64::NAN } else { v });
    obs
}

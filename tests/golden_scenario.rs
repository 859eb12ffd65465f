//! Hand-computed local level scenario
//!
//! One group, one measure, three timesteps with `F = 1`, `Q = 0.01`,
//! `H = 1`, `R = 0.1`, prior `N(0, 1)` and observations `[0.5, NaN, 1.2]`.
//! Every value below follows directly from the scalar Kalman equations.

mod helpers;

use ndarray::Array3;

use censored_kalman_filters_rs::{
    BeliefFamily, FilterConfig, FilterInput, KalmanFilter, LikelihoodMethod,
};

use helpers::assertions::assert_scalar_close;
use helpers::fixtures::{local_level, prior};

const TOLERANCE: f64 = 1e-12;

fn input() -> FilterInput {
    FilterInput::from(Array3::from_shape_vec((1, 3, 1), vec![0.5, f64::NAN, 1.2]).unwrap())
}

fn run(family: BeliefFamily) -> censored_kalman_filters_rs::BeliefOverTime {
    let config = FilterConfig::builder().family(family).build();
    let filter = KalmanFilter::new(local_level(0.01, 0.1), config);
    filter.run(&prior(family, 1, 1, 1.0), &input()).unwrap()
}

#[test]
fn test_golden_trajectory() {
    for family in [BeliefFamily::Gaussian, BeliefFamily::CensoredGaussian] {
        let over_time = run(family);
        let predicted = over_time.beliefs();
        let filtered = over_time.filtered();

        // t = 0: prior, then update on 0.5 with gain 1/1.1
        assert_scalar_close(predicted[0].means()[0][0], 0.0, TOLERANCE, "pred mean t0");
        assert_scalar_close(predicted[0].covs()[0][(0, 0)], 1.0, TOLERANCE, "pred cov t0");
        assert_scalar_close(filtered[0].means()[0][0], 0.5 / 1.1, TOLERANCE, "post mean t0");
        assert_scalar_close(filtered[0].covs()[0][(0, 0)], 0.1 / 1.1, TOLERANCE, "post cov t0");

        // t = 1: observation missing, filtered equals predicted
        assert_scalar_close(predicted[1].means()[0][0], 0.5 / 1.1, TOLERANCE, "pred mean t1");
        assert_scalar_close(
            predicted[1].covs()[0][(0, 0)],
            0.1 / 1.1 + 0.01,
            TOLERANCE,
            "pred cov t1",
        );
        assert_eq!(filtered[1].means(), predicted[1].means());
        assert_eq!(filtered[1].covs(), predicted[1].covs());
        assert_eq!(filtered[1].last_measured(), &[1]);

        // t = 2: carried through predict only, then update on 1.2
        assert_scalar_close(predicted[2].means()[0][0], 0.5 / 1.1, TOLERANCE, "pred mean t2");
        assert_scalar_close(
            predicted[2].covs()[0][(0, 0)],
            0.1 / 1.1 + 0.02,
            TOLERANCE,
            "pred cov t2",
        );
        assert_scalar_close(
            filtered[2].means()[0][0],
            0.846551724137931,
            TOLERANCE,
            "post mean t2",
        );
        assert_scalar_close(
            filtered[2].covs()[0][(0, 0)],
            0.05258620689655173,
            TOLERANCE,
            "post cov t2",
        );
        assert_eq!(filtered[2].last_measured(), &[0]);

        let final_mean = filtered[2].means()[0][0];
        assert!(final_mean > 0.5 && final_mean < 1.2);
    }
}

#[test]
fn test_golden_log_likelihood() {
    let over_time = run(BeliefFamily::CensoredGaussian);
    let input = input();

    for method in [LikelihoodMethod::Update, LikelihoodMethod::Independent] {
        let lp = over_time.log_prob(&input, method).unwrap();
        assert_eq!(lp.dim(), (1, 3));
        assert_scalar_close(lp[(0, 0)], -1.0802299867431988, 1e-10, "log prob t0");
        assert_eq!(lp[(0, 1)], 0.0);
        assert_scalar_close(lp[(0, 2)], -1.4581726087668534, 1e-10, "log prob t2");
        assert_scalar_close(
            over_time.total_log_prob(&input, method).unwrap(),
            -2.5384025955100524,
            1e-10,
            "total log prob",
        );
    }
}

#[test]
fn test_golden_predictions() {
    let over_time = run(BeliefFamily::Gaussian);
    let preds = over_time.predictions().unwrap();
    let unc = over_time.prediction_uncertainty().unwrap();

    assert_eq!(preds.dim(), (1, 3, 1));
    assert_scalar_close(preds[(0, 2, 0)], 0.5 / 1.1, TOLERANCE, "prediction t2");
    assert_scalar_close(unc[(0, 0, 0, 0)], 1.1, TOLERANCE, "uncertainty t0");
    assert_scalar_close(
        unc[(0, 2, 0, 0)],
        0.1 / 1.1 + 0.02 + 0.1,
        TOLERANCE,
        "uncertainty t2",
    );
}

//! Time-advance of per-group Gaussian beliefs
//!
//! Implements the linear-Gaussian transition used by every belief family:
//! - `μ' = F × μ`
//! - `Σ' = F × Σ × Fᵀ + Q`

use nalgebra::{DMatrix, DVector};

use crate::common::linalg::symmetrize;
use crate::design::Batched;

/// Predict one group's mean and covariance forward one step
///
/// The predicted covariance is symmetrized so round-off never breaks the
/// symmetry invariant.
#[inline]
pub fn predict_moments(
    mean: &DVector<f64>,
    cov: &DMatrix<f64>,
    f: &DMatrix<f64>,
    q: &DMatrix<f64>,
) -> (DVector<f64>, DMatrix<f64>) {
    let mean = f * mean;
    let cov = symmetrize(&(f * cov * f.transpose() + q));
    (mean, cov)
}

/// Predict every group forward one step
///
/// `f` and `q` may be shared or given per group.
pub fn predict_groups(
    means: &[DVector<f64>],
    covs: &[DMatrix<f64>],
    f: &Batched<DMatrix<f64>>,
    q: &Batched<DMatrix<f64>>,
) -> (Vec<DVector<f64>>, Vec<DMatrix<f64>>) {
    means
        .iter()
        .zip(covs)
        .enumerate()
        .map(|(g, (m, p))| predict_moments(m, p, f.get(g), q.get(g)))
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predict_moments_local_trend() {
        // level/trend: level' = level + trend
        let f = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 0.0, 1.0]);
        let q = DMatrix::from_diagonal(&DVector::from_vec(vec![0.1, 0.01]));
        let mean = DVector::from_vec(vec![2.0, 0.5]);
        let cov = DMatrix::identity(2, 2);

        let (m, p) = predict_moments(&mean, &cov, &f, &q);

        assert!((m[0] - 2.5).abs() < 1e-12);
        assert!((m[1] - 0.5).abs() < 1e-12);
        // F Fᵀ = [[2, 1], [1, 1]]
        assert!((p[(0, 0)] - 2.1).abs() < 1e-12);
        assert!((p[(0, 1)] - 1.0).abs() < 1e-12);
        assert!((p[(1, 1)] - 1.01).abs() < 1e-12);
        assert_eq!(p[(0, 1)], p[(1, 0)]);
    }

    #[test]
    fn test_predict_groups_per_group_transition() {
        let f = Batched::PerGroup(vec![
            DMatrix::from_row_slice(1, 1, &[1.0]),
            DMatrix::from_row_slice(1, 1, &[0.5]),
        ]);
        let q = Batched::Shared(DMatrix::from_row_slice(1, 1, &[0.2]));
        let means = vec![DVector::from_vec(vec![4.0]); 2];
        let covs = vec![DMatrix::from_row_slice(1, 1, &[1.0]); 2];

        let (m, p) = predict_groups(&means, &covs, &f, &q);

        assert_eq!(m[0][0], 4.0);
        assert_eq!(m[1][0], 2.0);
        assert!((p[0][(0, 0)] - 1.2).abs() < 1e-12);
        assert!((p[1][(0, 0)] - 0.45).abs() < 1e-12);
    }
}

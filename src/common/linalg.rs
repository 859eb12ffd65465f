//! Linear algebra utilities
//!
//! Gaussian densities, standard-normal helpers, diagonal embedding and the
//! covariance checks used by predict/update. Everything works on runtime
//! dimensions (`DVector` / `DMatrix`).

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use statrs::consts::LN_SQRT_2PI;
use statrs::function::erf::erfc;

use crate::filter::errors::FilterError;

/// Standardized distances are clamped into `[-Z_CLAMP, Z_CLAMP]` before a CDF tail is taken.
pub const Z_CLAMP: f64 = 5.0;

/// Embed a vector as the diagonal of a square matrix
#[inline]
pub fn matrix_diag(diagonal: &DVector<f64>) -> DMatrix<f64> {
    DMatrix::from_diagonal(diagonal)
}

/// Build a covariance from marginal standard deviations and a correlation matrix
///
/// `Σ = D · C · D` with `D = diag(std_devs)`.
pub fn quad_form_diag(
    std_devs: &DVector<f64>,
    corr: &DMatrix<f64>,
) -> Result<DMatrix<f64>, FilterError> {
    let n = std_devs.len();
    if corr.nrows() != n || corr.ncols() != n {
        return Err(FilterError::dimension(
            n,
            corr.nrows(),
            "correlation matrix",
        ));
    }
    let d = matrix_diag(std_devs);
    Ok(&d * corr * &d)
}

/// Make matrix symmetric
///
/// Averages a matrix with its transpose.
#[inline]
pub fn symmetrize(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    0.5 * (matrix + matrix.transpose())
}

/// Smallest eigenvalue of a symmetric matrix
pub fn min_eigenvalue(matrix: &DMatrix<f64>) -> f64 {
    if matrix.is_empty() {
        return 0.0;
    }
    SymmetricEigen::new(matrix.clone())
        .eigenvalues
        .iter()
        .cloned()
        .fold(f64::INFINITY, f64::min)
}

/// Verify a covariance is symmetric positive semi-definite within `tolerance`
pub fn check_psd(matrix: &DMatrix<f64>, tolerance: f64, context: &str) -> Result<(), FilterError> {
    let asymmetry = (matrix - matrix.transpose()).amax();
    if asymmetry > tolerance {
        return Err(FilterError::NotPositiveSemiDefinite {
            context: format!("{} (asymmetry {:.3e})", context, asymmetry),
            min_eigenvalue: f64::NAN,
        });
    }
    let min_eig = min_eigenvalue(matrix);
    if !min_eig.is_finite() || min_eig < -tolerance {
        return Err(FilterError::NotPositiveSemiDefinite {
            context: context.to_string(),
            min_eigenvalue: min_eig,
        });
    }
    Ok(())
}

/// Matrix square root `L` of a PSD covariance such that `L·Lᵀ = Σ`
///
/// Uses Cholesky when possible and a symmetric eigendecomposition for
/// rank-deficient covariances (eigenvalues below zero are treated as zero).
pub fn psd_sqrt(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    if let Some(chol) = matrix.clone().cholesky() {
        return chol.l();
    }
    let eig = SymmetricEigen::new(symmetrize(matrix));
    let roots = eig.eigenvalues.map(|v| v.max(0.0).sqrt());
    &eig.eigenvectors * DMatrix::from_diagonal(&roots)
}

/// Solve `S · X = B` for a square system `S`
///
/// Singular `S` is a fatal numerical failure.
pub fn solve(
    system: &DMatrix<f64>,
    rhs: &DMatrix<f64>,
    context: &str,
) -> Result<DMatrix<f64>, FilterError> {
    system
        .clone()
        .lu()
        .solve(rhs)
        .filter(|x| x.iter().all(|v| v.is_finite()))
        .ok_or_else(|| FilterError::SingularMatrix {
            context: context.to_string(),
        })
}

/// Log density of a multivariate Gaussian
///
/// Requires a positive definite covariance; anything else is reported as
/// [`FilterError::SingularMatrix`].
pub fn log_gaussian_pdf(
    x: &DVector<f64>,
    mu: &DVector<f64>,
    sigma: &DMatrix<f64>,
) -> Result<f64, FilterError> {
    let k = x.len();
    let diff = x - mu;

    let chol = sigma
        .clone()
        .cholesky()
        .ok_or_else(|| FilterError::SingularMatrix {
            context: "Gaussian log-density covariance is not positive definite".to_string(),
        })?;

    let mahalanobis = diff.dot(&chol.solve(&diff));
    let l = chol.l();
    let half_logdet: f64 = (0..k).map(|i| l[(i, i)].ln()).sum();

    Ok(-(k as f64) * LN_SQRT_2PI - half_logdet - 0.5 * mahalanobis)
}

/// Standard normal density
#[inline]
pub fn std_normal_pdf(z: f64) -> f64 {
    std_normal_ln_pdf(z).exp()
}

/// Standard normal log-density
#[inline]
pub fn std_normal_ln_pdf(z: f64) -> f64 {
    -0.5 * z * z - LN_SQRT_2PI
}

/// Standard normal CDF
#[inline]
pub fn std_normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / std::f64::consts::SQRT_2)
}

/// Clamp a standardized distance into `[-Z_CLAMP, Z_CLAMP]`
#[inline]
pub fn clamp_z(z: f64) -> f64 {
    z.clamp(-Z_CLAMP, Z_CLAMP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_matrix_diag() {
        let d = matrix_diag(&DVector::from_vec(vec![1.0, 2.0, 3.0]));
        assert_eq!(d.nrows(), 3);
        assert_eq!(d[(1, 1)], 2.0);
        assert_eq!(d[(0, 1)], 0.0);
    }

    #[test]
    fn test_quad_form_diag() {
        let std = DVector::from_vec(vec![2.0, 3.0]);
        let corr = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.5, 1.0]);
        let cov = quad_form_diag(&std, &corr).unwrap();
        assert_abs_diff_eq!(cov[(0, 0)], 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cov[(1, 1)], 9.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cov[(0, 1)], 3.0, epsilon = 1e-12);

        let bad = DMatrix::identity(3, 3);
        assert!(quad_form_diag(&std, &bad).is_err());
    }

    #[test]
    fn test_log_gaussian_pdf_univariate() {
        let x = DVector::from_vec(vec![1.0]);
        let mu = DVector::from_vec(vec![0.0]);
        let sigma = DMatrix::from_row_slice(1, 1, &[4.0]);
        let expected = -0.5 * (2.0 * std::f64::consts::PI).ln() - 2.0f64.ln() - 0.125;
        assert_abs_diff_eq!(
            log_gaussian_pdf(&x, &mu, &sigma).unwrap(),
            expected,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_log_gaussian_pdf_rejects_singular() {
        let x = DVector::from_vec(vec![0.0, 0.0]);
        let sigma = DMatrix::zeros(2, 2);
        assert!(matches!(
            log_gaussian_pdf(&x, &x, &sigma),
            Err(FilterError::SingularMatrix { .. })
        ));
    }

    #[test]
    fn test_std_normal_helpers() {
        assert_abs_diff_eq!(std_normal_cdf(0.0), 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(std_normal_cdf(1.959963984540054), 0.975, epsilon = 1e-9);
        assert_abs_diff_eq!(
            std_normal_pdf(0.0),
            1.0 / (2.0 * std::f64::consts::PI).sqrt(),
            epsilon = 1e-15
        );
        assert_eq!(clamp_z(12.0), Z_CLAMP);
        assert_eq!(clamp_z(-12.0), -Z_CLAMP);
        assert_eq!(clamp_z(0.3), 0.3);
    }

    #[test]
    fn test_check_psd() {
        let good = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 2.0]);
        assert!(check_psd(&good, 1e-10, "good").is_ok());

        let bad = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        assert!(matches!(
            check_psd(&bad, 1e-10, "bad"),
            Err(FilterError::NotPositiveSemiDefinite { .. })
        ));
    }

    #[test]
    fn test_psd_sqrt_reconstructs_rank_deficient() {
        let cov = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let l = psd_sqrt(&cov);
        let rebuilt = &l * l.transpose();
        for (a, b) in rebuilt.iter().zip(cov.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_solve_singular() {
        let s = DMatrix::zeros(2, 2);
        let b = DMatrix::identity(2, 2);
        assert!(matches!(
            solve(&s, &b, "test"),
            Err(FilterError::SingularMatrix { .. })
        ));
    }
}

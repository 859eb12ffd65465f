//! Generic assertion functions for numerical comparisons with tolerance

use nalgebra::{DMatrix, DVector, SymmetricEigen};

/// Compare scalar values with tolerance
pub fn assert_scalar_close(actual: f64, expected: f64, tolerance: f64, field_name: &str) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= tolerance,
        "{}: expected {}, got {} (diff: {}, tolerance: {})",
        field_name,
        expected,
        actual,
        diff,
        tolerance
    );
}

/// Compare DVector with tolerance
pub fn assert_dvector_close(
    actual: &DVector<f64>,
    expected: &DVector<f64>,
    tolerance: f64,
    field_name: &str,
) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "{}: dimension mismatch (actual: {}, expected: {})",
        field_name,
        actual.len(),
        expected.len()
    );
    for i in 0..actual.len() {
        assert_scalar_close(
            actual[i],
            expected[i],
            tolerance,
            &format!("{}[{}]", field_name, i),
        );
    }
}

/// Compare DMatrix with tolerance
pub fn assert_dmatrix_close(
    actual: &DMatrix<f64>,
    expected: &DMatrix<f64>,
    tolerance: f64,
    field_name: &str,
) {
    assert_eq!(
        actual.shape(),
        expected.shape(),
        "{}: shape mismatch",
        field_name
    );
    for i in 0..actual.nrows() {
        for j in 0..actual.ncols() {
            assert_scalar_close(
                actual[(i, j)],
                expected[(i, j)],
                tolerance,
                &format!("{}[{},{}]", field_name, i, j),
            );
        }
    }
}

/// Assert a covariance is symmetric with non-negative eigenvalues
pub fn assert_psd(cov: &DMatrix<f64>, tolerance: f64, field_name: &str) {
    assert_dmatrix_close(cov, &cov.transpose(), 0.0, &format!("{} symmetry", field_name));
    let min_eig = SymmetricEigen::new(cov.clone())
        .eigenvalues
        .iter()
        .cloned()
        .fold(f64::INFINITY, f64::min);
    assert!(
        min_eig >= -tolerance,
        "{}: min eigenvalue {} below -{}",
        field_name,
        min_eig,
        tolerance
    );
}

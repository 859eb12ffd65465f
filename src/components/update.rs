//! Kalman measurement update, generalised for censored measurements
//!
//! The censored update scales the measurement matrix by the observable
//! probability mass `Π = diag(1 − p_up − p_lo)` and replaces the measured
//! mean and the diagonal of `R` by their Tobit-adjusted counterparts:
//!
//! ```text
//! K  = P Hᵀ Π (Π H P Hᵀ Π + R_adj)⁻¹
//! μ' = μ + K (y − m_adj)
//! P' = (I − K Π H) P
//! ```
//!
//! With no bounds `Π = I`, `m_adj = H μ` and `R_adj = R`, which is the
//! standard Kalman update. All inputs here are already subset to the valid
//! measurement dimensions of one group.

use nalgebra::{DMatrix, DVector};

use crate::common::linalg::{solve, symmetrize};
use crate::components::tobit::tobit_correction;
use crate::filter::errors::FilterError;

/// Measured moments entering the gain computation
#[derive(Debug, Clone)]
pub struct MeasuredMoments {
    /// Observable mass per dimension as a diagonal matrix
    pub prob_obs: DMatrix<f64>,
    /// Measured mean (Tobit-adjusted when censored)
    pub mean: DVector<f64>,
    /// Measurement noise (diagonal Tobit-adjusted when censored)
    pub cov: DMatrix<f64>,
}

impl MeasuredMoments {
    /// Uncensored moments: `Π = I`, `m = H μ`, `R` unchanged
    pub fn plain(measured_mean: DVector<f64>, r: &DMatrix<f64>) -> Self {
        let n = measured_mean.len();
        Self {
            prob_obs: DMatrix::identity(n, n),
            mean: measured_mean,
            cov: r.clone(),
        }
    }

    /// Censored moments from the Tobit correction of `N(H μ, R)`
    pub fn censored(
        measured_mean: &DVector<f64>,
        r: &DMatrix<f64>,
        lower: Option<&DVector<f64>>,
        upper: Option<&DVector<f64>>,
    ) -> Self {
        let c = tobit_correction(measured_mean, r, lower, upper);
        Self {
            prob_obs: c.prob_obs,
            mean: c.mean,
            cov: c.cov,
        }
    }

    /// System uncertainty `Π H P Hᵀ Π + R_adj`
    pub fn system_uncertainty(&self, h: &DMatrix<f64>, cov: &DMatrix<f64>) -> DMatrix<f64> {
        let ph = &self.prob_obs * h;
        &ph * cov * ph.transpose() + &self.cov
    }
}

/// Kalman gain `K = P Hᵀ Π S⁻¹`
///
/// Solved as `Sᵀ Kᵀ = (P Hᵀ Π)ᵀ` rather than by explicit inversion. A singular
/// `S` is a fatal numerical failure.
pub fn kalman_gain(
    cov: &DMatrix<f64>,
    h: &DMatrix<f64>,
    measured: &MeasuredMoments,
) -> Result<DMatrix<f64>, FilterError> {
    let system = measured.system_uncertainty(h, cov);
    let cross = cov * h.transpose() * &measured.prob_obs;
    let gain_t = solve(
        &system.transpose(),
        &cross.transpose(),
        "system uncertainty in Kalman gain",
    )?;
    Ok(gain_t.transpose())
}

/// Apply the measurement update to one group
///
/// Returns the updated `(mean, covariance)`; the covariance is symmetrized.
pub fn update_moments(
    mean: &DVector<f64>,
    cov: &DMatrix<f64>,
    h: &DMatrix<f64>,
    obs: &DVector<f64>,
    measured: &MeasuredMoments,
) -> Result<(DVector<f64>, DMatrix<f64>), FilterError> {
    let gain = kalman_gain(cov, h, measured)?;

    let new_mean = mean + &gain * (obs - &measured.mean);

    let n = cov.nrows();
    let ikh = DMatrix::identity(n, n) - &gain * &measured.prob_obs * h;
    let new_cov = symmetrize(&(ikh * cov));

    Ok((new_mean, new_cov))
}

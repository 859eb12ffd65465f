//! Censoring corrections for Gaussian measurements (Tobit model).
//!
//! A measurement `y = clamp(x, lower, upper)` with `x ~ N(m, R)` only reveals
//! that `x` lies beyond a bound when it is censored. Per measurement
//! dimension we need:
//!
//! - the probability mass below `lower` and above `upper`, and
//! - the mean and variance of the censored variable `y`, which replace the
//!   measured mean and the diagonal of `R` during the update.
//!
//! Dimensions are treated independently (marginals of `R`). Standardized
//! bounds are clamped into `[-5, 5]` before any CDF/PDF is evaluated.
//! Missing or infinite bounds contribute exactly zero probability, so with
//! no bounds the corrections are the identity.

use nalgebra::{DMatrix, DVector};

use crate::common::linalg::{clamp_z, matrix_diag, std_normal_cdf, std_normal_pdf};

/// Per-dimension truncation geometry
#[derive(Debug, Clone, Copy)]
struct Truncation {
    mean: f64,
    variance: f64,
    std: f64,
    lower: Option<f64>,
    upper: Option<f64>,
    /// Clamped standardized lower bound
    alpha: Option<f64>,
    /// Clamped standardized upper bound
    beta: Option<f64>,
    prob_lo: f64,
    prob_up: f64,
}

impl Truncation {
    fn new(mean: f64, variance: f64, lower: Option<f64>, upper: Option<f64>) -> Self {
        let std = variance.sqrt();
        let lower = lower.filter(|v| v.is_finite());
        let upper = upper.filter(|v| v.is_finite());
        let alpha = lower.map(|l| clamp_z((l - mean) / std));
        let beta = upper.map(|u| clamp_z((u - mean) / std));
        Self {
            mean,
            variance,
            std,
            lower,
            upper,
            alpha,
            beta,
            prob_lo: alpha.map_or(0.0, std_normal_cdf),
            prob_up: beta.map_or(0.0, |b| std_normal_cdf(-b)),
        }
    }

    /// Mass strictly between the bounds, `Φ(β) − Φ(α)`
    ///
    /// Evaluated as a CDF difference so it cannot round below zero when both
    /// bounds saturate at the same clamp.
    #[inline]
    fn prob_obs(&self) -> f64 {
        let hi = self.beta.map_or(1.0, std_normal_cdf);
        let lo = self.alpha.map_or(0.0, std_normal_cdf);
        (hi - lo).max(0.0)
    }

    /// Mean and variance of the censored variable
    fn moments(&self) -> (f64, f64) {
        let z = self.prob_obs();
        let pdf_a = self.alpha.map_or(0.0, std_normal_pdf);
        let pdf_b = self.beta.map_or(0.0, std_normal_pdf);
        let a_pdf_a = self.alpha.map_or(0.0, |a| a * std_normal_pdf(a));
        let b_pdf_b = self.beta.map_or(0.0, |b| b * std_normal_pdf(b));

        // E[z; a<z<b] and E[z²; a<z<b] for the standardized variable
        let first = pdf_a - pdf_b;
        let second = z + a_pdf_a - b_pdf_b;

        // Point masses sit at the raw bounds; only the standardized
        // alpha/beta are clamped, so far-off bounds leave an O(Φ(−5)) residual.
        let lo_term = self.lower.map_or(0.0, |l| self.prob_lo * l);
        let up_term = self.upper.map_or(0.0, |u| self.prob_up * u);
        let mean = lo_term + up_term + z * self.mean + self.std * first;

        let d = self.mean - mean;
        let interior = z * d * d + 2.0 * d * self.std * first + self.variance * second;
        let lo_sq = self.lower.map_or(0.0, |l| self.prob_lo * (l - mean).powi(2));
        let up_sq = self.upper.map_or(0.0, |u| self.prob_up * (u - mean).powi(2));

        (mean, interior + lo_sq + up_sq)
    }
}

fn truncations(
    mean: &DVector<f64>,
    cov: &DMatrix<f64>,
    lower: Option<&DVector<f64>>,
    upper: Option<&DVector<f64>>,
) -> Vec<Truncation> {
    (0..mean.len())
        .map(|i| {
            Truncation::new(
                mean[i],
                cov[(i, i)],
                lower.map(|l| l[i]),
                upper.map(|u| u[i]),
            )
        })
        .collect()
}

/// Probability mass below `lower` and above `upper`, per dimension
///
/// Returns `(prob_below_lower, prob_above_upper)`. Both lie in `[0, 1]`.
pub fn tobit_probs(
    mean: &DVector<f64>,
    cov: &DMatrix<f64>,
    lower: Option<&DVector<f64>>,
    upper: Option<&DVector<f64>>,
) -> (DVector<f64>, DVector<f64>) {
    let tr = truncations(mean, cov, lower, upper);
    (
        DVector::from_iterator(tr.len(), tr.iter().map(|t| t.prob_lo)),
        DVector::from_iterator(tr.len(), tr.iter().map(|t| t.prob_up)),
    )
}

/// Censored-variable mean and covariance
///
/// The diagonal of `cov` is replaced by the censored variances; off-diagonal
/// entries are left as they are.
pub fn tobit_adjustment(
    mean: &DVector<f64>,
    cov: &DMatrix<f64>,
    lower: Option<&DVector<f64>>,
    upper: Option<&DVector<f64>>,
) -> (DVector<f64>, DMatrix<f64>) {
    let correction = tobit_correction(mean, cov, lower, upper);
    (correction.mean, correction.cov)
}

/// Diagonal matrix of observable mass `1 − prob_up − prob_lo`
#[inline]
pub fn prob_obs_matrix(prob_lo: &DVector<f64>, prob_up: &DVector<f64>) -> DMatrix<f64> {
    matrix_diag(&prob_lo.zip_map(prob_up, |lo, up| (1.0 - lo - up).max(0.0)))
}

/// Everything the censored update needs, computed in one pass
#[derive(Debug, Clone)]
pub struct TobitCorrection {
    /// Probability below the lower bound
    pub prob_lo: DVector<f64>,
    /// Probability above the upper bound
    pub prob_up: DVector<f64>,
    /// `diag(1 − prob_up − prob_lo)`
    pub prob_obs: DMatrix<f64>,
    /// Censored-variable mean
    pub mean: DVector<f64>,
    /// Covariance with censored variances on the diagonal
    pub cov: DMatrix<f64>,
}

/// Compute probabilities and adjusted moments together
pub fn tobit_correction(
    mean: &DVector<f64>,
    cov: &DMatrix<f64>,
    lower: Option<&DVector<f64>>,
    upper: Option<&DVector<f64>>,
) -> TobitCorrection {
    let tr = truncations(mean, cov, lower, upper);
    let n = tr.len();

    let prob_lo = DVector::from_iterator(n, tr.iter().map(|t| t.prob_lo));
    let prob_up = DVector::from_iterator(n, tr.iter().map(|t| t.prob_up));
    let prob_obs = matrix_diag(&DVector::from_iterator(n, tr.iter().map(|t| t.prob_obs())));

    let mut adj_mean = DVector::zeros(n);
    let mut adj_cov = cov.clone();
    for (i, t) in tr.iter().enumerate() {
        let (m, v) = t.moments();
        adj_mean[i] = m;
        adj_cov[(i, i)] = v;
    }

    TobitCorrection {
        prob_lo,
        prob_up,
        prob_obs,
        mean: adj_mean,
        cov: adj_cov,
    }
}

//! Per-group Gaussian beliefs over latent state
//!
//! A [`StateBelief`] holds one mean vector and covariance matrix per group.
//! It is advanced with [`StateBelief::predict`] and assimilates observations
//! with [`StateBelief::update`]. Both return a new belief; the previous one is
//! left untouched so a run can keep the full sequence for likelihoods.
//!
//! The two belief families share a single update routine. The censored
//! family accepts lower/upper bounds and applies the Tobit correction; with
//! no bounds it reduces to the plain Kalman update.

pub mod over_time;

use std::fmt;

use nalgebra::{DMatrix, DVector};
use ndarray::{Array2, ArrayView2};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::Serialize;

use crate::common::indexing::{
    partition_by, select_elements, select_rows, select_square, which_valid,
};
use crate::common::linalg::{check_psd, psd_sqrt, symmetrize};
use crate::components::prediction::predict_groups;
use crate::components::update::{update_moments, MeasuredMoments};
use crate::design::DesignStep;
use crate::filter::errors::FilterError;
use crate::filter::DEFAULT_PSD_TOLERANCE;
use crate::input::FilterInput;

pub use over_time::{BeliefOverTime, LikelihoodMethod};

/// Which observation model a belief updates under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BeliefFamily {
    /// Plain Kalman update; bounds are rejected
    Gaussian,
    /// Kalman update with Tobit-corrected censored measurements
    #[default]
    CensoredGaussian,
}

impl BeliefFamily {
    /// True when lower/upper censoring bounds may be supplied
    #[inline]
    pub fn supports_bounds(self) -> bool {
        matches!(self, BeliefFamily::CensoredGaussian)
    }
}

impl fmt::Display for BeliefFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeliefFamily::Gaussian => write!(f, "gaussian"),
            BeliefFamily::CensoredGaussian => write!(f, "censored_gaussian"),
        }
    }
}

/// Which groups an update touched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Number of distinct missingness patterns
    pub num_partitions: usize,
    /// Groups with at least one observed measure, ascending
    pub updated: Vec<usize>,
    /// Groups whose observation row was entirely missing, ascending
    pub missing: Vec<usize>,
}

/// Gaussian belief over latent state, one per group
#[derive(Debug, Clone, PartialEq)]
pub struct StateBelief {
    family: BeliefFamily,
    means: Vec<DVector<f64>>,
    covs: Vec<DMatrix<f64>>,
    last_measured: Vec<usize>,
    psd_tolerance: Option<f64>,
}

impl StateBelief {
    /// Create a belief from per-group means and covariances
    ///
    /// Every group must have the same state dimension and a finite symmetric
    /// PSD covariance.
    pub fn new(
        family: BeliefFamily,
        means: Vec<DVector<f64>>,
        covs: Vec<DMatrix<f64>>,
    ) -> Result<Self, FilterError> {
        if means.is_empty() {
            return Err(FilterError::malformed("means", "need at least one group"));
        }
        if covs.len() != means.len() {
            return Err(FilterError::dimension(means.len(), covs.len(), "number of covariances"));
        }
        let n = means[0].len();
        if n == 0 {
            return Err(FilterError::malformed("means", "state dimension must be > 0"));
        }
        for (g, (m, p)) in means.iter().zip(&covs).enumerate() {
            if m.len() != n {
                return Err(FilterError::dimension(n, m.len(), format!("mean of group {}", g)));
            }
            if p.nrows() != n || p.ncols() != n {
                return Err(FilterError::dimension(n, p.nrows(), format!("covariance of group {}", g)));
            }
            if m.iter().chain(p.iter()).any(|v| !v.is_finite()) {
                return Err(FilterError::malformed(
                    "prior",
                    format!("group {} has non-finite values", g),
                ));
            }
        }

        let belief = Self {
            family,
            last_measured: vec![0; means.len()],
            means,
            covs,
            psd_tolerance: Some(DEFAULT_PSD_TOLERANCE),
        };
        belief.check_covariances("prior")?;
        Ok(belief)
    }

    /// Replicate one prior mean and covariance across `num_groups` groups
    pub fn from_prior(
        family: BeliefFamily,
        num_groups: usize,
        mean: DVector<f64>,
        cov: DMatrix<f64>,
    ) -> Result<Self, FilterError> {
        Self::new(family, vec![mean; num_groups], vec![cov; num_groups])
    }

    /// Set the PSD check tolerance; `None` disables the check
    pub fn with_psd_tolerance(mut self, tolerance: Option<f64>) -> Self {
        self.psd_tolerance = tolerance;
        self
    }

    /// Belief family
    #[inline]
    pub fn family(&self) -> BeliefFamily {
        self.family
    }

    /// Number of groups
    #[inline]
    pub fn num_groups(&self) -> usize {
        self.means.len()
    }

    /// Latent state dimension
    #[inline]
    pub fn num_states(&self) -> usize {
        self.means[0].len()
    }

    /// Per-group means
    pub fn means(&self) -> &[DVector<f64>] {
        &self.means
    }

    /// Per-group covariances
    pub fn covs(&self) -> &[DMatrix<f64>] {
        &self.covs
    }

    /// Timesteps since each group last had any observed measure
    pub fn last_measured(&self) -> &[usize] {
        &self.last_measured
    }

    /// PSD tolerance in effect
    pub fn psd_tolerance(&self) -> Option<f64> {
        self.psd_tolerance
    }

    /// Means as a `(groups, states)` array
    pub fn means_array(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.num_groups(), self.num_states()), |(g, i)| {
            self.means[g][i]
        })
    }

    fn check_step(&self, step: &DesignStep) -> Result<(), FilterError> {
        step.check_groups(self.num_groups())?;
        step.check_shapes(self.num_states(), step.num_measures())
    }

    fn check_covariances(&self, stage: &str) -> Result<(), FilterError> {
        if let Some(tol) = self.psd_tolerance {
            for (g, p) in self.covs.iter().enumerate() {
                check_psd(p, tol, &format!("covariance of group {} after {}", g, stage))?;
            }
        }
        Ok(())
    }

    /// Advance one timestep: `μ' = F μ`, `Σ' = F Σ Fᵀ + Q`
    pub fn predict(&self, step: &DesignStep) -> Result<Self, FilterError> {
        self.check_step(step)?;
        let (means, covs) = predict_groups(&self.means, &self.covs, &step.f, &step.q);
        let next = Self {
            means,
            covs,
            ..self.clone()
        };
        next.check_covariances("predict")?;
        Ok(next)
    }

    /// Assimilate one timestep of observations
    ///
    /// `obs` is `(groups, measures)` with NaN for missing elements. Bounds,
    /// if given, have the same shape.
    ///
    /// # Errors
    /// - [`FilterError::UnsupportedBounds`] if bounds are given to a
    ///   [`BeliefFamily::Gaussian`] belief
    /// - [`FilterError::SingularMatrix`] if a system uncertainty is singular
    pub fn update(
        &self,
        step: &DesignStep,
        obs: ArrayView2<'_, f64>,
        lower: Option<ArrayView2<'_, f64>>,
        upper: Option<ArrayView2<'_, f64>>,
    ) -> Result<Self, FilterError> {
        self.update_with_summary(step, obs, lower, upper)
            .map(|(belief, _)| belief)
    }

    /// [`StateBelief::update`], also reporting which groups were updated
    pub fn update_with_summary(
        &self,
        step: &DesignStep,
        obs: ArrayView2<'_, f64>,
        lower: Option<ArrayView2<'_, f64>>,
        upper: Option<ArrayView2<'_, f64>>,
    ) -> Result<(Self, UpdateSummary), FilterError> {
        self.check_step(step)?;
        let expected = (self.num_groups(), step.num_measures());
        if obs.dim() != expected {
            return Err(FilterError::malformed(
                "obs",
                format!("expected shape {:?}, got {:?}", expected, obs.dim()),
            ));
        }
        let bounds = [
            ("lower", lower.as_ref().map(|b| b.view())),
            ("upper", upper.as_ref().map(|b| b.view())),
        ];
        for (name, bound) in bounds {
            if let Some(b) = bound {
                if b.dim() != obs.dim() {
                    return Err(FilterError::malformed(
                        name,
                        format!("shape {:?} does not match obs {:?}", b.dim(), obs.dim()),
                    ));
                }
                if b.iter().any(|v| v.is_nan()) {
                    return Err(FilterError::NanInBounds {
                        argument: name.to_string(),
                    });
                }
            }
        }
        if (lower.is_some() || upper.is_some()) && !self.family.supports_bounds() {
            return Err(FilterError::UnsupportedBounds {
                operation: format!("update of a {} belief", self.family),
            });
        }

        let mut next = self.clone();
        let mut summary = UpdateSummary::default();

        let partitions = partition_by(0..self.num_groups(), |&g| which_valid(obs.row(g)));
        summary.num_partitions = partitions.len();

        for (valid, groups) in partitions {
            if valid.is_empty() {
                for &g in &groups {
                    next.last_measured[g] += 1;
                }
                summary.missing.extend(groups);
                continue;
            }
            log::trace!(
                "update partition: measures {:?}, {} groups",
                valid.as_slice(),
                groups.len()
            );

            for &g in &groups {
                let h = select_rows(step.h.get(g), &valid);
                let r = select_square(step.r.get(g), &valid);
                let y = select_elements(obs.row(g), &valid);
                let measured_mean = &h * &self.means[g];

                let measured = match self.family {
                    BeliefFamily::Gaussian => MeasuredMoments::plain(measured_mean, &r),
                    BeliefFamily::CensoredGaussian => {
                        let lo = lower.map(|b| select_elements(b.row(g), &valid));
                        let up = upper.map(|b| select_elements(b.row(g), &valid));
                        MeasuredMoments::censored(&measured_mean, &r, lo.as_ref(), up.as_ref())
                    }
                };

                let (mean, cov) = update_moments(&self.means[g], &self.covs[g], &h, &y, &measured)?;
                next.means[g] = mean;
                next.covs[g] = cov;
                next.last_measured[g] = 0;
            }
            summary.updated.extend(groups);
        }

        summary.updated.sort_unstable();
        summary.missing.sort_unstable();
        next.check_covariances("update")?;
        Ok((next, summary))
    }

    /// Update from timestep `t` of a filter input
    pub fn update_from_input(
        &self,
        input: &FilterInput,
        t: usize,
        step: &DesignStep,
    ) -> Result<Self, FilterError> {
        self.update_from_input_with_summary(input, t, step)
            .map(|(belief, _)| belief)
    }

    /// [`StateBelief::update_from_input`], also reporting which groups were updated
    pub fn update_from_input_with_summary(
        &self,
        input: &FilterInput,
        t: usize,
        step: &DesignStep,
    ) -> Result<(Self, UpdateSummary), FilterError> {
        self.update_with_summary(step, input.obs_at(t)?, input.lower_at(t)?, input.upper_at(t)?)
    }

    /// Draw one latent state per group, shape `(groups, states)`
    ///
    /// Censored sampling is not implemented, so any bound is rejected.
    pub fn sample_transition<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        lower: Option<ArrayView2<'_, f64>>,
        upper: Option<ArrayView2<'_, f64>>,
    ) -> Result<Array2<f64>, FilterError> {
        if lower.is_some() || upper.is_some() {
            return Err(FilterError::UnsupportedBounds {
                operation: "sample_transition".to_string(),
            });
        }
        let n = self.num_states();
        let mut out = Array2::zeros((self.num_groups(), n));
        for (g, (m, p)) in self.means.iter().zip(&self.covs).enumerate() {
            let eps: DVector<f64> = DVector::from_fn(n, |_, _| StandardNormal.sample(rng));
            let draw = m + psd_sqrt(&symmetrize(p)) * eps;
            for i in 0..n {
                out[(g, i)] = draw[i];
            }
        }
        Ok(out)
    }
}

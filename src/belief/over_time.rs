//! Beliefs over a whole series and their log-likelihood
//!
//! [`BeliefOverTime`] keeps the predicted (pre-update) belief of every
//! timestep together with the design that produced them. Observed series are
//! scored against these one-step-ahead predictions with one of two methods:
//!
//! - [`LikelihoodMethod::Update`] rebuilds the censored measurement
//!   distribution exactly as the update does and evaluates its multivariate
//!   normal log-density.
//! - [`LikelihoodMethod::Independent`] scores each measure against its
//!   marginal predictive distribution and sums the log-densities. Censored
//!   elements, recognised by equality with their bound, contribute the tail
//!   probability beyond that bound.

use std::fmt;
use std::str::FromStr;

use nalgebra::{DMatrix, DVector};
use ndarray::{s, Array2, Array3, Array4, ArrayView2};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::Serialize;

use super::{BeliefFamily, StateBelief};
use crate::common::indexing::{
    pair_indices, partition_by, select_rows, select_square, which_valid, Selector,
};
use crate::common::linalg::{
    clamp_z, log_gaussian_pdf, psd_sqrt, std_normal_cdf, std_normal_ln_pdf, symmetrize,
};
use crate::components::update::MeasuredMoments;
use crate::design::Design;
use crate::filter::errors::FilterError;
use crate::input::FilterInput;

/// Log-likelihood algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LikelihoodMethod {
    /// Exact joint density of the censored measurement distribution
    Update,
    /// Product of per-measure marginal densities
    #[default]
    Independent,
}

impl FromStr for LikelihoodMethod {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "update" => Ok(LikelihoodMethod::Update),
            "independent" => Ok(LikelihoodMethod::Independent),
            _ => Err(FilterError::UnknownMethod {
                method: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for LikelihoodMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LikelihoodMethod::Update => write!(f, "update"),
            LikelihoodMethod::Independent => write!(f, "independent"),
        }
    }
}

/// Predicted beliefs for every timestep of a run
#[derive(Debug, Clone)]
pub struct BeliefOverTime {
    beliefs: Vec<StateBelief>,
    filtered: Vec<StateBelief>,
    design: Design,
}

impl BeliefOverTime {
    /// Concatenate per-timestep predicted beliefs
    ///
    /// All beliefs must share family, group count and state dimension, and
    /// the design must cover every timestep.
    pub fn concatenate(beliefs: Vec<StateBelief>, design: Design) -> Result<Self, FilterError> {
        let first = beliefs
            .first()
            .ok_or_else(|| FilterError::malformed("beliefs", "need at least one timestep"))?;
        let (family, groups, states) = (first.family(), first.num_groups(), first.num_states());

        for (t, b) in beliefs.iter().enumerate() {
            if b.family() != family {
                return Err(FilterError::malformed(
                    "beliefs",
                    format!("timestep {} is {}, expected {}", t, b.family(), family),
                ));
            }
            if b.num_groups() != groups {
                return Err(FilterError::dimension(
                    groups,
                    b.num_groups(),
                    format!("groups at timestep {}", t),
                ));
            }
            if b.num_states() != states {
                return Err(FilterError::dimension(
                    states,
                    b.num_states(),
                    format!("states at timestep {}", t),
                ));
            }
        }
        if design.num_states() != states {
            return Err(FilterError::dimension(
                states,
                design.num_states(),
                "design state dimension",
            ));
        }
        design.validate_for(groups, beliefs.len())?;

        Ok(Self {
            beliefs,
            filtered: Vec::new(),
            design,
        })
    }

    /// Attach the post-update belief of every timestep
    pub fn with_filtered(mut self, filtered: Vec<StateBelief>) -> Result<Self, FilterError> {
        if filtered.len() != self.beliefs.len() {
            return Err(FilterError::dimension(
                self.beliefs.len(),
                filtered.len(),
                "filtered beliefs",
            ));
        }
        self.filtered = filtered;
        Ok(self)
    }

    /// Predicted belief per timestep
    pub fn beliefs(&self) -> &[StateBelief] {
        &self.beliefs
    }

    /// Filtered belief per timestep (empty unless attached)
    pub fn filtered(&self) -> &[StateBelief] {
        &self.filtered
    }

    /// Design the beliefs were produced with
    pub fn design(&self) -> &Design {
        &self.design
    }

    /// Belief family
    pub fn family(&self) -> BeliefFamily {
        self.beliefs[0].family()
    }

    /// Number of groups
    pub fn num_groups(&self) -> usize {
        self.beliefs[0].num_groups()
    }

    /// Number of timesteps
    pub fn num_timesteps(&self) -> usize {
        self.beliefs.len()
    }

    /// Predicted state means, `(groups, time, states)`
    pub fn means(&self) -> Array3<f64> {
        let n = self.design.num_states();
        Array3::from_shape_fn((self.num_groups(), self.num_timesteps(), n), |(g, t, i)| {
            self.beliefs[t].means()[g][i]
        })
    }

    /// Predicted state covariances, `(groups, time, states, states)`
    pub fn covs(&self) -> Array4<f64> {
        let n = self.design.num_states();
        Array4::from_shape_fn(
            (self.num_groups(), self.num_timesteps(), n, n),
            |(g, t, i, j)| self.beliefs[t].covs()[g][(i, j)],
        )
    }

    /// Predicted measurements `H μ`, `(groups, time, measures)`
    pub fn predictions(&self) -> Result<Array3<f64>, FilterError> {
        let m = self.design.num_measures();
        let mut out = Array3::zeros((self.num_groups(), self.num_timesteps(), m));
        for (t, belief) in self.beliefs.iter().enumerate() {
            let step = self.design.step(t)?;
            for (g, mean) in belief.means().iter().enumerate() {
                let pred = step.h.get(g) * mean;
                for k in 0..m {
                    out[(g, t, k)] = pred[k];
                }
            }
        }
        Ok(out)
    }

    /// Predicted measurement covariance `H P Hᵀ + R`, `(groups, time, measures, measures)`
    pub fn prediction_uncertainty(&self) -> Result<Array4<f64>, FilterError> {
        let m = self.design.num_measures();
        let mut out = Array4::zeros((self.num_groups(), self.num_timesteps(), m, m));
        for (t, belief) in self.beliefs.iter().enumerate() {
            let step = self.design.step(t)?;
            for (g, cov) in belief.covs().iter().enumerate() {
                let h = step.h.get(g);
                let s = h * cov * h.transpose() + step.r.get(g);
                for i in 0..m {
                    for j in 0..m {
                        out[(g, t, i, j)] = s[(i, j)];
                    }
                }
            }
        }
        Ok(out)
    }

    /// Log-likelihood of every `(group, time)` cell
    ///
    /// Cells whose observation is entirely missing contribute `0.0`.
    ///
    /// # Errors
    /// - [`FilterError::BoundViolation`] if an observation lies outside its
    ///   own bound; nothing else is computed in that case
    /// - [`FilterError::SingularMatrix`] if a predictive covariance is not
    ///   positive definite
    pub fn log_prob(
        &self,
        input: &FilterInput,
        method: LikelihoodMethod,
    ) -> Result<Array2<f64>, FilterError> {
        self.check_input(input)?;

        let (groups, times, _) = input.get_input_dim();
        let obs = input.obs();
        let cells = (0..groups).flat_map(|g| (0..times).map(move |t| (g, t)));
        let partitions = partition_by(cells, |&(g, t)| which_valid(obs.slice(s![g, t, ..])));
        log::debug!(
            "log_prob ({}): {} cells in {} missingness partitions",
            method,
            groups * times,
            partitions.len()
        );

        let mut out = Array2::zeros((groups, times));
        for (valid, cells) in partitions {
            if valid.is_empty() {
                continue;
            }
            let values = self.log_prob_cells(input, &cells, &valid, method)?;
            for (&(g, t), v) in cells.iter().zip(values) {
                out[(g, t)] = v;
            }
        }
        Ok(out)
    }

    /// Sum of [`BeliefOverTime::log_prob`] over all cells
    pub fn total_log_prob(
        &self,
        input: &FilterInput,
        method: LikelihoodMethod,
    ) -> Result<f64, FilterError> {
        Ok(self.log_prob(input, method)?.sum())
    }

    /// Log-likelihood of selected cells restricted to selected measures
    ///
    /// Explicit group and time indices are paired elementwise; selecting all
    /// of either axis takes the cartesian product. Every selected observation
    /// must be present.
    pub fn log_prob_with_subsetting(
        &self,
        input: &FilterInput,
        group_idx: &Selector,
        time_idx: &Selector,
        measure_idx: &Selector,
        method: LikelihoodMethod,
    ) -> Result<Vec<f64>, FilterError> {
        self.check_input(input)?;
        let (groups, times, measures) = input.get_input_dim();
        let cells = pair_indices(group_idx, time_idx, groups, times)?;
        let measures = measure_idx.resolve(measures, "measure index")?;

        let obs = input.obs();
        for &(g, t) in &cells {
            if let Some(&m) = measures.iter().find(|&&m| obs[(g, t, m)].is_nan()) {
                return Err(FilterError::malformed(
                    "obs",
                    format!("selected observation at ({}, {}, {}) is missing", g, t, m),
                ));
            }
        }
        self.log_prob_cells(input, &cells, &measures, method)
    }

    /// Draw measurements from the predictive distribution, `(groups, time, measures)`
    ///
    /// Censored sampling is not implemented, so any bound is rejected.
    pub fn sample_measurements<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        lower: Option<ArrayView2<'_, f64>>,
        upper: Option<ArrayView2<'_, f64>>,
    ) -> Result<Array3<f64>, FilterError> {
        if lower.is_some() || upper.is_some() {
            return Err(FilterError::UnsupportedBounds {
                operation: "sample_measurements".to_string(),
            });
        }
        let means = self.predictions()?;
        let covs = self.prediction_uncertainty()?;
        let (groups, times, m) = means.dim();

        let mut out = Array3::zeros((groups, times, m));
        for g in 0..groups {
            for t in 0..times {
                let s = DMatrix::from_fn(m, m, |i, j| covs[(g, t, i, j)]);
                let eps: DVector<f64> = DVector::from_fn(m, |_, _| StandardNormal.sample(rng));
                let noise = psd_sqrt(&symmetrize(&s)) * eps;
                for k in 0..m {
                    out[(g, t, k)] = means[(g, t, k)] + noise[k];
                }
            }
        }
        Ok(out)
    }

    fn check_input(&self, input: &FilterInput) -> Result<(), FilterError> {
        let expected = (
            self.num_groups(),
            self.num_timesteps(),
            self.design.num_measures(),
        );
        if input.get_input_dim() != expected {
            return Err(FilterError::malformed(
                "obs",
                format!(
                    "expected shape {:?}, got {:?}",
                    expected,
                    input.get_input_dim()
                ),
            ));
        }
        if input.has_bounds() && !self.family().supports_bounds() {
            return Err(FilterError::UnsupportedBounds {
                operation: format!("log_prob of a {} belief", self.family()),
            });
        }
        input.check_within_bounds()
    }

    fn log_prob_cells(
        &self,
        input: &FilterInput,
        cells: &[(usize, usize)],
        measures: &[usize],
        method: LikelihoodMethod,
    ) -> Result<Vec<f64>, FilterError> {
        cells
            .iter()
            .map(|&(g, t)| {
                let cell = Cell::gather(self, input, g, t, measures)?;
                match method {
                    LikelihoodMethod::Update => cell.log_prob_update(),
                    LikelihoodMethod::Independent => Ok(cell.log_prob_independent()),
                }
            })
            .collect()
    }
}

/// One `(group, time)` cell restricted to a set of measures
struct Cell<'a> {
    mean: &'a DVector<f64>,
    cov: &'a DMatrix<f64>,
    h: DMatrix<f64>,
    r: DMatrix<f64>,
    obs: DVector<f64>,
    lower: Option<DVector<f64>>,
    upper: Option<DVector<f64>>,
}

impl<'a> Cell<'a> {
    fn gather(
        over_time: &'a BeliefOverTime,
        input: &FilterInput,
        g: usize,
        t: usize,
        measures: &[usize],
    ) -> Result<Self, FilterError> {
        let step = over_time.design.step(t)?;
        let belief = &over_time.beliefs[t];
        let pick = |cube: &Array3<f64>| {
            DVector::from_iterator(measures.len(), measures.iter().map(|&m| cube[(g, t, m)]))
        };
        Ok(Self {
            mean: &belief.means()[g],
            cov: &belief.covs()[g],
            h: select_rows(step.h.get(g), measures),
            r: select_square(step.r.get(g), measures),
            obs: pick(input.obs()),
            lower: input.lower().map(pick),
            upper: input.upper().map(pick),
        })
    }

    fn log_prob_update(&self) -> Result<f64, FilterError> {
        let measured_mean = &self.h * self.mean;
        let measured = MeasuredMoments::censored(
            &measured_mean,
            &self.r,
            self.lower.as_ref(),
            self.upper.as_ref(),
        );
        let system = symmetrize(&measured.system_uncertainty(&self.h, self.cov));
        log_gaussian_pdf(&self.obs, &measured.mean, &system)
    }

    fn log_prob_independent(&self) -> f64 {
        let pred_mean = &self.h * self.mean;
        let pred_cov = &self.h * self.cov * self.h.transpose() + &self.r;

        (0..self.obs.len())
            .map(|k| {
                let y = self.obs[k];
                let std = pred_cov[(k, k)].sqrt();
                let z = (pred_mean[k] - y) / std;
                let at_lower = self.lower.as_ref().map_or(false, |b| b[k] == y);
                let at_upper = self.upper.as_ref().map_or(false, |b| b[k] == y);

                if at_lower {
                    // P(x ≤ y)
                    std_normal_cdf(-clamp_z(z)).ln()
                } else if at_upper {
                    // P(x ≥ y)
                    std_normal_cdf(clamp_z(z)).ln()
                } else {
                    std_normal_ln_pdf(z) - std.ln()
                }
            })
            .sum()
    }
}

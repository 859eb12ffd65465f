//! Filter input: observations with optional censoring bounds
//!
//! Observations are a `(groups, time, measures)` cube where NaN marks a
//! missing element. Optional `lower` / `upper` cubes of identical shape give
//! per-element censoring bounds; an infinite bound is the same as no bound.
//! Bounds are validated once here so the update and likelihood paths can
//! assume they are well-formed.

use ndarray::{Array3, ArrayView2, Axis, Zip};

use crate::filter::errors::FilterError;

/// Observations plus optional lower/upper censoring bounds
#[derive(Debug, Clone, PartialEq)]
pub struct FilterInput {
    obs: Array3<f64>,
    lower: Option<Array3<f64>>,
    upper: Option<Array3<f64>>,
}

impl FilterInput {
    /// Create an input, validating bound shapes and contents
    ///
    /// # Errors
    /// - [`FilterError::MalformedInput`] if a bound's shape differs from `obs`
    /// - [`FilterError::NanInBounds`] if a bound contains NaN
    /// - [`FilterError::InvalidBounds`] if `lower > upper` anywhere
    pub fn new(
        obs: Array3<f64>,
        lower: Option<Array3<f64>>,
        upper: Option<Array3<f64>>,
    ) -> Result<Self, FilterError> {
        for (name, bound) in [("lower", &lower), ("upper", &upper)] {
            if let Some(b) = bound {
                if b.shape() != obs.shape() {
                    return Err(FilterError::malformed(
                        name,
                        format!(
                            "shape {:?} does not match observations {:?}",
                            b.shape(),
                            obs.shape()
                        ),
                    ));
                }
                if b.iter().any(|v| v.is_nan()) {
                    return Err(FilterError::NanInBounds {
                        argument: name.to_string(),
                    });
                }
            }
        }

        if let (Some(lo), Some(up)) = (&lower, &upper) {
            for ((g, t, m), &l) in lo.indexed_iter() {
                let u = up[(g, t, m)];
                if l > u {
                    return Err(FilterError::InvalidBounds {
                        group: g,
                        time: t,
                        measure: m,
                        lower: l,
                        upper: u,
                    });
                }
            }
        }

        Ok(Self { obs, lower, upper })
    }

    /// Input without censoring bounds
    pub fn observations(obs: Array3<f64>) -> Self {
        Self {
            obs,
            lower: None,
            upper: None,
        }
    }

    /// `(groups, time, measures)`
    pub fn get_input_dim(&self) -> (usize, usize, usize) {
        self.obs.dim()
    }

    /// Number of groups
    #[inline]
    pub fn num_groups(&self) -> usize {
        self.obs.dim().0
    }

    /// Number of timesteps
    #[inline]
    pub fn num_timesteps(&self) -> usize {
        self.obs.dim().1
    }

    /// Number of measures
    #[inline]
    pub fn num_measures(&self) -> usize {
        self.obs.dim().2
    }

    /// True when either bound is present
    #[inline]
    pub fn has_bounds(&self) -> bool {
        self.lower.is_some() || self.upper.is_some()
    }

    /// Full observation cube
    pub fn obs(&self) -> &Array3<f64> {
        &self.obs
    }

    /// Full lower-bound cube, if any
    pub fn lower(&self) -> Option<&Array3<f64>> {
        self.lower.as_ref()
    }

    /// Full upper-bound cube, if any
    pub fn upper(&self) -> Option<&Array3<f64>> {
        self.upper.as_ref()
    }

    /// Observations at timestep `t`, shape `(groups, measures)`
    pub fn obs_at(&self, t: usize) -> Result<ArrayView2<'_, f64>, FilterError> {
        self.check_time(t)?;
        Ok(self.obs.index_axis(Axis(1), t))
    }

    /// Lower bounds at timestep `t`
    pub fn lower_at(&self, t: usize) -> Result<Option<ArrayView2<'_, f64>>, FilterError> {
        self.check_time(t)?;
        Ok(self.lower.as_ref().map(|b| b.index_axis(Axis(1), t)))
    }

    /// Upper bounds at timestep `t`
    pub fn upper_at(&self, t: usize) -> Result<Option<ArrayView2<'_, f64>>, FilterError> {
        self.check_time(t)?;
        Ok(self.upper.as_ref().map(|b| b.index_axis(Axis(1), t)))
    }

    fn check_time(&self, t: usize) -> Result<(), FilterError> {
        if t >= self.num_timesteps() {
            return Err(FilterError::IndexOutOfRange {
                context: "input timestep".to_string(),
                index: t,
                len: self.num_timesteps(),
            });
        }
        Ok(())
    }

    /// Verify every observed value satisfies `lower ≤ obs ≤ upper`
    ///
    /// Missing (NaN) observations are skipped. The first violation found is
    /// returned.
    pub fn check_within_bounds(&self) -> Result<(), FilterError> {
        let violation = |argument: &str, (g, t, m): (usize, usize, usize), value: f64, bound: f64| {
            FilterError::BoundViolation {
                argument: argument.to_string(),
                group: g,
                time: t,
                measure: m,
                value,
                bound,
            }
        };

        if let Some(lower) = &self.lower {
            let mut found = None;
            Zip::indexed(&self.obs).and(lower).for_each(|idx, &y, &l| {
                if found.is_none() && !y.is_nan() && y < l {
                    found = Some(violation("lower", idx, y, l));
                }
            });
            if let Some(err) = found {
                return Err(err);
            }
        }
        if let Some(upper) = &self.upper {
            let mut found = None;
            Zip::indexed(&self.obs).and(upper).for_each(|idx, &y, &u| {
                if found.is_none() && !y.is_nan() && y > u {
                    found = Some(violation("upper", idx, y, u));
                }
            });
            if let Some(err) = found {
                return Err(err);
            }
        }
        Ok(())
    }
}

impl From<Array3<f64>> for FilterInput {
    fn from(obs: Array3<f64>) -> Self {
        Self::observations(obs)
    }
}

impl TryFrom<(Array3<f64>, Option<Array3<f64>>, Option<Array3<f64>>)> for FilterInput {
    type Error = FilterError;

    fn try_from(
        (obs, lower, upper): (Array3<f64>, Option<Array3<f64>>, Option<Array3<f64>>),
    ) -> Result<Self, Self::Error> {
        Self::new(obs, lower, upper)
    }
}

//! State-space design consumed by the belief engine
//!
//! A [`Design`] supplies, per timestep, the transition `F`, process noise
//! `Q`, measurement matrix `H` and measurement noise `R`. Each matrix is
//! either shared by all groups or given per group ([`Batched`]), and the
//! design is either time-invariant or time-varying. Shapes are validated
//! once at construction and the design is immutable afterwards.

use nalgebra::DMatrix;
use serde::Serialize;

use crate::common::linalg::check_psd;
use crate::filter::errors::FilterError;

/// Tolerance used when validating that `Q` and `R` are PSD
const DESIGN_PSD_TOLERANCE: f64 = 1e-8;

/// A value shared by every group, or one value per group
#[derive(Debug, Clone, PartialEq)]
pub enum Batched<T> {
    /// Same value for all groups
    Shared(T),
    /// One value per group, indexed by group
    PerGroup(Vec<T>),
}

impl<T> Batched<T> {
    /// Value for `group`
    ///
    /// The group index must be below [`Batched::num_groups`] when per-group;
    /// [`Design`] validates this before any filtering starts.
    #[inline]
    pub fn get(&self, group: usize) -> &T {
        match self {
            Batched::Shared(v) => v,
            Batched::PerGroup(vs) => &vs[group],
        }
    }

    /// Number of groups if per-group, `None` if shared
    pub fn num_groups(&self) -> Option<usize> {
        match self {
            Batched::Shared(_) => None,
            Batched::PerGroup(vs) => Some(vs.len()),
        }
    }

    /// Iterate over the distinct stored values
    pub fn values(&self) -> impl Iterator<Item = &T> {
        let slice: &[T] = match self {
            Batched::Shared(v) => std::slice::from_ref(v),
            Batched::PerGroup(vs) => vs.as_slice(),
        };
        slice.iter()
    }

    /// True when all groups share a single value
    #[inline]
    pub fn is_shared(&self) -> bool {
        matches!(self, Batched::Shared(_))
    }
}

impl<T> From<T> for Batched<T> {
    fn from(v: T) -> Self {
        Batched::Shared(v)
    }
}

/// Design matrices for one timestep
#[derive(Debug, Clone, PartialEq)]
pub struct DesignStep {
    /// Transition matrix `F` (state × state)
    pub f: Batched<DMatrix<f64>>,
    /// Process noise `Q` (state × state)
    pub q: Batched<DMatrix<f64>>,
    /// Measurement matrix `H` (measure × state)
    pub h: Batched<DMatrix<f64>>,
    /// Measurement noise `R` (measure × measure)
    pub r: Batched<DMatrix<f64>>,
}

impl DesignStep {
    /// Create a design step from batched matrices
    pub fn new(
        f: Batched<DMatrix<f64>>,
        q: Batched<DMatrix<f64>>,
        h: Batched<DMatrix<f64>>,
        r: Batched<DMatrix<f64>>,
    ) -> Self {
        Self { f, q, h, r }
    }

    /// Create a design step where every group shares the same matrices
    pub fn shared(f: DMatrix<f64>, q: DMatrix<f64>, h: DMatrix<f64>, r: DMatrix<f64>) -> Self {
        Self::new(f.into(), q.into(), h.into(), r.into())
    }

    /// Latent state dimension
    pub fn num_states(&self) -> usize {
        self.f.get(0).nrows()
    }

    /// Measurement dimension
    pub fn num_measures(&self) -> usize {
        self.h.get(0).nrows()
    }

    /// Check per-group matrices cover exactly `num_groups` groups
    pub fn check_groups(&self, num_groups: usize) -> Result<(), FilterError> {
        match self.num_groups()? {
            Some(g) if g != num_groups => Err(FilterError::dimension(
                g,
                num_groups,
                "per-group design matrices",
            )),
            _ => Ok(()),
        }
    }

    fn num_groups(&self) -> Result<Option<usize>, FilterError> {
        let mut found: Option<usize> = None;
        for n in [
            self.f.num_groups(),
            self.q.num_groups(),
            self.h.num_groups(),
            self.r.num_groups(),
        ]
        .into_iter()
        .flatten()
        {
            match found {
                Some(prev) if prev != n => {
                    return Err(FilterError::dimension(prev, n, "per-group design matrices"))
                }
                _ => found = Some(n),
            }
        }
        Ok(found)
    }

    /// Check every matrix has the shape implied by `n` states and `m` measures
    ///
    /// Also rejects non-finite entries. Cheap enough to run on every step.
    pub fn check_shapes(&self, n: usize, m: usize) -> Result<(), FilterError> {
        self.check_shapes_at(n, m, None)
    }

    fn check_shapes_at(&self, n: usize, m: usize, t: Option<usize>) -> Result<(), FilterError> {
        let at = |name: &str| at_timestep(name, t);
        let check_shape = |name: &str,
                           mats: &Batched<DMatrix<f64>>,
                           rows: usize,
                           cols: usize|
         -> Result<(), FilterError> {
            for mat in mats.values() {
                if mat.nrows() != rows {
                    return Err(FilterError::dimension(rows, mat.nrows(), at(name) + " rows"));
                }
                if mat.ncols() != cols {
                    return Err(FilterError::dimension(cols, mat.ncols(), at(name) + " cols"));
                }
                if mat.iter().any(|v| !v.is_finite()) {
                    return Err(FilterError::malformed(name, format!("{} must be finite", at(name))));
                }
            }
            Ok(())
        };

        check_shape("F", &self.f, n, n)?;
        check_shape("Q", &self.q, n, n)?;
        check_shape("H", &self.h, m, n)?;
        check_shape("R", &self.r, m, m)
    }

    fn validate(&self, n: usize, m: usize, t: Option<usize>) -> Result<(), FilterError> {
        let at = |name: &str| at_timestep(name, t);
        self.check_shapes_at(n, m, t)?;

        for q in self.q.values() {
            check_psd(q, DESIGN_PSD_TOLERANCE, &at("Q"))?;
        }
        for r in self.r.values() {
            check_psd(r, DESIGN_PSD_TOLERANCE, &at("R"))?;
        }
        self.num_groups()?;
        Ok(())
    }
}

fn at_timestep(name: &str, t: Option<usize>) -> String {
    match t {
        Some(t) => format!("{} at timestep {}", name, t),
        None => name.to_string(),
    }
}

/// Which latent states each measure observes
///
/// `links[measure]` lists the state indices that load onto that measure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeasureMap {
    num_states: usize,
    links: Vec<Vec<usize>>,
}

impl MeasureMap {
    /// Create a measure-state mapping
    pub fn new(num_states: usize, links: Vec<Vec<usize>>) -> Result<Self, FilterError> {
        for (measure, states) in links.iter().enumerate() {
            if let Some(&bad) = states.iter().find(|&&s| s >= num_states) {
                return Err(FilterError::IndexOutOfRange {
                    context: format!("state linked to measure {}", measure),
                    index: bad,
                    len: num_states,
                });
            }
        }
        Ok(Self { num_states, links })
    }

    /// Recover the mapping from the non-zero entries of a measurement matrix
    pub fn from_measurement_matrix(h: &DMatrix<f64>) -> Self {
        let links = (0..h.nrows())
            .map(|i| (0..h.ncols()).filter(|&j| h[(i, j)] != 0.0).collect())
            .collect();
        Self {
            num_states: h.ncols(),
            links,
        }
    }

    /// Measurement matrix with unit loadings on the linked states
    pub fn measurement_matrix(&self) -> DMatrix<f64> {
        let mut h = DMatrix::zeros(self.links.len(), self.num_states);
        for (i, states) in self.links.iter().enumerate() {
            for &j in states {
                h[(i, j)] = 1.0;
            }
        }
        h
    }

    /// State indices observed by `measure`
    pub fn states_for(&self, measure: usize) -> &[usize] {
        self.links.get(measure).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of measures
    #[inline]
    pub fn num_measures(&self) -> usize {
        self.links.len()
    }

    /// Number of latent states
    #[inline]
    pub fn num_states(&self) -> usize {
        self.num_states
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Steps {
    Constant(DesignStep),
    TimeVarying(Vec<DesignStep>),
}

/// Validated state-space design
#[derive(Debug, Clone, PartialEq)]
pub struct Design {
    steps: Steps,
    num_states: usize,
    num_measures: usize,
    num_groups: Option<usize>,
    measure_map: MeasureMap,
}

impl Design {
    /// Time-invariant design
    pub fn new(step: DesignStep) -> Result<Self, FilterError> {
        Self::build(Steps::Constant(step))
    }

    /// Time-varying design, one step per timestep
    pub fn time_varying(steps: Vec<DesignStep>) -> Result<Self, FilterError> {
        if steps.is_empty() {
            return Err(FilterError::malformed(
                "steps",
                "time-varying design needs at least one step",
            ));
        }
        Self::build(Steps::TimeVarying(steps))
    }

    /// Time-invariant design whose `H` is built from a measure-state mapping
    pub fn from_measure_map(
        f: DMatrix<f64>,
        q: DMatrix<f64>,
        measure_map: MeasureMap,
        r: DMatrix<f64>,
    ) -> Result<Self, FilterError> {
        let h = measure_map.measurement_matrix();
        let mut design = Self::new(DesignStep::shared(f, q, h, r))?;
        design.measure_map = measure_map;
        Ok(design)
    }

    fn build(steps: Steps) -> Result<Self, FilterError> {
        let first = match &steps {
            Steps::Constant(s) => s,
            Steps::TimeVarying(v) => &v[0],
        };
        if first.f.values().next().is_none() || first.h.values().next().is_none() {
            return Err(FilterError::malformed("design", "per-group matrices are empty"));
        }
        let n = first.num_states();
        let m = first.num_measures();
        if n == 0 {
            return Err(FilterError::malformed("F", "state dimension must be > 0"));
        }
        if m == 0 {
            return Err(FilterError::malformed("H", "measure dimension must be > 0"));
        }

        let mut num_groups = None;
        let all: Vec<(Option<usize>, &DesignStep)> = match &steps {
            Steps::Constant(s) => vec![(None, s)],
            Steps::TimeVarying(v) => v.iter().enumerate().map(|(t, s)| (Some(t), s)).collect(),
        };
        for (t, step) in all {
            step.validate(n, m, t)?;
            match (num_groups, step.num_groups()?) {
                (Some(prev), Some(g)) if prev != g => {
                    return Err(FilterError::dimension(prev, g, "per-group design matrices"))
                }
                (None, Some(g)) => num_groups = Some(g),
                _ => {}
            }
        }

        let measure_map = MeasureMap::from_measurement_matrix(first.h.get(0));
        Ok(Self {
            steps,
            num_states: n,
            num_measures: m,
            num_groups,
            measure_map,
        })
    }

    /// Design matrices for timestep `t`
    pub fn step(&self, t: usize) -> Result<&DesignStep, FilterError> {
        match &self.steps {
            Steps::Constant(s) => Ok(s),
            Steps::TimeVarying(v) => v.get(t).ok_or(FilterError::IndexOutOfRange {
                context: "design timestep".to_string(),
                index: t,
                len: v.len(),
            }),
        }
    }

    /// Latent state dimension
    #[inline]
    pub fn num_states(&self) -> usize {
        self.num_states
    }

    /// Measurement dimension
    #[inline]
    pub fn num_measures(&self) -> usize {
        self.num_measures
    }

    /// Number of groups if any matrix is given per group
    #[inline]
    pub fn num_groups(&self) -> Option<usize> {
        self.num_groups
    }

    /// Number of timesteps covered if time-varying
    pub fn num_timesteps(&self) -> Option<usize> {
        match &self.steps {
            Steps::Constant(_) => None,
            Steps::TimeVarying(v) => Some(v.len()),
        }
    }

    /// Measure-state mapping
    #[inline]
    pub fn measure_map(&self) -> &MeasureMap {
        &self.measure_map
    }

    /// Check the design can drive `num_groups` groups for `num_timesteps` steps
    pub fn validate_for(&self, num_groups: usize, num_timesteps: usize) -> Result<(), FilterError> {
        if let Some(g) = self.num_groups {
            if g != num_groups {
                return Err(FilterError::dimension(g, num_groups, "number of groups"));
            }
        }
        if let Some(t) = self.num_timesteps() {
            if t < num_timesteps {
                return Err(FilterError::dimension(t, num_timesteps, "design timesteps"));
            }
        }
        Ok(())
    }

    /// Serializable summary for debugging
    pub fn snapshot(&self) -> DesignSnapshot {
        DesignSnapshot {
            num_states: self.num_states,
            num_measures: self.num_measures,
            num_groups: self.num_groups,
            num_timesteps: self.num_timesteps(),
            measure_map: self.measure_map.clone(),
        }
    }
}

/// Snapshot of a design's structure
#[derive(Debug, Clone, Serialize)]
pub struct DesignSnapshot {
    /// Latent state dimension
    pub num_states: usize,
    /// Measurement dimension
    pub num_measures: usize,
    /// Per-group count, if any matrix is per group
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_groups: Option<usize>,
    /// Number of steps, if time-varying
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_timesteps: Option<usize>,
    /// Measure-state mapping
    pub measure_map: MeasureMap,
}

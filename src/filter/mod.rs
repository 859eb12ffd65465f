//! Filter runner, configuration and errors
//!
//! - [`KalmanFilter`] - Runs predict/update over a series and scores it
//! - [`FilterConfig`] - Belief family, likelihood method, PSD check
//! - [`FilterError`] - Error type returned by every fallible operation

pub mod config;
pub mod errors;

pub use config::{FilterConfig, FilterConfigBuilder};
pub use errors::FilterError;

use ndarray::Array2;

use crate::belief::{BeliefOverTime, StateBelief};
use crate::design::Design;
use crate::input::FilterInput;
use crate::reporter::{NoOpReporter, StepReporter};

/// Default tolerance for the covariance PSD check
pub const DEFAULT_PSD_TOLERANCE: f64 = 1e-8;

/// Kalman filter over batched groups with optional censoring
///
/// Holds an immutable [`Design`] and a [`FilterConfig`]. Each run starts from
/// a prior [`StateBelief`] and returns the predicted belief of every timestep
/// as a [`BeliefOverTime`].
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    design: Design,
    config: FilterConfig,
}

impl KalmanFilter {
    /// Create a filter from a design and configuration
    pub fn new(design: Design, config: FilterConfig) -> Self {
        Self { design, config }
    }

    /// Create a filter with the default configuration
    pub fn with_defaults(design: Design) -> Self {
        Self::new(design, FilterConfig::default())
    }

    /// Design used by every run
    pub fn design(&self) -> &Design {
        &self.design
    }

    /// Configuration
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Build a prior belief in the configured family
    pub fn initial_belief(
        &self,
        means: Vec<nalgebra::DVector<f64>>,
        covs: Vec<nalgebra::DMatrix<f64>>,
    ) -> Result<StateBelief, FilterError> {
        Ok(StateBelief::new(self.config.family, means, covs)?
            .with_psd_tolerance(self.config.psd_tolerance))
    }

    /// Run the filter over every timestep of `input`
    pub fn run(
        &self,
        prior: &StateBelief,
        input: &FilterInput,
    ) -> Result<BeliefOverTime, FilterError> {
        self.run_with_reporter(prior, input, &mut NoOpReporter)
    }

    /// [`KalmanFilter::run`] with observability callbacks
    ///
    /// Per timestep: record the predicted belief, update it with that
    /// timestep's observations, then predict the next timestep.
    pub fn run_with_reporter<R: StepReporter + ?Sized>(
        &self,
        prior: &StateBelief,
        input: &FilterInput,
        reporter: &mut R,
    ) -> Result<BeliefOverTime, FilterError> {
        self.check_run(prior, input)?;
        let num_timesteps = input.num_timesteps();
        log::debug!(
            "Running {} filter: {} groups, {} timesteps, {} measures",
            self.config.family,
            input.num_groups(),
            num_timesteps,
            input.num_measures()
        );

        let mut belief = prior.clone().with_psd_tolerance(self.config.psd_tolerance);
        let mut predicted = Vec::with_capacity(num_timesteps);
        let mut filtered = Vec::with_capacity(num_timesteps);

        for t in 0..num_timesteps {
            let step = self.design.step(t)?;
            reporter.on_prediction(t, &belief);
            predicted.push(belief.clone());

            let (updated, summary) = belief.update_from_input_with_summary(input, t, step)?;
            if !summary.missing.is_empty() {
                reporter.on_missing(t, &summary.missing);
            }
            reporter.on_update(t, &updated, &summary);
            log::trace!(
                "t={}: {} updated, {} missing",
                t,
                summary.updated.len(),
                summary.missing.len()
            );

            if t + 1 < num_timesteps {
                belief = updated.predict(step)?;
            }
            filtered.push(updated);
        }

        let over_time =
            BeliefOverTime::concatenate(predicted, self.design.clone())?.with_filtered(filtered)?;
        reporter.on_run_complete(&over_time);
        Ok(over_time)
    }

    /// Per-`(group, time)` log-likelihood with the configured method
    pub fn log_prob(
        &self,
        prior: &StateBelief,
        input: &FilterInput,
    ) -> Result<Array2<f64>, FilterError> {
        self.run(prior, input)?
            .log_prob(input, self.config.likelihood_method)
    }

    /// Total log-likelihood with the configured method
    pub fn total_log_prob(
        &self,
        prior: &StateBelief,
        input: &FilterInput,
    ) -> Result<f64, FilterError> {
        Ok(self.log_prob(prior, input)?.sum())
    }

    fn check_run(&self, prior: &StateBelief, input: &FilterInput) -> Result<(), FilterError> {
        if prior.family() != self.config.family {
            return Err(FilterError::malformed(
                "prior",
                format!(
                    "belief family {} does not match configured {}",
                    prior.family(),
                    self.config.family
                ),
            ));
        }
        if prior.num_states() != self.design.num_states() {
            return Err(FilterError::dimension(
                self.design.num_states(),
                prior.num_states(),
                "prior state dimension",
            ));
        }
        let (groups, times, measures) = input.get_input_dim();
        if times == 0 {
            return Err(FilterError::malformed("obs", "need at least one timestep"));
        }
        if groups != prior.num_groups() {
            return Err(FilterError::dimension(prior.num_groups(), groups, "observation groups"));
        }
        if measures != self.design.num_measures() {
            return Err(FilterError::dimension(
                self.design.num_measures(),
                measures,
                "observation measures",
            ));
        }
        self.design.validate_for(groups, times)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belief::BeliefFamily;
    use crate::design::DesignStep;
    use crate::reporter::DebugReporter;
    use nalgebra::{DMatrix, DVector};
    use ndarray::Array3;

    fn scalar(v: f64) -> DMatrix<f64> {
        DMatrix::from_row_slice(1, 1, &[v])
    }

    fn filter(family: BeliefFamily) -> KalmanFilter {
        let design =
            Design::new(DesignStep::shared(scalar(1.0), scalar(0.01), scalar(1.0), scalar(0.1)))
                .unwrap();
        KalmanFilter::new(design, FilterConfig::builder().family(family).build())
    }

    #[test]
    fn test_run_records_one_belief_per_timestep() {
        let kf = filter(BeliefFamily::CensoredGaussian);
        let prior = kf
            .initial_belief(vec![DVector::from_vec(vec![0.0])], vec![scalar(1.0)])
            .unwrap();
        let obs = Array3::from_shape_vec((1, 3, 1), vec![0.5, f64::NAN, 1.2]).unwrap();
        let input = FilterInput::from(obs);

        let mut reporter = DebugReporter::new();
        let over_time = kf.run_with_reporter(&prior, &input, &mut reporter).unwrap();

        assert_eq!(over_time.num_timesteps(), 3);
        assert_eq!(over_time.filtered().len(), 3);
        assert_eq!(over_time.beliefs()[0], prior);
        assert_eq!(reporter.prediction_events().len(), 3);
        assert_eq!(reporter.missing_events(), &[(1, vec![0])]);
        assert_eq!(reporter.completed_runs(), 1);
    }

    #[test]
    fn test_family_mismatch_rejected() {
        let kf = filter(BeliefFamily::Gaussian);
        let prior = StateBelief::from_prior(
            BeliefFamily::CensoredGaussian,
            1,
            DVector::from_vec(vec![0.0]),
            scalar(1.0),
        )
        .unwrap();
        let input = FilterInput::from(Array3::zeros((1, 2, 1)));
        assert!(matches!(
            kf.run(&prior, &input),
            Err(FilterError::MalformedInput { .. })
        ));
    }

    #[test]
    fn test_measure_count_checked() {
        let kf = filter(BeliefFamily::Gaussian);
        let prior = kf
            .initial_belief(vec![DVector::from_vec(vec![0.0])], vec![scalar(1.0)])
            .unwrap();
        let input = FilterInput::from(Array3::zeros((1, 2, 2)));
        assert!(matches!(
            kf.run(&prior, &input),
            Err(FilterError::DimensionMismatch { .. })
        ));
    }
}

//! Filter configuration
//!
//! [`FilterConfig`] selects the belief family, the default likelihood method
//! and the covariance PSD check. Build it directly, through
//! [`FilterConfig::builder`], or take the defaults.

use serde::Serialize;

use crate::belief::{BeliefFamily, LikelihoodMethod};
use crate::filter::errors::FilterError;

/// Configuration for [`KalmanFilter`](super::KalmanFilter)
///
/// # Example
///
/// ```
/// use censored_kalman_filters_rs::{BeliefFamily, FilterConfig, LikelihoodMethod};
///
/// let config = FilterConfig::builder()
///     .family(BeliefFamily::Gaussian)
///     .likelihood_method_str("update")
///     .unwrap()
///     .psd_tolerance(None)
///     .build();
///
/// assert_eq!(config.likelihood_method, LikelihoodMethod::Update);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FilterConfig {
    /// Belief family used for every update
    pub family: BeliefFamily,

    /// Likelihood method used by [`KalmanFilter::log_prob`](super::KalmanFilter::log_prob)
    pub likelihood_method: LikelihoodMethod,

    /// Tolerance for the post-step PSD check on covariances.
    /// `None` disables the check; covariances are symmetrized regardless.
    pub psd_tolerance: Option<f64>,
}

impl FilterConfig {
    /// Create a new configuration.
    pub fn new(
        family: BeliefFamily,
        likelihood_method: LikelihoodMethod,
        psd_tolerance: Option<f64>,
    ) -> Self {
        Self {
            family,
            likelihood_method,
            psd_tolerance,
        }
    }

    /// Create with builder pattern.
    pub fn builder() -> FilterConfigBuilder {
        FilterConfigBuilder::default()
    }

    /// Serialize to JSON string for debugging/comparison.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty JSON string for human reading.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            family: BeliefFamily::default(),
            likelihood_method: LikelihoodMethod::default(),
            psd_tolerance: Some(super::DEFAULT_PSD_TOLERANCE),
        }
    }
}

/// Builder for FilterConfig.
#[derive(Debug, Default)]
pub struct FilterConfigBuilder {
    family: Option<BeliefFamily>,
    likelihood_method: Option<LikelihoodMethod>,
    psd_tolerance: Option<Option<f64>>,
}

impl FilterConfigBuilder {
    /// Set the belief family.
    pub fn family(mut self, family: BeliefFamily) -> Self {
        self.family = Some(family);
        self
    }

    /// Set the likelihood method.
    pub fn likelihood_method(mut self, method: LikelihoodMethod) -> Self {
        self.likelihood_method = Some(method);
        self
    }

    /// Set the likelihood method by name (case-insensitive).
    pub fn likelihood_method_str(self, method: &str) -> Result<Self, FilterError> {
        Ok(self.likelihood_method(method.parse()?))
    }

    /// Set the PSD tolerance; `None` disables the check.
    pub fn psd_tolerance(mut self, tolerance: Option<f64>) -> Self {
        self.psd_tolerance = Some(tolerance);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> FilterConfig {
        let defaults = FilterConfig::default();
        FilterConfig {
            family: self.family.unwrap_or(defaults.family),
            likelihood_method: self.likelihood_method.unwrap_or(defaults.likelihood_method),
            psd_tolerance: self.psd_tolerance.unwrap_or(defaults.psd_tolerance),
        }
    }
}

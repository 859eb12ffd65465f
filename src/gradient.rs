//! Gradients of the log-likelihood with respect to model parameters
//!
//! The caller maps a parameter vector `θ` to a design and prior belief; the
//! objective runs the filter and returns the total log-likelihood. Gradients
//! come from central finite differences over `θ`.
//!
//! The finite-difference closure must return a bare `f64`, so errors raised
//! while evaluating the objective are captured and returned after the
//! differencing pass instead of being replaced by a default value.

use std::cell::RefCell;

use finitediff::FiniteDiff;

use crate::belief::StateBelief;
use crate::design::Design;
use crate::filter::errors::FilterError;
use crate::filter::{FilterConfig, KalmanFilter};
use crate::input::FilterInput;

/// Total log-likelihood of an input as a function of model parameters
pub struct LikelihoodObjective<'a, B> {
    config: FilterConfig,
    input: &'a FilterInput,
    build: B,
}

impl<'a, B> LikelihoodObjective<'a, B>
where
    B: Fn(&[f64]) -> Result<(Design, StateBelief), FilterError>,
{
    /// Create an objective; `build` maps `θ` to `(design, prior)`
    pub fn new(config: FilterConfig, input: &'a FilterInput, build: B) -> Self {
        Self {
            config,
            input,
            build,
        }
    }

    /// Total log-likelihood at `theta`
    pub fn value(&self, theta: &[f64]) -> Result<f64, FilterError> {
        let (design, prior) = (self.build)(theta)?;
        KalmanFilter::new(design, self.config).total_log_prob(&prior, self.input)
    }

    /// Central finite-difference gradient at `theta`
    ///
    /// # Errors
    /// - The first error raised by any objective evaluation
    /// - [`FilterError::Gradient`] if the gradient is not finite
    pub fn gradient(&self, theta: &[f64]) -> Result<Vec<f64>, FilterError> {
        let closure_err: RefCell<Option<FilterError>> = RefCell::new(None);
        let objective = |x: &Vec<f64>| -> f64 {
            match self.value(x) {
                Ok(v) => v,
                Err(e) => {
                    let mut slot = closure_err.borrow_mut();
                    if slot.is_none() {
                        *slot = Some(e);
                    }
                    f64::NAN
                }
            }
        };

        let grad = theta.to_vec().central_diff(&objective);
        if let Some(err) = closure_err.take() {
            return Err(err);
        }
        validate_gradient(&grad, theta.len())?;
        log::trace!("log-likelihood gradient at {:?}: {:?}", theta, grad);
        Ok(grad)
    }
}

fn validate_gradient(grad: &[f64], dim: usize) -> Result<(), FilterError> {
    if grad.len() != dim {
        return Err(FilterError::Gradient {
            description: format!("expected {} entries, got {}", dim, grad.len()),
        });
    }
    if let Some(i) = grad.iter().position(|v| !v.is_finite()) {
        return Err(FilterError::Gradient {
            description: format!("entry {} is {}", i, grad[i]),
        });
    }
    Ok(())
}

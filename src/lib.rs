/*!
# Censored Kalman filters

Kalman filtering over batches of independent series ("groups") with
support for censored observations. Observations may be missing (NaN) or
bounded above/below; bounded values are treated with a Tobit correction in
both the update and the likelihood.

## Features

- Per-group Gaussian beliefs with predict/update over shared or per-group designs
- Censored (Tobit) measurement update that reduces to the plain Kalman update without bounds
- Log-likelihood of an observed series by exact joint density or independent marginals
- Finite-difference gradients of the log-likelihood with respect to model parameters

## Modules

- [`belief`] - State beliefs and beliefs over time
- [`components`] - Shared algorithms: prediction, update, Tobit corrections
- [`design`] - Transition and measurement design
- [`filter`] - Filter runner, configuration and errors
- [`common`] - Low-level utilities

## Example

```rust,no_run
use censored_kalman_filters_rs::{
    Design, DesignStep, FilterConfig, FilterInput, KalmanFilter, LikelihoodMethod,
};
use nalgebra::{DMatrix, DVector};
use ndarray::Array3;

// Local level model
let one = |v: f64| DMatrix::from_row_slice(1, 1, &[v]);
let design = Design::new(DesignStep::shared(one(1.0), one(0.01), one(1.0), one(0.1))).unwrap();
let filter = KalmanFilter::new(design, FilterConfig::default());

// One group, three timesteps, second one missing, third censored at 1.0
let obs = Array3::from_shape_vec((1, 3, 1), vec![0.5, f64::NAN, 1.0]).unwrap();
let upper = Array3::from_shape_vec((1, 3, 1), vec![f64::INFINITY, f64::INFINITY, 1.0]).unwrap();
let input = FilterInput::new(obs, None, Some(upper)).unwrap();

let prior = filter
    .initial_belief(vec![DVector::from_vec(vec![0.0])], vec![one(1.0)])
    .unwrap();
let over_time = filter.run(&prior, &input).unwrap();
let log_lik = over_time.total_log_prob(&input, LikelihoodMethod::Update).unwrap();
```
*/

// ============================================================================
// Core modules
// ============================================================================

/// State beliefs, their update rule and likelihoods over time
pub mod belief;

/// Shared filtering components (prediction, update, Tobit corrections)
pub mod components;

/// State-space design consumed by the filter
pub mod design;

/// Filter runner, configuration and errors
pub mod filter;

/// Finite-difference gradients of the log-likelihood
pub mod gradient;

/// Observations and censoring bounds
pub mod input;

/// Observability hooks for filter runs
pub mod reporter;

/// Low-level utilities (linear algebra, batched indexing)
pub mod common;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// Core types
pub use belief::{BeliefFamily, BeliefOverTime, LikelihoodMethod, StateBelief, UpdateSummary};
pub use design::{Batched, Design, DesignStep, MeasureMap};
pub use input::FilterInput;

// Filter
pub use filter::{FilterConfig, FilterConfigBuilder, FilterError, KalmanFilter};

// Censoring corrections
pub use components::tobit::{tobit_adjustment, tobit_probs};

// Indexing
pub use common::indexing::Selector;

// Gradients
pub use gradient::LikelihoodObjective;

// Reporters
pub use reporter::{DebugReporter, LoggingReporter, NoOpReporter, StepReporter};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

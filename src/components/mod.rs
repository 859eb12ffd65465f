//! Core algorithmic components
//!
//! Building blocks shared by every belief family:
//!
//! - [`prediction`] - Linear-Gaussian time advance
//! - [`update`] - Kalman measurement update with optional censoring
//! - [`tobit`] - Truncation probabilities and Tobit-adjusted moments

pub mod prediction;
pub mod tobit;
pub mod update;

pub use prediction::{predict_groups, predict_moments};
pub use tobit::{tobit_adjustment, tobit_correction, tobit_probs, TobitCorrection};
pub use update::{kalman_gain, update_moments, MeasuredMoments};

//! Observability for filter runs.
//!
//! This module provides the [`StepReporter`] trait for debugging and research
//! instrumentation. Reporters receive callbacks at key points of a
//! [`KalmanFilter`](crate::filter::KalmanFilter) run without polluting the
//! core algorithm logic.
//!
//! # Zero-Cost Abstraction
//!
//! The default [`NoOpReporter`] compiles to zero overhead - all callback
//! methods are empty and will be optimized away by the compiler.
//!
//! # Example
//!
//! ```ignore
//! use censored_kalman_filters_rs::{DebugReporter, KalmanFilter};
//!
//! let mut reporter = DebugReporter::new();
//! let over_time = filter.run_with_reporter(&prior, &input, &mut reporter)?;
//!
//! println!("Captured {} update events", reporter.update_events().len());
//! ```

use crate::belief::{BeliefOverTime, StateBelief, UpdateSummary};

// ============================================================================
// StepReporter Trait
// ============================================================================

/// Observability trait for filter step execution.
///
/// All methods have default empty implementations, so you only need
/// to override the events you care about.
///
/// # Example
///
/// ```
/// use censored_kalman_filters_rs::{StateBelief, StepReporter};
///
/// struct CountingReporter {
///     predictions: usize,
/// }
///
/// impl StepReporter for CountingReporter {
///     fn on_prediction(&mut self, _timestep: usize, _belief: &StateBelief) {
///         self.predictions += 1;
///     }
/// }
/// ```
pub trait StepReporter {
    /// Called with the predicted belief for `timestep`, before its update.
    fn on_prediction(&mut self, _timestep: usize, _belief: &StateBelief) {}

    /// Called after the belief has assimilated the observations of `timestep`.
    fn on_update(&mut self, _timestep: usize, _belief: &StateBelief, _summary: &UpdateSummary) {}

    /// Called when some groups had no observed measure at `timestep`.
    fn on_missing(&mut self, _timestep: usize, _groups: &[usize]) {}

    /// Called once the full run has been assembled.
    fn on_run_complete(&mut self, _over_time: &BeliefOverTime) {}
}

// ============================================================================
// NoOpReporter
// ============================================================================

/// Zero-cost reporter that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReporter;

impl NoOpReporter {
    /// Create a new no-op reporter.
    pub fn new() -> Self {
        Self
    }
}

impl StepReporter for NoOpReporter {}

// ============================================================================
// DebugReporter
// ============================================================================

/// Reporter that captures all events for debugging.
///
/// Stores clones of every belief it is shown, so memory grows with the
/// number of timesteps and groups.
#[derive(Debug, Clone, Default)]
pub struct DebugReporter {
    predictions: Vec<(usize, StateBelief)>,
    updates: Vec<(usize, StateBelief, UpdateSummary)>,
    missing: Vec<(usize, Vec<usize>)>,
    completed_runs: usize,
}

impl DebugReporter {
    /// Create a new debug reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all captured events.
    pub fn clear(&mut self) {
        self.predictions.clear();
        self.updates.clear();
        self.missing.clear();
        self.completed_runs = 0;
    }

    /// Captured predicted beliefs, by timestep.
    pub fn prediction_events(&self) -> &[(usize, StateBelief)] {
        &self.predictions
    }

    /// Captured updated beliefs and their summaries, by timestep.
    pub fn update_events(&self) -> &[(usize, StateBelief, UpdateSummary)] {
        &self.updates
    }

    /// Captured missing-group events.
    pub fn missing_events(&self) -> &[(usize, Vec<usize>)] {
        &self.missing
    }

    /// Number of runs that completed.
    pub fn completed_runs(&self) -> usize {
        self.completed_runs
    }

    /// Total number of captured events across all types.
    pub fn total_events(&self) -> usize {
        self.predictions.len() + self.updates.len() + self.missing.len() + self.completed_runs
    }
}

impl StepReporter for DebugReporter {
    fn on_prediction(&mut self, timestep: usize, belief: &StateBelief) {
        self.predictions.push((timestep, belief.clone()));
    }

    fn on_update(&mut self, timestep: usize, belief: &StateBelief, summary: &UpdateSummary) {
        self.updates.push((timestep, belief.clone(), summary.clone()));
    }

    fn on_missing(&mut self, timestep: usize, groups: &[usize]) {
        self.missing.push((timestep, groups.to_vec()));
    }

    fn on_run_complete(&mut self, _over_time: &BeliefOverTime) {
        self.completed_runs += 1;
    }
}

// ============================================================================
// LoggingReporter
// ============================================================================

/// Reporter that logs events using the log crate.
///
/// - `on_update`, `on_missing`: DEBUG
/// - `on_prediction`: TRACE (per-group means when verbose)
/// - `on_run_complete`: INFO
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingReporter {
    verbose: bool,
}

impl LoggingReporter {
    /// Create a new logging reporter.
    pub fn new() -> Self {
        Self { verbose: false }
    }

    /// Create a verbose logging reporter that includes belief details.
    pub fn verbose() -> Self {
        Self { verbose: true }
    }
}

impl StepReporter for LoggingReporter {
    fn on_prediction(&mut self, timestep: usize, belief: &StateBelief) {
        log::trace!("t={}: predicted {} groups", timestep, belief.num_groups());
        if self.verbose {
            for (g, mean) in belief.means().iter().enumerate() {
                log::trace!("  group {}: mean={:?}", g, mean.as_slice());
            }
        }
    }

    fn on_update(&mut self, timestep: usize, _belief: &StateBelief, summary: &UpdateSummary) {
        log::debug!(
            "t={}: updated {} groups across {} missingness partitions",
            timestep,
            summary.updated.len(),
            summary.num_partitions
        );
    }

    fn on_missing(&mut self, timestep: usize, groups: &[usize]) {
        log::debug!("t={}: {} groups fully missing", timestep, groups.len());
    }

    fn on_run_complete(&mut self, over_time: &BeliefOverTime) {
        log::info!(
            "Run complete: {} groups over {} timesteps",
            over_time.num_groups(),
            over_time.num_timesteps()
        );
    }
}

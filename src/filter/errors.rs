//! Error types for beliefs, likelihoods and the filter runner
//!
//! Contract violations (bad input from the caller) and numerical failures
//! are both surfaced here. Nothing is retried and nothing is replaced by a
//! default value.

use std::fmt;

/// Errors that can occur while filtering or evaluating a likelihood
#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    /// The input union is malformed (rank, shape, or dimension mismatch)
    MalformedInput {
        /// Offending argument (e.g. "obs", "lower", "upper")
        argument: String,
        /// What is wrong with it
        description: String,
    },

    /// A censoring bound tensor contains NaN
    NanInBounds {
        /// "lower" or "upper"
        argument: String,
    },

    /// A lower bound exceeds its upper bound
    InvalidBounds {
        group: usize,
        time: usize,
        measure: usize,
        lower: f64,
        upper: f64,
    },

    /// An observation lies outside its own censoring bound
    BoundViolation {
        /// "lower" or "upper"
        argument: String,
        group: usize,
        time: usize,
        measure: usize,
        value: f64,
        bound: f64,
    },

    /// Likelihood method string is not recognised
    UnknownMethod {
        /// The string that was passed
        method: String,
    },

    /// Censoring bounds were supplied to an operation that cannot use them
    UnsupportedBounds {
        /// Name of the operation
        operation: String,
    },

    /// Matrix inversion or factorization failed (singular matrix)
    SingularMatrix {
        /// Description of which matrix failed
        context: String,
    },

    /// A covariance matrix is not positive semi-definite
    NotPositiveSemiDefinite {
        /// Which covariance failed the check
        context: String,
        /// Smallest eigenvalue found
        min_eigenvalue: f64,
    },

    /// Dimension mismatch between expected and actual
    DimensionMismatch {
        /// What was expected
        expected: usize,
        /// What was received
        actual: usize,
        /// Context (e.g., "state dimension", "measurement dimension")
        context: String,
    },

    /// An index selector points outside the tensor
    IndexOutOfRange {
        /// Which axis or selector
        context: String,
        index: usize,
        len: usize,
    },

    /// Finite-difference gradient could not be computed
    Gradient {
        /// Description of the failure
        description: String,
    },
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::MalformedInput {
                argument,
                description,
            } => {
                write!(f, "Malformed input '{}': {}", argument, description)
            }
            FilterError::NanInBounds { argument } => {
                write!(f, "NaNs in '{}'", argument)
            }
            FilterError::InvalidBounds {
                group,
                time,
                measure,
                lower,
                upper,
            } => {
                write!(
                    f,
                    "'lower' ({}) exceeds 'upper' ({}) at group {}, time {}, measure {}",
                    lower, upper, group, time, measure
                )
            }
            FilterError::BoundViolation {
                argument,
                group,
                time,
                measure,
                value,
                bound,
            } => {
                let relation = if argument == "lower" { ">=" } else { "<=" };
                write!(
                    f,
                    "Not all obs are {} '{}' censoring limit: obs {} vs {} {} at group {}, time {}, measure {}",
                    relation, argument, value, argument, bound, group, time, measure
                )
            }
            FilterError::UnknownMethod { method } => {
                write!(
                    f,
                    "Expected method to be one of: 'update', 'independent'; got '{}'",
                    method
                )
            }
            FilterError::UnsupportedBounds { operation } => {
                write!(f, "Censoring bounds are not supported by {}", operation)
            }
            FilterError::SingularMatrix { context } => {
                write!(f, "Matrix inversion failed: {}", context)
            }
            FilterError::NotPositiveSemiDefinite {
                context,
                min_eigenvalue,
            } => {
                write!(
                    f,
                    "Covariance is not positive semi-definite ({}): min eigenvalue {:.3e}",
                    context, min_eigenvalue
                )
            }
            FilterError::DimensionMismatch {
                expected,
                actual,
                context,
            } => {
                write!(
                    f,
                    "Dimension mismatch for {}: expected {}, got {}",
                    context, expected, actual
                )
            }
            FilterError::IndexOutOfRange {
                context,
                index,
                len,
            } => {
                write!(
                    f,
                    "Index {} out of range for {} (length {})",
                    index, context, len
                )
            }
            FilterError::Gradient { description } => {
                write!(f, "Gradient computation failed: {}", description)
            }
        }
    }
}

impl std::error::Error for FilterError {}

impl FilterError {
    /// Shorthand for a [`FilterError::MalformedInput`]
    pub fn malformed(argument: &str, description: impl Into<String>) -> Self {
        FilterError::MalformedInput {
            argument: argument.to_string(),
            description: description.into(),
        }
    }

    /// Shorthand for a [`FilterError::DimensionMismatch`]
    pub fn dimension(expected: usize, actual: usize, context: impl Into<String>) -> Self {
        FilterError::DimensionMismatch {
            expected,
            actual,
            context: context.into(),
        }
    }

    /// True for errors caused by the caller's input rather than numerics
    pub fn is_contract_violation(&self) -> bool {
        !matches!(
            self,
            FilterError::SingularMatrix { .. }
                | FilterError::NotPositiveSemiDefinite { .. }
                | FilterError::Gradient { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_error_display() {
        let err = FilterError::SingularMatrix {
            context: "system uncertainty".to_string(),
        };
        assert!(err.to_string().contains("system uncertainty"));

        let err = FilterError::dimension(4, 6, "state");
        assert!(err.to_string().contains("4"));
        assert!(err.to_string().contains("6"));
    }

    #[test]
    fn test_unknown_method_names_both_options() {
        let err = FilterError::UnknownMethod {
            method: "exact".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'update'"));
        assert!(msg.contains("'independent'"));
        assert!(msg.contains("exact"));
    }

    #[test]
    fn test_bound_violation_names_argument() {
        let err = FilterError::BoundViolation {
            argument: "upper".to_string(),
            group: 0,
            time: 2,
            measure: 1,
            value: 3.0,
            bound: 2.5,
        };
        let msg = err.to_string();
        assert!(msg.contains("'upper'"));
        assert!(msg.contains("<="));
        assert!(err.is_contract_violation());
    }

    #[test]
    fn test_numerical_errors_are_not_contract_violations() {
        let err = FilterError::NotPositiveSemiDefinite {
            context: "predict".to_string(),
            min_eigenvalue: -1.0,
        };
        assert!(!err.is_contract_violation());
        assert!(FilterError::NanInBounds {
            argument: "lower".to_string()
        }
        .is_contract_violation());
    }
}

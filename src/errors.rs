//! Solver errors
//!
//! Every terminal outcome of a resolution that is not a success is a variant
//! of [SolverError]. The variants fall into three groups:
//! - validation failures ([SolverError::InvalidDimension],
//!   [SolverError::InvalidTolerance], [SolverError::InvalidScaling],
//!   [SolverError::MissingJacobian]) are detected before any iteration and
//!   leave the solver state untouched;
//! - iteration failures ([SolverError::IterationsExceeded],
//!   [SolverError::DampingFactorTooSmall], [SolverError::SingularJacobian],
//!   [SolverError::NoMonotoneReduction]) abort the resolution with all
//!   statistics reflecting the work performed up to the failed step;
//! - callback failures ([SolverError::Evaluation]) propagate a failed user
//!   evaluation without committing a partial step.

use thiserror::Error;

/// Failure reported by a user model while evaluating the function or its
/// Jacobian.
///
/// The reason is free-form; the solver does not interpret it beyond
/// propagating it inside [SolverError::Evaluation].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct EvaluationFailure {
    pub reason: String,
}

impl EvaluationFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        EvaluationFailure {
            reason: reason.into(),
        }
    }
}

impl From<&str> for EvaluationFailure {
    fn from(reason: &str) -> Self {
        EvaluationFailure::new(reason)
    }
}

/// Error returned by [crate::solver::NewtonSolver::solve] and [crate::solve]
#[derive(Debug, Error)]
pub enum SolverError {
    /// The problem dimension is zero or disagrees with the supplied vectors
    #[error("invalid problem dimension: {0}")]
    InvalidDimension(String),

    /// The requested tolerance is not a positive number
    #[error("invalid tolerance: {0}")]
    InvalidTolerance(f64),

    /// The user scaling vector holds a negative entry
    #[error("negative user scaling entry {value} at index {index}")]
    InvalidScaling { index: usize, value: f64 },

    /// An analytic Jacobian was requested but the model does not provide one
    #[error("analytic jacobian requested but not provided by the model")]
    MissingJacobian,

    /// The iteration budget was spent without reaching the tolerance
    #[error("no convergence within {0} iterations")]
    IterationsExceeded(usize),

    /// The damping factor was driven below its minimum
    #[error("damping factor became smaller than its minimum {0:e}")]
    DampingFactorTooSmall(f64),

    /// The (possibly scaled) Jacobian could not be factorized
    #[error("singular jacobian: factorization failed")]
    SingularJacobian,

    /// The corrector loop was exhausted without restoring monotonicity
    #[error("trial steps could not reduce the natural level monotonically")]
    NoMonotoneReduction,

    /// A user evaluation of F or of the Jacobian failed
    #[error("model evaluation failed: {0}")]
    Evaluation(#[from] EvaluationFailure),
}

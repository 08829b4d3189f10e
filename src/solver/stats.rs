use std::fmt;

extern crate nalgebra;

/// Counters and per-iteration history of a resolution.
///
/// The history vectors are append-only; one entry is pushed per accepted
/// iteration (plus the starting point in [SolverStats::x_iter]). They are
/// pre-allocated to the iteration budget so that recording never
/// reallocates mid-step.
#[derive(Debug, Clone)]
pub struct SolverStats {
    /// Accepted Newton iterations
    pub n_iter: usize,
    /// Rejected corrector (damping retry) steps
    pub n_corr: usize,
    /// Model evaluations outside Jacobian sweeps
    pub n_fcn: usize,
    /// Model evaluations spent in finite-difference Jacobian sweeps
    pub n_fcn_jac: usize,
    /// Fresh Jacobian evaluations
    pub n_jac: usize,
    /// Rejected rank-1 based iterations
    pub n_rej_rank1: usize,
    /// Tolerance actually enforced (after clamping)
    pub rtol: f64,
    /// Scaled RMS norm of the final correction
    pub achieved_precision: f64,
    /// Preconditioned user scaling vector
    pub x_scal: nalgebra::DVector<f64>,
    /// Iterates, starting with the initial guess
    pub x_iter: Vec<nalgebra::DVector<f64>>,
    /// Natural level `sumx` of each accepted step
    pub natural_levels: Vec<f64>,
    /// Simplified level of each accepted trial
    pub simplified_levels: Vec<f64>,
    /// Standard level `dlevf` at each accepted iterate
    pub standard_levels: Vec<f64>,
    /// Scaled RMS norm of the simplified correction per iteration
    pub precisions: Vec<f64>,
    /// Accepted damping factor per iteration
    pub damping_factors: Vec<f64>,
}

impl SolverStats {
    pub(crate) fn new(n: usize, max_iterations: usize) -> Self {
        let capacity = max_iterations + 1;
        SolverStats {
            n_iter: 0,
            n_corr: 0,
            n_fcn: 0,
            n_fcn_jac: 0,
            n_jac: 0,
            n_rej_rank1: 0,
            rtol: 0.0,
            achieved_precision: f64::INFINITY,
            x_scal: nalgebra::DVector::zeros(n),
            x_iter: Vec::with_capacity(capacity),
            natural_levels: Vec::with_capacity(capacity),
            simplified_levels: Vec::with_capacity(capacity),
            standard_levels: Vec::with_capacity(capacity),
            precisions: Vec::with_capacity(capacity),
            damping_factors: Vec::with_capacity(capacity),
        }
    }
}

impl fmt::Display for SolverStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", super::log::iteration_report(self))
    }
}

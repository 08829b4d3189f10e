//! User-problem interface
//!
//! The [Problem] trait is the minimal contract between the solver and the
//! system of equations F(x) = 0 to be solved. The solver drives the model
//! exclusively through it:
//! - [Problem::evaluate] fills the residual vector F(x);
//! - [Problem::jacobian] optionally fills the Jacobian, dense or banded,
//!   when an analytic Jacobian is configured
//!   ([crate::solver::JacobianMethod::Analytic]).
//!
//! Both methods are fallible: a model that cannot produce usable values at
//! the requested point returns an [EvaluationFailure], which the solver
//! propagates as [crate::errors::SolverError::Evaluation] without
//! committing a partial step.
//!
//! For plain functions the adapters [ProblemFromFunction] and
//! [ProblemFromFunctionAndJacobian] avoid the boilerplate of a dedicated
//! model type.
//!
//! ## Examples
//! ```
//! use damped_newton as dn;
//!
//! // Equation: x**2 - 2 = 0
//! let mut model = dn::model::ProblemFromFunction::new(1, |x, f| {
//!     f[0] = x[0] * x[0] - 2.0;
//! });
//!
//! let x0 = nalgebra::DVector::from_vec(vec![1.0]);
//! let scale = nalgebra::DVector::from_element(1, 1.0);
//! let solution = dn::solve(&mut model, x0, scale, dn::SolverOptions::default()).unwrap();
//! assert!((solution.x[0] - std::f64::consts::SQRT_2).abs() < 1e-6);
//! ```

extern crate nalgebra;

use crate::errors::EvaluationFailure;
use crate::linalg::Jacobian;

/// Definition of the system of equations to solve
pub trait Problem {
    /// Dimension n of the system; `evaluate` receives and fills vectors of
    /// this length
    fn len_problem(&self) -> usize;

    /// Fill `f` with F(x)
    fn evaluate(
        &mut self,
        x: &nalgebra::DVector<f64>,
        f: &mut nalgebra::DVector<f64>,
    ) -> Result<(), EvaluationFailure>;

    /// Whether [Problem::jacobian] is implemented.
    ///
    /// The default implementation returns `false`, which restricts the
    /// solver to finite-difference approximations.
    fn jacobian_provided(&self) -> bool {
        false
    }

    /// Fill `jac` with the Jacobian of F at `x`.
    ///
    /// The storage matches the configured mode: dense models assign every
    /// element, banded models only the band. If this method is overridden,
    /// [Problem::jacobian_provided] must also be overridden to return
    /// `true`.
    fn jacobian(
        &mut self,
        x: &nalgebra::DVector<f64>,
        jac: &mut Jacobian,
    ) -> Result<(), EvaluationFailure> {
        let _ = (x, jac);
        Err(EvaluationFailure::new("no analytic jacobian implemented"))
    }
}

/// Adapter turning a plain function into a [Problem]
pub struct ProblemFromFunction<F> {
    problem_size: usize,
    func: F,
}

impl<F> ProblemFromFunction<F>
where
    F: FnMut(&nalgebra::DVector<f64>, &mut nalgebra::DVector<f64>),
{
    pub fn new(problem_size: usize, func: F) -> Self {
        ProblemFromFunction { problem_size, func }
    }
}

impl<F> Problem for ProblemFromFunction<F>
where
    F: FnMut(&nalgebra::DVector<f64>, &mut nalgebra::DVector<f64>),
{
    fn len_problem(&self) -> usize {
        self.problem_size
    }

    fn evaluate(
        &mut self,
        x: &nalgebra::DVector<f64>,
        f: &mut nalgebra::DVector<f64>,
    ) -> Result<(), EvaluationFailure> {
        (self.func)(x, f);
        Ok(())
    }
}

/// Adapter turning a function and its analytic Jacobian into a [Problem]
pub struct ProblemFromFunctionAndJacobian<F, J> {
    problem_size: usize,
    func: F,
    jac: J,
}

impl<F, J> ProblemFromFunctionAndJacobian<F, J>
where
    F: FnMut(&nalgebra::DVector<f64>, &mut nalgebra::DVector<f64>),
    J: FnMut(&nalgebra::DVector<f64>, &mut Jacobian),
{
    pub fn new(problem_size: usize, func: F, jac: J) -> Self {
        ProblemFromFunctionAndJacobian {
            problem_size,
            func,
            jac,
        }
    }
}

impl<F, J> Problem for ProblemFromFunctionAndJacobian<F, J>
where
    F: FnMut(&nalgebra::DVector<f64>, &mut nalgebra::DVector<f64>),
    J: FnMut(&nalgebra::DVector<f64>, &mut Jacobian),
{
    fn len_problem(&self) -> usize {
        self.problem_size
    }

    fn evaluate(
        &mut self,
        x: &nalgebra::DVector<f64>,
        f: &mut nalgebra::DVector<f64>,
    ) -> Result<(), EvaluationFailure> {
        (self.func)(x, f);
        Ok(())
    }

    fn jacobian_provided(&self) -> bool {
        true
    }

    fn jacobian(
        &mut self,
        x: &nalgebra::DVector<f64>,
        jac: &mut Jacobian,
    ) -> Result<(), EvaluationFailure> {
        (self.jac)(x, jac);
        Ok(())
    }
}

//! Failure modes and input validation

use damped_newton as dn;

use dn::errors::{EvaluationFailure, SolverError};
use dn::model::{Problem, ProblemFromFunction, ProblemFromFunctionAndJacobian};
use dn::solver::{JacobianMethod, NewtonSolver, Nonlinearity};
use dn::SolverOptions;

use crate::common;

#[test]
fn singular_jacobian_is_terminal() {
    // F(x) = (x1^2 - x2^2, 2 x1 x2) has a singular Jacobian at the origin
    let mut model = ProblemFromFunctionAndJacobian::new(
        2,
        |x: &nalgebra::DVector<f64>, f: &mut nalgebra::DVector<f64>| {
            f[0] = x[0] * x[0] - x[1] * x[1];
            f[1] = 2.0 * x[0] * x[1];
        },
        |x: &nalgebra::DVector<f64>, jac: &mut dn::linalg::Jacobian| {
            jac.set(0, 0, 2.0 * x[0]);
            jac.set(0, 1, -2.0 * x[1]);
            jac.set(1, 0, 2.0 * x[1]);
            jac.set(1, 1, 2.0 * x[0]);
        },
    );
    let mut options = SolverOptions::default();
    options.jacobian = JacobianMethod::Analytic;
    let x0 = nalgebra::DVector::zeros(2);

    let result = dn::solve(&mut model, x0, common::ones(2), options);
    assert!(matches!(result, Err(SolverError::SingularJacobian)));
}

#[test]
fn missing_jacobian_is_rejected_before_iterating() {
    let mut model = ProblemFromFunction::new(2, common::linear2);
    let mut options = SolverOptions::default();
    options.jacobian = JacobianMethod::Analytic;
    let x0 = nalgebra::DVector::zeros(2);

    let mut solver = NewtonSolver::new(x0, common::ones(2), &options).unwrap();
    let result = solver.solve(&mut model);

    assert!(matches!(result, Err(SolverError::MissingJacobian)));
    assert_eq!(solver.stats().n_fcn, 0);
}

#[test]
fn negative_scaling_entry_is_rejected() {
    let options = SolverOptions::default();
    let x0 = nalgebra::DVector::zeros(2);
    let xscal = nalgebra::DVector::from_vec(vec![1.0, -1.0]);

    let result = NewtonSolver::new(x0, xscal, &options);
    assert!(matches!(
        result,
        Err(SolverError::InvalidScaling { index: 1, .. })
    ));
}

#[test]
fn dimension_mismatch_is_rejected() {
    let options = SolverOptions::default();
    let x0 = nalgebra::DVector::zeros(2);
    let xscal = nalgebra::DVector::zeros(3);
    assert!(matches!(
        NewtonSolver::new(x0, xscal, &options),
        Err(SolverError::InvalidDimension(_))
    ));

    let empty: nalgebra::DVector<f64> = nalgebra::DVector::zeros(0);
    assert!(matches!(
        NewtonSolver::new(empty.clone(), empty, &options),
        Err(SolverError::InvalidDimension(_))
    ));
}

#[test]
fn tolerance_is_clamped_with_the_state_reporting_it() {
    let mut options = SolverOptions::default();
    options.rtol = 1.0e-30;
    let x0 = nalgebra::DVector::zeros(2);

    let solver = NewtonSolver::new(x0, common::ones(2), &options).unwrap();
    assert_eq!(solver.stats().rtol, 20.0 * f64::EPSILON);
}

#[test]
fn iteration_budget_is_enforced() {
    let mut model = ProblemFromFunction::new(1, common::atan_shift);
    let mut options = SolverOptions::default();
    options.nonlinearity = Nonlinearity::High;
    options.max_iterations = 2;
    let x0 = nalgebra::DVector::from_vec(vec![10.0]);

    let result = dn::solve(&mut model, x0, common::ones(1), options);
    assert!(matches!(result, Err(SolverError::IterationsExceeded(2))));
}

#[test]
fn unreducible_problem_exhausts_the_damping_factor() {
    // x^2 + 1 = 0 has no real root; near the flat spot every damped trial
    // grows the natural level
    let mut model = ProblemFromFunction::new(1, |x: &nalgebra::DVector<f64>, f: &mut nalgebra::DVector<f64>| {
        f[0] = x[0] * x[0] + 1.0;
    });
    let mut options = SolverOptions::default();
    options.nonlinearity = Nonlinearity::High;
    let x0 = nalgebra::DVector::from_vec(vec![1.0e-3]);

    let result = dn::solve(&mut model, x0, common::ones(1), options);
    assert!(matches!(
        result,
        Err(SolverError::DampingFactorTooSmall(_))
    ));
}

struct ExplodingModel;

impl Problem for ExplodingModel {
    fn len_problem(&self) -> usize {
        1
    }

    fn evaluate(
        &mut self,
        _x: &nalgebra::DVector<f64>,
        _f: &mut nalgebra::DVector<f64>,
    ) -> Result<(), EvaluationFailure> {
        Err(EvaluationFailure::new("not defined here"))
    }
}

#[test]
fn failing_evaluation_propagates() {
    let mut model = ExplodingModel;
    let options = SolverOptions::default();
    let x0 = nalgebra::DVector::from_vec(vec![1.0]);

    let result = dn::solve(&mut model, x0, common::ones(1), options);
    match result {
        Err(SolverError::Evaluation(failure)) => {
            assert_eq!(failure.reason, "not defined here");
        }
        other => panic!("expected an evaluation failure, got {:?}", other.err()),
    }
}

//! Successive-call mode: a chunked resolution must retrace the one-shot
//! trajectory exactly

use damped_newton as dn;

use dn::model::ProblemFromFunction;
use dn::solver::{NewtonSolver, Nonlinearity, SolveStatus};
use dn::SolverOptions;

use crate::common;

fn base_options() -> SolverOptions {
    let mut options = SolverOptions::default();
    options.nonlinearity = Nonlinearity::High;
    options.rtol = 1.0e-9;
    options
}

#[test]
fn chunked_iteration_matches_a_single_run() {
    let n = 4;
    let x0 = nalgebra::DVector::from_element(n, -1.0);

    // one-shot reference
    let mut reference_model = ProblemFromFunction::new(n, common::broyden_tridiagonal);
    let mut reference_options = base_options();
    reference_options.max_iterations = 30;
    let reference = dn::solve(
        &mut reference_model,
        x0.clone(),
        common::ones(n),
        reference_options,
    )
    .unwrap();
    assert!(reference.stats.n_iter >= 3);

    // same resolution, one iteration per call
    let mut chunked_model = ProblemFromFunction::new(n, common::broyden_tridiagonal);
    let mut chunked_options = base_options();
    chunked_options.max_iterations = 1;
    chunked_options.successive = true;
    let mut solver = NewtonSolver::new(x0, common::ones(n), &chunked_options).unwrap();

    let mut calls = 0;
    loop {
        calls += 1;
        assert!(calls <= 30, "no convergence within the call budget");
        match solver.solve(&mut chunked_model).unwrap() {
            SolveStatus::Converged => break,
            SolveStatus::Continue => continue,
        }
    }

    assert_eq!(calls, reference.stats.n_iter);
    assert_eq!(solver.stats().n_iter, reference.stats.n_iter);
    assert_eq!(solver.stats().n_fcn, reference.stats.n_fcn);
    assert_eq!(solver.stats().n_jac, reference.stats.n_jac);
    assert_eq!(solver.stats().n_corr, reference.stats.n_corr);
    assert_eq!(
        solver.stats().damping_factors,
        reference.stats.damping_factors
    );
    for i in 0..n {
        assert_eq!(solver.solution()[i], reference.x[i]);
    }
}

#[test]
fn converged_solver_stays_converged() {
    let mut model = ProblemFromFunction::new(1, |x: &nalgebra::DVector<f64>, f: &mut nalgebra::DVector<f64>| {
        f[0] = x[0] * x[0] - 2.0;
    });
    let mut options = base_options();
    options.successive = true;
    options.max_iterations = 50;
    let x0 = nalgebra::DVector::from_vec(vec![1.0]);

    let mut solver = NewtonSolver::new(x0, common::ones(1), &options).unwrap();
    assert_eq!(solver.solve(&mut model).unwrap(), SolveStatus::Converged);
    let n_fcn = solver.stats().n_fcn;

    // a later call performs no further work
    assert_eq!(solver.solve(&mut model).unwrap(), SolveStatus::Converged);
    assert_eq!(solver.stats().n_fcn, n_fcn);
}

//! Jacobian strategies compared on the same problems

use damped_newton as dn;

use dn::model::{ProblemFromFunction, ProblemFromFunctionAndJacobian};
use dn::solver::{JacobianMethod, Nonlinearity};
use dn::SolverOptions;

use crate::common;

fn options(jacobian: JacobianMethod) -> SolverOptions {
    let mut options = SolverOptions::default();
    options.nonlinearity = Nonlinearity::High;
    options.jacobian = jacobian;
    options.rtol = 1.0e-8;
    options
}

fn solve_chebyquad(jacobian: JacobianMethod) -> dn::Solution {
    let x0 = nalgebra::DVector::from_vec(vec![1.0 / 3.0, 2.0 / 3.0]);
    match jacobian {
        JacobianMethod::Analytic => {
            let mut model = ProblemFromFunctionAndJacobian::new(
                2,
                common::chebyquad2,
                common::chebyquad2_jacobian,
            );
            dn::solve(&mut model, x0, common::ones(2), options(jacobian)).unwrap()
        }
        _ => {
            let mut model = ProblemFromFunction::new(2, common::chebyquad2);
            dn::solve(&mut model, x0, common::ones(2), options(jacobian)).unwrap()
        }
    }
}

#[test]
fn all_strategies_find_the_same_root() {
    let analytic = solve_chebyquad(JacobianMethod::Analytic);
    let plain = solve_chebyquad(JacobianMethod::ForwardDifference);
    let adaptive = solve_chebyquad(JacobianMethod::AdaptiveForwardDifference);

    for i in 0..2 {
        assert!(float_cmp::approx_eq!(
            f64,
            analytic.x[i],
            plain.x[i],
            epsilon = 1e-6
        ));
        assert!(float_cmp::approx_eq!(
            f64,
            analytic.x[i],
            adaptive.x[i],
            epsilon = 1e-6
        ));
    }
}

#[test]
fn analytic_jacobians_cost_no_function_calls() {
    let analytic = solve_chebyquad(JacobianMethod::Analytic);
    assert_eq!(analytic.stats.n_fcn_jac, 0);
    assert!(analytic.stats.n_jac >= 1);
}

#[test]
fn plain_differencing_costs_n_calls_per_sweep() {
    let plain = solve_chebyquad(JacobianMethod::ForwardDifference);
    assert_eq!(plain.stats.n_fcn_jac, 2 * plain.stats.n_jac);
}

#[test]
fn differencing_a_linear_system_is_exact() {
    let mut fd_model = ProblemFromFunction::new(2, common::linear2);
    let mut fd_options = options(JacobianMethod::ForwardDifference);
    fd_options.nonlinearity = Nonlinearity::Linear;
    let fd = dn::solve(
        &mut fd_model,
        nalgebra::DVector::zeros(2),
        common::ones(2),
        fd_options,
    )
    .unwrap();

    let mut analytic_model =
        ProblemFromFunctionAndJacobian::new(2, common::linear2, common::linear2_jacobian);
    let mut analytic_options = options(JacobianMethod::Analytic);
    analytic_options.nonlinearity = Nonlinearity::Linear;
    let analytic = dn::solve(
        &mut analytic_model,
        nalgebra::DVector::zeros(2),
        common::ones(2),
        analytic_options,
    )
    .unwrap();

    // forward differences of a linear map carry only rounding error
    assert_eq!(fd.stats.n_iter, 1);
    assert_eq!(analytic.stats.n_iter, 1);
    for i in 0..2 {
        assert!((fd.x[i] - analytic.x[i]).abs() < 1e-12);
    }
}

#[test]
fn adaptive_differencing_stays_within_the_retry_budget() {
    let adaptive = solve_chebyquad(JacobianMethod::AdaptiveForwardDifference);
    // at most one retry per column and sweep
    assert!(adaptive.stats.n_fcn_jac <= 2 * 2 * adaptive.stats.n_jac);
    assert!(adaptive.stats.n_fcn_jac >= 2 * adaptive.stats.n_jac);
}

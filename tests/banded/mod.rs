//! Banded versus dense storage equivalence

use damped_newton as dn;

use dn::model::{ProblemFromFunction, ProblemFromFunctionAndJacobian};
use dn::solver::{JacobianMethod, Nonlinearity, Storage};
use dn::SolverOptions;

use crate::common;

fn options(storage: Storage, jacobian: JacobianMethod) -> SolverOptions {
    let mut options = SolverOptions::default();
    options.nonlinearity = Nonlinearity::Mild;
    options.storage = storage;
    options.jacobian = jacobian;
    options.rtol = 1.0e-9;
    options
}

#[test]
fn tridiagonal_iterates_agree_between_storage_modes() {
    let n = 6;
    let x0 = nalgebra::DVector::from_element(n, -1.0);

    let mut dense_model = ProblemFromFunction::new(n, common::broyden_tridiagonal);
    let dense = dn::solve(
        &mut dense_model,
        x0.clone(),
        common::ones(n),
        options(Storage::Dense, JacobianMethod::ForwardDifference),
    )
    .unwrap();

    let mut banded_model = ProblemFromFunction::new(n, common::broyden_tridiagonal);
    let banded = dn::solve(
        &mut banded_model,
        x0,
        common::ones(n),
        options(
            Storage::Banded { ml: 1, mu: 1 },
            JacobianMethod::ForwardDifference,
        ),
    )
    .unwrap();

    assert_eq!(dense.stats.n_iter, banded.stats.n_iter);
    assert_eq!(dense.stats.x_iter.len(), banded.stats.x_iter.len());
    for (xd, xb) in dense.stats.x_iter.iter().zip(banded.stats.x_iter.iter()) {
        for i in 0..n {
            assert!((xd[i] - xb[i]).abs() < 1.0e-11);
        }
    }
    // grouped differencing: three evaluations per sweep instead of six
    assert_eq!(banded.stats.n_fcn_jac, banded.stats.n_jac * 3);
    assert_eq!(dense.stats.n_fcn_jac, dense.stats.n_jac * 6);
}

#[test]
fn analytic_band_matches_analytic_dense() {
    let n = 8;
    let x0 = nalgebra::DVector::from_element(n, -1.0);

    let mut dense_model = ProblemFromFunctionAndJacobian::new(
        n,
        common::broyden_tridiagonal,
        common::broyden_tridiagonal_jacobian,
    );
    let dense = dn::solve(
        &mut dense_model,
        x0.clone(),
        common::ones(n),
        options(Storage::Dense, JacobianMethod::Analytic),
    )
    .unwrap();

    let mut banded_model = ProblemFromFunctionAndJacobian::new(
        n,
        common::broyden_tridiagonal,
        common::broyden_tridiagonal_jacobian,
    );
    let banded = dn::solve(
        &mut banded_model,
        x0,
        common::ones(n),
        options(
            Storage::Banded { ml: 1, mu: 1 },
            JacobianMethod::Analytic,
        ),
    )
    .unwrap();

    for i in 0..n {
        assert!((dense.x[i] - banded.x[i]).abs() < 1.0e-12);
    }
}

#[test]
fn wide_band_covers_the_full_matrix() {
    // with ml = mu = n - 1 the band degenerates to a full matrix and the
    // banded path must behave like the dense one
    let n = 3;
    let x0 = nalgebra::DVector::zeros(n);
    let shifted = move |x: &nalgebra::DVector<f64>, f: &mut nalgebra::DVector<f64>| {
        f[0] = 2.0 * x[0] + x[1] - 3.0;
        f[1] = x[0] + 3.0 * x[1] - 4.0;
        f[2] = x[0] + x[2] * x[2] + x[2] - 2.0;
    };

    let mut dense_model = ProblemFromFunction::new(n, shifted);
    let dense = dn::solve(
        &mut dense_model,
        x0.clone(),
        common::ones(n),
        options(Storage::Dense, JacobianMethod::ForwardDifference),
    )
    .unwrap();

    let mut banded_model = ProblemFromFunction::new(n, shifted);
    let banded = dn::solve(
        &mut banded_model,
        x0,
        common::ones(n),
        options(
            Storage::Banded { ml: n - 1, mu: n - 1 },
            JacobianMethod::ForwardDifference,
        ),
    )
    .unwrap();

    for i in 0..n {
        assert!((dense.x[i] - banded.x[i]).abs() < 1.0e-9);
    }
}

//! Property tests: affine invariance, scaling bounds, band-index laws

use damped_newton as dn;

use proptest::prelude::*;

use dn::linalg::BandedMatrix;
use dn::machine::MachineConsts;
use dn::model::ProblemFromFunction;
use dn::scaling;
use dn::solver::Nonlinearity;
use dn::SolverOptions;

use crate::common;

fn options() -> SolverOptions {
    let mut options = SolverOptions::default();
    options.nonlinearity = Nonlinearity::Mild;
    options.rtol = 1.0e-9;
    options
}

proptest! {
    /// Left-multiplying F by a nonsingular diagonal must not change the
    /// iterates beyond floating-point noise: the row equilibration absorbs
    /// the scaling before it can reach the damping heuristics.
    #[test]
    fn iteration_is_affine_invariant(
        d in prop::collection::vec(0.1f64..10.0, 3),
    ) {
        let n = 3;
        let x0 = nalgebra::DVector::from_element(n, -1.0);

        let mut plain_model = ProblemFromFunction::new(n, common::broyden_tridiagonal);
        let plain = dn::solve(&mut plain_model, x0.clone(), common::ones(n), options()).unwrap();

        let scale = d.clone();
        let mut scaled_model = ProblemFromFunction::new(n, move |x: &nalgebra::DVector<f64>, f: &mut nalgebra::DVector<f64>| {
            common::broyden_tridiagonal(x, f);
            for i in 0..3 {
                f[i] *= scale[i];
            }
        });
        let scaled = dn::solve(&mut scaled_model, x0, common::ones(n), options()).unwrap();

        for i in 0..n {
            prop_assert!((plain.x[i] - scaled.x[i]).abs() < 1.0e-7);
        }
    }

    /// The iterate scaling weights always land in the safe window,
    /// whatever the magnitudes of the iterates
    #[test]
    fn scaling_weights_stay_in_the_safe_window(
        x in prop::collection::vec(-1.0e30f64..1.0e30, 4),
        xa in prop::collection::vec(-1.0e30f64..1.0e30, 4),
    ) {
        let machine = MachineConsts::default();
        let xscal = nalgebra::DVector::from_element(4, 1.0);
        let x = nalgebra::DVector::from_vec(x);
        let xa = nalgebra::DVector::from_vec(xa);

        let xw = scaling::scaling_vector(&xscal, &x, &xa, &machine);
        for i in 0..4 {
            prop_assert!(xw[i] >= machine.small);
            prop_assert!(xw[i] <= machine.great);
            prop_assert!(xw[i] >= 1.0); // never below the user scale
        }
    }

    /// The band index mapping is a bijection on its support
    #[test]
    fn band_indexing_round_trips(
        n in 1usize..12,
        ml in 0usize..4,
        mu in 0usize..4,
    ) {
        let ml = ml.min(n - 1);
        let mu = mu.min(n - 1);
        let a = BandedMatrix::zeros(n, ml, mu);
        for j in 0..n {
            for i in 0..n {
                match a.storage_row(i, j) {
                    Some(r) => {
                        prop_assert!(a.in_band(i, j));
                        prop_assert_eq!(a.logical_row(r, j), Some(i));
                    }
                    None => prop_assert!(!a.in_band(i, j)),
                }
            }
        }
    }
}

#[test]
fn damping_factors_respect_their_bounds() {
    let mut model = ProblemFromFunction::new(1, common::atan_shift);
    let mut options = SolverOptions::default();
    options.nonlinearity = Nonlinearity::High;
    options.rtol = 1.0e-8;
    let x0 = nalgebra::DVector::from_vec(vec![10.0]);

    let solution = dn::solve(&mut model, x0, common::ones(1), options).unwrap();

    for &fc in &solution.stats.damping_factors {
        assert!((1.0e-4..=1.0).contains(&fc));
    }
}

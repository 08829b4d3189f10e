//! Solver configuration and iteration engine
//!
//! A resolution is driven by three pieces:
//! - [SolverOptions], the immutable configuration (tolerance, problem
//!   class, Jacobian strategy, storage mode, damping parameters);
//! - [NewtonSolver], which owns the mutable iteration state and performs
//!   the damped Newton iteration on a [crate::model::Problem];
//! - [SolverStats], the counters and per-iteration history returned to the
//!   caller.
//!
//! For a single resolution the free function [solve] wires the three
//! together. Successive-call mode keeps the [NewtonSolver] alive between
//! calls instead.
//!
//! ## Examples
//!
//! ```
//! use damped_newton as dn;
//!
//! // Equation: x**2 - 2 = 0
//! fn square2(x: &nalgebra::DVector<f64>, f: &mut nalgebra::DVector<f64>) {
//!     f[0] = x[0] * x[0] - 2.0;
//! }
//!
//! let mut model = dn::model::ProblemFromFunction::new(1, square2);
//! let init = nalgebra::DVector::from_vec(vec![1.0]);
//! let scale = nalgebra::DVector::from_element(1, 1.0);
//!
//! let mut options = dn::SolverOptions::default();
//! options.nonlinearity = dn::solver::Nonlinearity::Mild;
//!
//! let solution = dn::solve(&mut model, init, scale, options).unwrap();
//! assert!((solution.x[0] - std::f64::consts::SQRT_2).abs() < 1e-9);
//! println!("{}", solution.stats);
//! ```

mod engine;
mod log;
mod options;
mod stats;

pub use engine::{solve, NewtonSolver, Solution, SolveStatus};
pub use log::iteration_report;
pub use options::{BoundedDamping, JacobianMethod, Nonlinearity, SolverOptions, Storage};
pub use stats::SolverStats;

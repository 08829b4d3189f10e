//! Affine-invariant damped Newton methods for rootfinding
//! ========================================================
//!
//! This crate solves systems of nonlinear algebraic equations F(x) = 0,
//! F: ℝⁿ → ℝⁿ, with the affine-invariant damped Newton iteration of
//! Deuflhard's NLEQ family. It is aimed at numerically sensitive problems
//! where the plain Newton iteration diverges: the damping factor is driven
//! by computed Lipschitz estimates, trial steps are accepted through a
//! natural monotonicity test, and the whole decision logic is invariant
//! under row scaling of the problem.
//!
//! # Key features
//!
//! 1. Adaptive damping with an a-priori predictor and an a-posteriori
//!    corrector loop, parametrized by the declared problem class
//!    ([solver::Nonlinearity]).
//! 2. Jacobian either supplied analytically or approximated by forward
//!    differences, optionally with feedback-controlled perturbations.
//! 3. Dense and banded Jacobian storage, with band-aware differencing that
//!    evaluates whole column groups at once.
//! 4. Optional Broyden rank-1 updates to skip Jacobian evaluations while
//!    the iteration is contracting well.
//! 5. Step-by-step execution: in successive-call mode the resolution can be
//!    chunked and resumed, keeping every counter and history entry.
//!
//! The iterate and row scalings keep every heuristic well-posed even for
//! badly scaled unknowns; all thresholds derive from a caller-replaceable
//! set of machine constants ([machine::MachineConsts]).
//!
//! # Examples
//!
//! ```
//! use damped_newton as dn;
//!
//! // Chebyshev-like system: find x with x1 + x2 = 1 symmetric about 1/2
//! fn system(x: &nalgebra::DVector<f64>, f: &mut nalgebra::DVector<f64>) {
//!     let y1 = 2.0 * x[0] - 1.0;
//!     let y2 = 2.0 * x[1] - 1.0;
//!     f[0] = 0.5 * (y1 + y2);
//!     f[1] = 0.5 * (2.0 * y1 * y1 - 1.0 + 2.0 * y2 * y2 - 1.0) + 1.0 / 3.0;
//! }
//!
//! let mut model = dn::model::ProblemFromFunction::new(2, system);
//! let x0 = nalgebra::DVector::from_vec(vec![1.0 / 3.0, 2.0 / 3.0]);
//! let scale = nalgebra::DVector::from_element(2, 1.0);
//!
//! let solution = dn::solve(&mut model, x0, scale, dn::SolverOptions::default()).unwrap();
//! assert!((solution.x[0] + solution.x[1] - 1.0).abs() < 1e-8);
//! ```
//!
//! # Reference
//!
//! P. Deuflhard (2004),
//! Newton Methods for Nonlinear Problems. Affine Invariance and Adaptive
//! Algorithms,
//! Springer Series in Computational Mathematics 35,
//! doi:10.1007/978-3-642-23899-4

pub mod errors;
pub mod jacobian;
pub mod levels;
pub mod linalg;
pub mod machine;
pub mod model;
pub mod scaling;
pub mod solver;

pub use solver::{solve, NewtonSolver, Solution, SolveStatus, SolverOptions, SolverStats};

//! Linear-system backends of the solver
//!
//! The iteration engine only ever factorizes a (scaled) Jacobian once per
//! step and then back-substitutes against it, possibly several times. Both
//! storage modes satisfy that contract: dense matrices through the LU
//! decomposition of `nalgebra`, banded matrices through the in-crate
//! LINPACK-style kernels of the [BandedLu] type.

use std::fmt;

extern crate nalgebra;

mod banded;

pub use banded::{BandedLu, BandedMatrix};

/// Marker returned when a factorization meets a zero pivot
#[derive(Debug)]
pub struct SingularMatrix;

/// Jacobian storage, dense or banded
#[derive(Debug, Clone, PartialEq)]
pub enum Jacobian {
    Dense(nalgebra::DMatrix<f64>),
    Banded(BandedMatrix),
}

impl Jacobian {
    pub fn zeros_dense(n: usize) -> Self {
        Jacobian::Dense(nalgebra::DMatrix::zeros(n, n))
    }

    pub fn zeros_banded(n: usize, ml: usize, mu: usize) -> Self {
        Jacobian::Banded(BandedMatrix::zeros(n, ml, mu))
    }

    pub fn n(&self) -> usize {
        match self {
            Jacobian::Dense(a) => a.nrows(),
            Jacobian::Banded(a) => a.n(),
        }
    }

    pub fn is_banded(&self) -> bool {
        matches!(self, Jacobian::Banded(_))
    }

    pub fn fill_zero(&mut self) {
        match self {
            Jacobian::Dense(a) => a.fill(0.0),
            Jacobian::Banded(a) => a.fill_zero(),
        }
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        match self {
            Jacobian::Dense(a) => a[(i, j)],
            Jacobian::Banded(a) => a.get(i, j),
        }
    }

    /// Store one element; panics if `(i, j)` lies outside a banded layout
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        match self {
            Jacobian::Dense(a) => a[(i, j)] = value,
            Jacobian::Banded(a) => a.set(i, j, value),
        }
    }

    /// Maximum absolute element of logical row `i` (restricted to the band
    /// for banded storage)
    pub fn row_abs_max(&self, i: usize) -> f64 {
        match self {
            Jacobian::Dense(a) => a.row(i).amax(),
            Jacobian::Banded(a) => a.row_abs_max(i),
        }
    }

    /// Left-multiply by `diag(fw)`
    pub fn scale_rows(&mut self, fw: &nalgebra::DVector<f64>) {
        match self {
            Jacobian::Dense(a) => {
                for j in 0..a.ncols() {
                    for i in 0..a.nrows() {
                        a[(i, j)] *= fw[i];
                    }
                }
            }
            Jacobian::Banded(a) => a.scale_rows(fw),
        }
    }

    /// Right-multiply by `diag(xw)`
    pub fn scale_columns(&mut self, xw: &nalgebra::DVector<f64>) {
        match self {
            Jacobian::Dense(a) => {
                for j in 0..a.ncols() {
                    for i in 0..a.nrows() {
                        a[(i, j)] *= xw[j];
                    }
                }
            }
            Jacobian::Banded(a) => a.scale_columns(xw),
        }
    }

    pub fn mul_vec(&self, v: &nalgebra::DVector<f64>) -> nalgebra::DVector<f64> {
        match self {
            Jacobian::Dense(a) => a * v,
            Jacobian::Banded(a) => a.mul_vec(v),
        }
    }

    /// Broyden rank-1 secant update from an accepted step `s` with residual
    /// change `y`, so that afterwards `A s = y`.
    ///
    /// For banded storage the outer-product correction is restricted to the
    /// band. Returns `false` (and leaves the matrix untouched) when the step
    /// is too short to divide by.
    pub fn broyden_update(
        &mut self,
        s: &nalgebra::DVector<f64>,
        y: &nalgebra::DVector<f64>,
        small: f64,
    ) -> bool {
        let denom = s.norm_squared();
        if denom < small {
            return false;
        }
        let w = (self.mul_vec(s) - y) / denom;
        match self {
            Jacobian::Dense(a) => {
                for j in 0..a.ncols() {
                    for i in 0..a.nrows() {
                        a[(i, j)] -= w[i] * s[j];
                    }
                }
            }
            Jacobian::Banded(a) => {
                for j in 0..a.n() {
                    for i in a.column_support(j) {
                        let value = a.get(i, j) - w[i] * s[j];
                        a.set(i, j, value);
                    }
                }
            }
        }
        true
    }

    pub fn factorize(&self) -> Result<Factorization, SingularMatrix> {
        match self {
            Jacobian::Dense(a) => {
                let lu = a.clone().lu();
                if lu.is_invertible() {
                    Ok(Factorization::Dense(lu))
                } else {
                    Err(SingularMatrix)
                }
            }
            Jacobian::Banded(a) => BandedLu::factorize(a).map(Factorization::Banded),
        }
    }
}

impl fmt::Display for Jacobian {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Jacobian::Dense(a) => write!(f, "{}", a),
            Jacobian::Banded(a) => write!(f, "{}", a),
        }
    }
}

/// Factored form of a scaled Jacobian
pub enum Factorization {
    Dense(nalgebra::linalg::LU<f64, nalgebra::Dyn, nalgebra::Dyn>),
    Banded(BandedLu),
}

impl Factorization {
    /// Solve `A x = b` against the stored factorization
    pub fn solve(&self, b: &nalgebra::DVector<f64>) -> Option<nalgebra::DVector<f64>> {
        match self {
            Factorization::Dense(lu) => lu.solve(b),
            Factorization::Banded(lu) => Some(lu.solve(b)),
        }
    }
}

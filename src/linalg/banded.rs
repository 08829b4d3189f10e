use std::fmt;

extern crate nalgebra;

use super::SingularMatrix;

/// Banded matrix in compact LINPACK-style storage.
///
/// The logical element at row `i`, column `j` (0-based, with
/// `j - mu <= i <= j + ml`) is stored at `[mu + i - j, j]` inside a
/// `(ml + mu + 1) x n` array. The mapping is a bijection between the band
/// and the used part of the storage; everything outside the band is
/// rejected by the accessors rather than silently dropped, as misplaced
/// offsets are the usual transcription bug with this layout.
#[derive(Debug, Clone, PartialEq)]
pub struct BandedMatrix {
    n: usize,
    ml: usize,
    mu: usize,
    data: nalgebra::DMatrix<f64>,
}

impl BandedMatrix {
    /// Zero-initialized band of dimension `n` with `ml` subdiagonals and
    /// `mu` superdiagonals
    pub fn zeros(n: usize, ml: usize, mu: usize) -> Self {
        BandedMatrix {
            n,
            ml,
            mu,
            data: nalgebra::DMatrix::zeros(ml + mu + 1, n),
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn ml(&self) -> usize {
        self.ml
    }

    pub fn mu(&self) -> usize {
        self.mu
    }

    /// Number of stored rows, `ml + mu + 1`
    pub fn bandwidth(&self) -> usize {
        self.ml + self.mu + 1
    }

    pub fn in_band(&self, i: usize, j: usize) -> bool {
        i + self.mu >= j && i <= j + self.ml
    }

    /// Storage row of the logical element `(i, j)`, if it lies in the band
    pub fn storage_row(&self, i: usize, j: usize) -> Option<usize> {
        if self.in_band(i, j) {
            Some(self.mu + i - j)
        } else {
            None
        }
    }

    /// Logical row stored at `(r, j)`, if that slot is used
    pub fn logical_row(&self, r: usize, j: usize) -> Option<usize> {
        if r < self.bandwidth() && j + r >= self.mu && j + r < self.mu + self.n {
            Some(j + r - self.mu)
        } else {
            None
        }
    }

    /// Logical rows covered by column `j`, as a half-open range
    pub fn column_support(&self, j: usize) -> std::ops::Range<usize> {
        let start = j.saturating_sub(self.mu);
        let end = (j + self.ml + 1).min(self.n);
        start..end
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        match self.storage_row(i, j) {
            Some(r) => self.data[(r, j)],
            None => 0.0,
        }
    }

    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        match self.storage_row(i, j) {
            Some(r) => self.data[(r, j)] = value,
            None => panic!(
                "element ({}, {}) lies outside the band (ml = {}, mu = {})",
                i, j, self.ml, self.mu
            ),
        }
    }

    pub fn fill_zero(&mut self) {
        self.data.fill(0.0);
    }

    /// Maximum absolute value of the in-band slice of logical row `i`
    pub fn row_abs_max(&self, i: usize) -> f64 {
        let mut max = 0.0f64;
        let start = i.saturating_sub(self.ml);
        let end = (i + self.mu + 1).min(self.n);
        for j in start..end {
            max = max.max(self.get(i, j).abs());
        }
        max
    }

    /// Left-multiply by `diag(fw)`
    pub fn scale_rows(&mut self, fw: &nalgebra::DVector<f64>) {
        for j in 0..self.n {
            for i in self.column_support(j) {
                let r = self.mu + i - j;
                self.data[(r, j)] *= fw[i];
            }
        }
    }

    /// Right-multiply by `diag(xw)`
    pub fn scale_columns(&mut self, xw: &nalgebra::DVector<f64>) {
        for j in 0..self.n {
            for r in 0..self.bandwidth() {
                self.data[(r, j)] *= xw[j];
            }
        }
    }

    /// Matrix-vector product restricted to the band
    pub fn mul_vec(&self, v: &nalgebra::DVector<f64>) -> nalgebra::DVector<f64> {
        let mut out = nalgebra::DVector::zeros(self.n);
        for j in 0..self.n {
            for i in self.column_support(j) {
                out[i] += self.get(i, j) * v[j];
            }
        }
        out
    }

    /// Dense copy, for diagnostics and tests
    pub fn to_dense(&self) -> nalgebra::DMatrix<f64> {
        let mut out = nalgebra::DMatrix::zeros(self.n, self.n);
        for j in 0..self.n {
            for i in self.column_support(j) {
                out[(i, j)] = self.get(i, j);
            }
        }
        out
    }
}

impl fmt::Display for BandedMatrix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Banded matrix n = {}, ml = {}, mu = {}\n{}",
            self.n,
            self.ml,
            self.mu,
            self.to_dense()
        )
    }
}

/// LU factorization of a banded matrix with partial pivoting.
///
/// The factorization works on a padded `(2 ml + mu + 1) x n` array: the band
/// is copied to the bottom `ml + mu + 1` rows and the top `ml` rows receive
/// the fill-in produced by row interchanges, exactly as in the LINPACK
/// routines DGBFA and DGBSL.
#[derive(Debug, Clone)]
pub struct BandedLu {
    n: usize,
    ml: usize,
    mu: usize,
    abd: nalgebra::DMatrix<f64>,
    ipvt: Vec<usize>,
}

impl BandedLu {
    /// Factorize `a`; fails on a zero pivot
    pub fn factorize(a: &BandedMatrix) -> Result<Self, SingularMatrix> {
        let n = a.n();
        let ml = a.ml();
        let mu = a.mu();
        let m = ml + mu;
        let mut abd = nalgebra::DMatrix::zeros(2 * ml + mu + 1, n);
        for j in 0..n {
            for i in a.column_support(j) {
                abd[(m + i - j, j)] = a.get(i, j);
            }
        }

        let mut ipvt = vec![0usize; n];
        let mut ju = 0usize;
        for k in 0..n {
            let lm = ml.min(n - 1 - k);

            // partial pivoting within the column
            let mut l = m;
            let mut amax = abd[(m, k)].abs();
            for i in 1..=lm {
                let v = abd[(m + i, k)].abs();
                if v > amax {
                    amax = v;
                    l = m + i;
                }
            }
            ipvt[k] = l + k - m;
            if abd[(l, k)] == 0.0 {
                return Err(SingularMatrix);
            }
            if k == n - 1 {
                break;
            }

            if l != m {
                abd.swap((l, k), (m, k));
            }
            let t = -1.0 / abd[(m, k)];
            for i in 1..=lm {
                abd[(m + i, k)] *= t;
            }

            // row elimination with column indexing shifted by the pivot
            ju = ju.max(mu + ipvt[k] + 1).min(n);
            let mut ll = l;
            let mut mm = m;
            for j in (k + 1)..ju {
                ll -= 1;
                mm -= 1;
                let t = abd[(ll, j)];
                if ll != mm {
                    abd[(ll, j)] = abd[(mm, j)];
                    abd[(mm, j)] = t;
                }
                for i in 1..=lm {
                    abd[(mm + i, j)] += t * abd[(m + i, k)];
                }
            }
        }

        Ok(BandedLu {
            n,
            ml,
            mu,
            abd,
            ipvt,
        })
    }

    /// Back-substitution for `A x = b`; `b` is overwritten with the solution
    pub fn solve_in_place(&self, b: &mut nalgebra::DVector<f64>) {
        let n = self.n;
        let m = self.ml + self.mu;

        if self.ml > 0 {
            for k in 0..n.saturating_sub(1) {
                let lm = self.ml.min(n - 1 - k);
                let l = self.ipvt[k];
                let t = b[l];
                if l != k {
                    b[l] = b[k];
                    b[k] = t;
                }
                for i in 1..=lm {
                    b[k + i] += t * self.abd[(m + i, k)];
                }
            }
        }

        for k in (0..n).rev() {
            b[k] /= self.abd[(m, k)];
            let lm = k.min(m);
            let t = -b[k];
            for i in 1..=lm {
                b[k - i] += t * self.abd[(m - i, k)];
            }
        }
    }

    pub fn solve(&self, b: &nalgebra::DVector<f64>) -> nalgebra::DVector<f64> {
        let mut x = b.clone();
        self.solve_in_place(&mut x);
        x
    }
}

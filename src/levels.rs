//! Level functions
//!
//! Three quantities summarize an iteration step for the damping logic:
//! - `conv`, the scaled maximum norm of the last unrelaxed correction;
//! - `sumx`, the scaled natural level `||dx||^2`, the Lyapunov quantity of
//!   the monotonicity test;
//! - `dlevf`, the standard level, the RMS norm of the residual F(x).

extern crate nalgebra;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Levels {
    pub conv: f64,
    pub sumx: f64,
    pub dlevf: f64,
}

/// Evaluate the level functions from a scaled correction `dx1` and the
/// residual `f` at the same point
pub fn evaluate(dx1: &nalgebra::DVector<f64>, f: &nalgebra::DVector<f64>) -> Levels {
    Levels {
        conv: dx1.amax(),
        sumx: dx1.norm_squared(),
        dlevf: rms(f),
    }
}

/// Root-mean-square norm, `||v||_2 / sqrt(n)`
pub fn rms(v: &nalgebra::DVector<f64>) -> f64 {
    (v.norm_squared() / v.len() as f64).sqrt()
}

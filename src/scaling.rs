//! Iterate and row scaling
//!
//! The damping heuristics reason about corrections in a scaled space: every
//! component is divided by a weight `xw[i]` that tracks the magnitude of the
//! corresponding unknown. The weights are rebuilt at each iteration from the
//! user scale and the two latest iterates, and are kept inside the safe
//! window `[small, great]` so that scaled divisions can never overflow.
//!
//! Row scaling equilibrates the Jacobian before factorization so that an
//! ill-scaled equation cannot distort the pivot choice.

extern crate nalgebra;

use crate::errors::SolverError;
use crate::linalg::Jacobian;
use crate::machine::MachineConsts;

/// Precondition the user scaling vector in place.
///
/// Zero entries are replaced by `default_scale`, entries outside the safe
/// window are clamped, and negative entries are rejected. The solver state
/// is untouched on rejection.
pub fn precondition_user_scaling(
    xscal: &mut nalgebra::DVector<f64>,
    default_scale: f64,
    machine: &MachineConsts,
) -> Result<(), SolverError> {
    for (index, value) in xscal.iter().enumerate() {
        if *value < 0.0 {
            return Err(SolverError::InvalidScaling {
                index,
                value: *value,
            });
        }
    }
    for value in xscal.iter_mut() {
        if *value == 0.0 {
            *value = default_scale;
        }
        if *value < machine.small {
            tracing::warn!(scale = *value, "user scale below safe minimum, raised");
            *value = machine.small;
        } else if *value > machine.great {
            tracing::warn!(scale = *value, "user scale above safe maximum, lowered");
            *value = machine.great;
        }
    }
    Ok(())
}

/// Build the iteration scaling vector `xw` from the user scale and the two
/// latest iterates.
///
/// Each weight is the user lower bound or the midpoint magnitude
/// `(|x| + |xa|) / 2` of the unknown, whichever is larger, floored at
/// `small` and capped at `great`.
pub fn scaling_vector(
    xscal: &nalgebra::DVector<f64>,
    x: &nalgebra::DVector<f64>,
    xa: &nalgebra::DVector<f64>,
    machine: &MachineConsts,
) -> nalgebra::DVector<f64> {
    nalgebra::DVector::from_fn(xscal.len(), |i, _| {
        let midpoint = 0.5 * (x[i].abs() + xa[i].abs());
        xscal[i]
            .max(midpoint.max(machine.small))
            .min(machine.great)
    })
}

/// Row-equilibration weights `fw` for the Jacobian: the reciprocal of each
/// row's maximum absolute element, or 1 for an all-zero row (dense rows, or
/// the in-band slice for banded storage).
pub fn row_scaling_vector(jac: &Jacobian) -> nalgebra::DVector<f64> {
    nalgebra::DVector::from_fn(jac.n(), |i, _| {
        let row_max = jac.row_abs_max(i);
        if row_max > 0.0 {
            1.0 / row_max
        } else {
            1.0
        }
    })
}

//! Jacobian evaluation kernels
//!
//! Four finite-difference approximations are provided: dense and banded,
//! each either with a fixed relative perturbation or with the
//! feedback-controlled variant that adapts a per-component denominator
//! difference `eta` to the observed cancellation noise. The banded kernels
//! perturb whole column groups of stride `ml + mu + 1` in a single model
//! evaluation, which is exact because the row supports of the grouped
//! columns are disjoint.
//!
//! All kernels restore `x` on exit, return the number of model evaluations
//! performed, and abort the sweep on the first failed evaluation.

extern crate nalgebra;

use crate::errors::EvaluationFailure;
use crate::linalg::Jacobian;
use crate::machine::MachineConsts;
use crate::model::Problem;

/// `conv` threshold below which a column is accepted without a feedback
/// retry: close to convergence, loss of difference precision is tolerated
const CONV_TOLERATED: f64 = 1.0e-1;

fn signum1(value: f64) -> f64 {
    if value < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// Fill `jac` from the analytic Jacobian of the model
pub fn analytic<M>(
    model: &mut M,
    x: &nalgebra::DVector<f64>,
    jac: &mut Jacobian,
) -> Result<(), EvaluationFailure>
where
    M: Problem,
{
    jac.fill_zero();
    model.jacobian(x, jac)
}

/// Dense forward differences with a fixed relative perturbation
pub fn forward_difference_dense<M>(
    model: &mut M,
    x: &mut nalgebra::DVector<f64>,
    f: &nalgebra::DVector<f64>,
    xw: &nalgebra::DVector<f64>,
    jac: &mut Jacobian,
    machine: &MachineConsts,
) -> Result<usize, EvaluationFailure>
where
    M: Problem,
{
    let n = x.len();
    let mut fu = nalgebra::DVector::zeros(n);
    let mut evals = 0;
    for k in 0..n {
        let xk = x[k];
        let u = signum1(xk) * xk.abs().max(machine.ajmin()).max(xw[k]) * machine.ajdel();
        x[k] = xk + u;
        let result = model.evaluate(x, &mut fu);
        x[k] = xk;
        evals += 1;
        result?;
        for i in 0..n {
            jac.set(i, k, (fu[i] - f[i]) / u);
        }
    }
    Ok(evals)
}

/// Banded forward differences with a fixed relative perturbation; one model
/// evaluation per column group
pub fn forward_difference_banded<M>(
    model: &mut M,
    x: &mut nalgebra::DVector<f64>,
    f: &nalgebra::DVector<f64>,
    xw: &nalgebra::DVector<f64>,
    jac: &mut Jacobian,
    machine: &MachineConsts,
) -> Result<usize, EvaluationFailure>
where
    M: Problem,
{
    let banded = match jac {
        Jacobian::Banded(a) => a,
        Jacobian::Dense(_) => panic!("banded differencing requires banded storage"),
    };
    let n = x.len();
    let stride = banded.bandwidth();
    let mut fu = nalgebra::DVector::zeros(n);
    let mut perturbations = vec![0.0f64; n];
    let mut evals = 0;

    for group in 0..stride.min(n) {
        for k in (group..n).step_by(stride) {
            let xk = x[k];
            let u = signum1(xk) * xk.abs().max(machine.ajmin()).max(xw[k]) * machine.ajdel();
            perturbations[k] = u;
            x[k] = xk + u;
        }
        let result = model.evaluate(x, &mut fu);
        for k in (group..n).step_by(stride) {
            x[k] -= perturbations[k];
        }
        evals += 1;
        result?;
        for k in (group..n).step_by(stride) {
            for i in banded.column_support(k) {
                banded.set(i, k, (fu[i] - f[i]) / perturbations[k]);
            }
        }
    }
    Ok(evals)
}

/// Relative discretization-error estimator of one column: the RMS of the
/// componentwise relative differences between `f` and the perturbed `fu`
fn relative_difference(
    f: &nalgebra::DVector<f64>,
    fu: &nalgebra::DVector<f64>,
    rows: std::ops::Range<usize>,
) -> f64 {
    let n = f.len();
    let mut sum = 0.0;
    for i in rows {
        let denom = f[i].abs().max(fu[i].abs());
        if denom > 0.0 {
            let term = (fu[i] - f[i]) / denom;
            sum += term * term;
        }
    }
    (sum / n as f64).sqrt()
}

/// Dense forward differences with feedback-controlled perturbations.
///
/// After each column the estimator `sumd` is compared against the noise
/// model; a column whose differences drown in roundoff is retried once with
/// `eta` rescaled towards the target `etadif`.
pub fn adaptive_difference_dense<M>(
    model: &mut M,
    x: &mut nalgebra::DVector<f64>,
    f: &nalgebra::DVector<f64>,
    xw: &nalgebra::DVector<f64>,
    eta: &mut nalgebra::DVector<f64>,
    conv: f64,
    jac: &mut Jacobian,
    machine: &MachineConsts,
) -> Result<usize, EvaluationFailure>
where
    M: Problem,
{
    let n = x.len();
    let etamin = machine.etamin();
    let etamax = machine.etamax();
    let etadif = machine.etadif();
    let mut fu = nalgebra::DVector::zeros(n);
    let mut evals = 0;

    for k in 0..n {
        let mut retried = false;
        loop {
            let xk = x[k];
            let u = signum1(xk) * eta[k] * xk.abs().max(xw[k]);
            x[k] = xk + u;
            let result = model.evaluate(x, &mut fu);
            x[k] = xk;
            evals += 1;
            result?;
            for i in 0..n {
                jac.set(i, k, (fu[i] - f[i]) / u);
            }

            let sumd = relative_difference(f, &fu, 0..n);
            let qfine = conv < CONV_TOLERATED || sumd >= etamin;
            if sumd > 0.0 {
                eta[k] = ((etadif / sumd).sqrt() * eta[k]).clamp(etamin, etamax);
            }
            if qfine || retried || sumd == 0.0 {
                break;
            }
            retried = true;
        }
    }
    Ok(evals)
}

/// Banded forward differences with feedback-controlled perturbations.
///
/// Column groups are evaluated together as in the plain banded kernel; the
/// feedback estimator is formed on the in-band slice of each column, and
/// only the columns needing refinement take part in the retry evaluation.
pub fn adaptive_difference_banded<M>(
    model: &mut M,
    x: &mut nalgebra::DVector<f64>,
    f: &nalgebra::DVector<f64>,
    xw: &nalgebra::DVector<f64>,
    eta: &mut nalgebra::DVector<f64>,
    conv: f64,
    jac: &mut Jacobian,
    machine: &MachineConsts,
) -> Result<usize, EvaluationFailure>
where
    M: Problem,
{
    let banded = match jac {
        Jacobian::Banded(a) => a,
        Jacobian::Dense(_) => panic!("banded differencing requires banded storage"),
    };
    let n = x.len();
    let stride = banded.bandwidth();
    let etamin = machine.etamin();
    let etamax = machine.etamax();
    let etadif = machine.etadif();
    let mut fu = nalgebra::DVector::zeros(n);
    let mut perturbations = vec![0.0f64; n];
    let mut evals = 0;

    for group in 0..stride.min(n) {
        let mut active: Vec<usize> = (group..n).step_by(stride).collect();
        let mut retry_pass = false;
        while !active.is_empty() {
            for &k in &active {
                let xk = x[k];
                let u = signum1(xk) * eta[k] * xk.abs().max(xw[k]);
                perturbations[k] = u;
                x[k] = xk + u;
            }
            let result = model.evaluate(x, &mut fu);
            for &k in &active {
                x[k] -= perturbations[k];
            }
            evals += 1;
            result?;

            let mut retry = Vec::new();
            for &k in &active {
                for i in banded.column_support(k) {
                    banded.set(i, k, (fu[i] - f[i]) / perturbations[k]);
                }
                let sumd = relative_difference(f, &fu, banded.column_support(k));
                let qfine = conv < CONV_TOLERATED || sumd >= etamin;
                if sumd > 0.0 {
                    eta[k] = ((etadif / sumd).sqrt() * eta[k]).clamp(etamin, etamax);
                }
                if !qfine && !retry_pass && sumd > 0.0 {
                    retry.push(k);
                }
            }
            active = retry;
            retry_pass = true;
        }
    }
    Ok(evals)
}

//! Core iteration engine
//!
//! One Newton step interleaves the phases described by Deuflhard for the
//! affine-invariant damped iteration: Jacobian generation (fresh evaluation
//! or Broyden rank-1 update), row/column scaling and factorization, the
//! unrelaxed correction, the damping-factor predictor, the corrector loop
//! retrying trial steps against the natural monotonicity test, and finally
//! the commit together with the rank-1 decision for the next step.
//!
//! ## Reference
//!
//! P. Deuflhard (2004),
//! Newton Methods for Nonlinear Problems. Affine Invariance and Adaptive
//! Algorithms, Springer Series in Computational Mathematics 35,
//! doi:10.1007/978-3-642-23899-4

extern crate nalgebra;

use crate::errors::SolverError;
use crate::jacobian;
use crate::levels;
use crate::linalg::{Factorization, Jacobian, SingularMatrix};
use crate::model::Problem;
use crate::scaling;

use super::options::{JacobianMethod, ResolvedOptions, SolverOptions, Storage};
use super::stats::SolverStats;

/// Backstop for the damping retry loop; the damping floor terminates the
/// loop long before this on any sane configuration
const MAX_CORRECTOR_STEPS: usize = 32;

/// Outcome of one [NewtonSolver::solve] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// The scaled correction met the tolerance
    Converged,
    /// Successive-call mode only: the iteration budget of this call is
    /// spent, call `solve` again to resume
    Continue,
}

/// Solution and statistics of a completed resolution
#[derive(Debug, Clone)]
pub struct Solution {
    pub x: nalgebra::DVector<f64>,
    pub stats: SolverStats,
}

/// Mutable per-resolution state, persisted across successive calls
struct Workspace {
    x: nalgebra::DVector<f64>,
    xa: nalgebra::DVector<f64>,
    f: nalgebra::DVector<f64>,
    fa: nalgebra::DVector<f64>,
    xw: nalgebra::DVector<f64>,
    fw: nalgebra::DVector<f64>,
    eta: nalgebra::DVector<f64>,
    /// Current unrelaxed correction (descaled)
    dxq: nalgebra::DVector<f64>,
    /// Unrelaxed correction of the previous iteration
    dxqa: nalgebra::DVector<f64>,
    /// Simplified correction of the last accepted trial
    dx_bar: nalgebra::DVector<f64>,
    conv: f64,
    dlevf: f64,
    fc: f64,
    fca: f64,
    fc_pri: f64,
    dmy_cor: f64,
    /// Consecutive rank-1 updates baked into the stored Jacobian; bounds
    /// how long a Broyden approximation may drift from a fresh evaluation
    nnew: usize,
    jac: Option<Jacobian>,
    fact: Option<Factorization>,
    rank1_next: bool,
    fc_carry: Option<f64>,
    force_fresh: bool,
    initialized: bool,
    converged: bool,
}

/// Affine-invariant damped Newton solver.
///
/// The solver owns the iterate and every piece of iteration state, so a
/// resolution can be chunked: with
/// [successive mode](crate::SolverOptions::successive) enabled, `solve`
/// returns [SolveStatus::Continue] whenever the per-call iteration budget
/// is exhausted and resumes exactly where it stopped on the next call.
///
/// ## Examples
/// ```
/// use damped_newton as dn;
///
/// fn powers(x: &nalgebra::DVector<f64>, f: &mut nalgebra::DVector<f64>) {
///     f[0] = x[0] * x[0] + x[1] - 3.0;
///     f[1] = x[0] - x[1];
/// }
///
/// let mut model = dn::model::ProblemFromFunction::new(2, powers);
/// let x0 = nalgebra::DVector::from_vec(vec![2.0, 0.5]);
/// let scale = nalgebra::DVector::from_element(2, 1.0);
///
/// let mut solver = dn::solver::NewtonSolver::new(x0, scale, &dn::SolverOptions::default()).unwrap();
/// let status = solver.solve(&mut model).unwrap();
/// assert_eq!(status, dn::solver::SolveStatus::Converged);
/// assert!((solver.solution()[0] - solver.solution()[1]).abs() < 1e-6);
/// ```
pub struct NewtonSolver {
    opts: ResolvedOptions,
    ws: Workspace,
    stats: SolverStats,
}

impl NewtonSolver {
    /// Validate the inputs and set up the workspace.
    ///
    /// The user scaling vector is preconditioned here: negative entries are
    /// rejected, zero entries fall back to the class-dependent default, and
    /// out-of-window values are clamped.
    pub fn new(
        x0: nalgebra::DVector<f64>,
        xscal: nalgebra::DVector<f64>,
        options: &SolverOptions,
    ) -> Result<Self, SolverError> {
        let n = x0.len();
        let opts = options.resolve(n)?;
        if xscal.len() != n {
            return Err(SolverError::InvalidDimension(format!(
                "xscal.len() = {} and x0.len() = {}",
                xscal.len(),
                n
            )));
        }

        let mut xscal = xscal;
        scaling::precondition_user_scaling(&mut xscal, opts.default_scale(), &opts.machine)?;

        let mut stats = SolverStats::new(n, opts.max_iterations);
        stats.rtol = opts.rtol;
        stats.x_scal = xscal;

        let fc = if opts.ordinary_newton {
            1.0
        } else {
            opts.fc_start
        };
        let ws = Workspace {
            xa: x0.clone(),
            x: x0,
            f: nalgebra::DVector::zeros(n),
            fa: nalgebra::DVector::zeros(n),
            xw: nalgebra::DVector::from_element(n, 1.0),
            fw: nalgebra::DVector::from_element(n, 1.0),
            eta: nalgebra::DVector::from_element(n, opts.machine.etaini()),
            dxq: nalgebra::DVector::zeros(n),
            dxqa: nalgebra::DVector::zeros(n),
            dx_bar: nalgebra::DVector::zeros(n),
            conv: opts.machine.great,
            dlevf: 0.0,
            fc,
            fca: fc,
            fc_pri: fc,
            dmy_cor: 0.0,
            nnew: 0,
            jac: None,
            fact: None,
            rank1_next: false,
            fc_carry: None,
            force_fresh: false,
            initialized: false,
            converged: false,
        };

        Ok(NewtonSolver { opts, ws, stats })
    }

    /// Current iterate; the solution after a converged resolution
    pub fn solution(&self) -> &nalgebra::DVector<f64> {
        &self.ws.x
    }

    pub fn stats(&self) -> &SolverStats {
        &self.stats
    }

    pub fn into_solution(self) -> Solution {
        Solution {
            x: self.ws.x,
            stats: self.stats,
        }
    }

    /// Run the damped Newton iteration on `model`.
    ///
    /// Returns [SolveStatus::Converged] on success. In successive mode an
    /// exhausted iteration budget yields [SolveStatus::Continue] instead of
    /// the [SolverError::IterationsExceeded] error.
    pub fn solve<M>(&mut self, model: &mut M) -> Result<SolveStatus, SolverError>
    where
        M: Problem,
    {
        let n = self.ws.x.len();
        if model.len_problem() != n {
            return Err(SolverError::InvalidDimension(format!(
                "model.len_problem() = {} and x0.len() = {}",
                model.len_problem(),
                n
            )));
        }
        if self.opts.jacobian == JacobianMethod::Analytic && !model.jacobian_provided() {
            return Err(SolverError::MissingJacobian);
        }
        if self.ws.converged {
            return Ok(SolveStatus::Converged);
        }

        if !self.ws.initialized {
            model.evaluate(&self.ws.x, &mut self.ws.f)?;
            self.stats.n_fcn += 1;
            self.ws.dlevf = levels::rms(&self.ws.f);
            self.stats.x_iter.push(self.ws.x.clone());
            self.ws.initialized = true;
        }

        let mut iters_this_call = 0usize;

        'iteration: loop {
            // Phase A: scaling, Jacobian, factorization. A simplified
            // Newton iteration keeps the factorization (and with it the
            // scaling) of the starting point.
            let reuse = self.opts.simplified_newton && self.ws.fact.is_some();
            if !reuse {
                self.ws.xw = if self.opts.fixed_scaling {
                    self.stats.x_scal.clone()
                } else {
                    scaling::scaling_vector(
                        &self.stats.x_scal,
                        &self.ws.x,
                        &self.ws.xa,
                        &self.opts.machine,
                    )
                };

                let fresh =
                    self.ws.force_fresh || !self.ws.rank1_next || self.ws.jac.is_none();
                self.ws.rank1_next = false;
                if fresh {
                    self.evaluate_fresh_jacobian(model)?;
                } else {
                    let s = &self.ws.x - &self.ws.xa;
                    let y = &self.ws.f - &self.ws.fa;
                    let jac = self.ws.jac.as_mut().expect("jacobian present");
                    if jac.broyden_update(&s, &y, self.opts.machine.small) {
                        self.ws.nnew += 1;
                        tracing::trace!(consecutive = self.ws.nnew, "rank-1 update");
                    } else {
                        self.evaluate_fresh_jacobian(model)?;
                    }
                }

                let mut scaled = self.ws.jac.as_ref().expect("jacobian present").clone();
                self.ws.fw = if self.opts.no_row_scaling {
                    nalgebra::DVector::from_element(n, 1.0)
                } else {
                    scaling::row_scaling_vector(&scaled)
                };
                if !self.opts.no_row_scaling {
                    scaled.scale_rows(&self.ws.fw);
                }
                scaled.scale_columns(&self.ws.xw);

                match scaled.factorize() {
                    Ok(fact) => self.ws.fact = Some(fact),
                    Err(SingularMatrix) => {
                        if self.ws.nnew > 0 {
                            // an updated matrix went singular; retry the
                            // step from a fresh Jacobian
                            self.ws.force_fresh = true;
                            continue 'iteration;
                        }
                        return Err(SolverError::SingularJacobian);
                    }
                }
            }

            // Phase B: unrelaxed Newton correction and level functions
            let rhs =
                nalgebra::DVector::from_fn(n, |i, _| -self.ws.fw[i] * self.ws.f[i]);
            let dx1 = self
                .ws
                .fact
                .as_ref()
                .expect("factorization present")
                .solve(&rhs)
                .ok_or(SolverError::SingularJacobian)?;
            self.ws.dxq = dx1.component_mul(&self.ws.xw);
            let current = levels::evaluate(&dx1, &self.ws.f);
            self.ws.conv = current.conv;
            self.ws.dlevf = current.dlevf;
            let sumx = current.sumx;

            if self.opts.ordinary_newton {
                match self.ordinary_step(model, sumx, &mut iters_this_call)? {
                    Some(status) => return Ok(status),
                    None => continue 'iteration,
                }
            }

            // Phase C: the unrelaxed correction may already meet the
            // tolerance (the iterate sits on the root); applying it is then
            // the whole step and the damping machinery has nothing to test.
            // The iteration is counted like any other, so the Jacobian
            // evaluated above stays covered by the counter identities.
            let precision_pre = (sumx / n as f64).sqrt();
            if precision_pre <= self.opts.rtol {
                let x_final = &self.ws.x + &self.ws.dxq;
                let mut f_final = nalgebra::DVector::zeros(n);
                model.evaluate(&x_final, &mut f_final)?;
                self.stats.n_fcn += 1;
                self.ws.x = x_final;
                self.ws.f = f_final;
                self.ws.dlevf = levels::rms(&self.ws.f);

                self.stats.n_iter += 1;
                self.stats.natural_levels.push(sumx);
                self.stats.simplified_levels.push(sumx);
                self.stats.standard_levels.push(self.ws.dlevf);
                self.stats.precisions.push(precision_pre);
                self.stats.damping_factors.push(1.0);
                self.stats.achieved_precision = precision_pre;
                self.stats.x_iter.push(self.ws.x.clone());
                tracing::debug!(
                    iteration = self.stats.n_iter,
                    precision = precision_pre,
                    "converged on the unrelaxed correction"
                );
                self.ws.converged = true;
                return Ok(SolveStatus::Converged);
            }

            // Phase D: damping-factor predictor
            let mut fc = if let Some(carried) = self.ws.fc_carry.take() {
                carried
            } else if self.stats.n_iter >= 1 {
                self.predict_damping(&dx1, sumx)
            } else {
                self.ws.fc
            };

            // Phase E: corrector loop with the natural monotonicity test
            let mut corrector_steps = 0usize;
            let (x_trial, f_trial, dx1_bar, sumx_bar, fc_used) = 'corrector: loop {
                let x_trial = &self.ws.x + &self.ws.dxq * fc;
                let mut f_trial = nalgebra::DVector::zeros(n);
                model.evaluate(&x_trial, &mut f_trial)?;
                self.stats.n_fcn += 1;

                let rhs_bar =
                    nalgebra::DVector::from_fn(n, |i, _| -self.ws.fw[i] * f_trial[i]);
                let dx1_bar = self
                    .ws
                    .fact
                    .as_ref()
                    .expect("factorization present")
                    .solve(&rhs_bar)
                    .ok_or(SolverError::SingularJacobian)?;
                let sumx_bar = dx1_bar.norm_squared();

                if sumx_bar <= sumx {
                    let mu_bar = self.a_posteriori(fc, sumx, &dx1_bar, &dx1);
                    self.ws.dmy_cor = mu_bar;
                    if fc < 1.0 && corrector_steps == 0 && mu_bar >= self.opts.sigma2 * fc
                    {
                        // a-posteriori estimate allows a much larger step;
                        // redo the trial once with the increased factor
                        fc = mu_bar.min(1.0);
                        self.stats.n_corr += 1;
                        corrector_steps += 1;
                        tracing::trace!(fc, "corrector increase");
                        continue 'corrector;
                    }
                    break 'corrector (x_trial, f_trial, dx1_bar, sumx_bar, fc);
                }

                if self.ws.nnew > 0 {
                    // a rank-1 based step is not retried with smaller
                    // damping; the iteration restarts from a fresh Jacobian
                    self.stats.n_rej_rank1 += 1;
                    self.ws.force_fresh = true;
                    self.ws.fc_carry = Some((0.5 * fc).max(self.opts.fc_min));
                    tracing::trace!(fc, "rank-1 step rejected");
                    continue 'iteration;
                }

                self.stats.n_corr += 1;
                corrector_steps += 1;
                let mu_bar = self.a_posteriori(fc, sumx, &dx1_bar, &dx1);
                self.ws.dmy_cor = mu_bar;
                tracing::trace!(fc, mu_bar, "monotonicity violated");
                if fc <= self.opts.fc_min {
                    return Err(SolverError::DampingFactorTooSmall(self.opts.fc_min));
                }
                if corrector_steps > MAX_CORRECTOR_STEPS {
                    return Err(SolverError::NoMonotoneReduction);
                }
                fc = (0.5 * fc).min(mu_bar).max(self.opts.fc_min);
            };

            // Phase G: accept the step
            self.stats.n_iter += 1;
            iters_this_call += 1;
            let precision = (sumx_bar / n as f64).sqrt();
            let dlevf_new = levels::rms(&f_trial);
            self.stats.natural_levels.push(sumx);
            self.stats.simplified_levels.push(sumx_bar);
            self.stats.standard_levels.push(dlevf_new);
            self.stats.precisions.push(precision);
            self.stats.damping_factors.push(fc_used);
            self.stats.achieved_precision = precision;
            tracing::debug!(
                iteration = self.stats.n_iter,
                fc = fc_used,
                predicted = self.ws.fc_pri,
                natural_level = sumx,
                simplified_level = sumx_bar,
                standard_level = dlevf_new,
                "accepted step"
            );

            let dxq_bar = dx1_bar.component_mul(&self.ws.xw);
            if precision <= self.opts.rtol {
                // apply the final simplified correction
                self.ws.x = &x_trial + &dxq_bar;
                self.stats.x_iter.push(self.ws.x.clone());
                self.ws.converged = true;
                return Ok(SolveStatus::Converged);
            }
            self.stats.x_iter.push(x_trial.clone());

            // Phase F: may the next step reuse this Jacobian?
            self.ws.rank1_next = self.opts.rank1_updates
                && self.ws.nnew < self.opts.max_rank1_steps
                && fc_used >= 1.0
                && self.ws.fca >= 1.0
                && self.ws.dmy_cor >= self.opts.sigma * fc_used
                && self.ws.conv < self.opts.sigma2;

            self.ws.xa = std::mem::replace(&mut self.ws.x, x_trial);
            self.ws.fa = std::mem::replace(&mut self.ws.f, f_trial);
            self.ws.dxqa = self.ws.dxq.clone();
            self.ws.dx_bar = dxq_bar;
            self.ws.fca = fc_used;
            self.ws.fc = fc_used;
            self.ws.dlevf = dlevf_new;

            if iters_this_call >= self.opts.max_iterations {
                if self.opts.successive {
                    return Ok(SolveStatus::Continue);
                }
                return Err(SolverError::IterationsExceeded(self.opts.max_iterations));
            }
        }
    }

    /// One undamped Newton step (ordinary and simplified modes): no
    /// monotonicity test, the full correction is always taken
    fn ordinary_step<M>(
        &mut self,
        model: &mut M,
        sumx: f64,
        iters_this_call: &mut usize,
    ) -> Result<Option<SolveStatus>, SolverError>
    where
        M: Problem,
    {
        let n = self.ws.x.len();
        self.stats.n_iter += 1;
        *iters_this_call += 1;
        let precision = (sumx / n as f64).sqrt();
        self.stats.natural_levels.push(sumx);
        self.stats.simplified_levels.push(sumx);
        self.stats.standard_levels.push(self.ws.dlevf);
        self.stats.precisions.push(precision);
        self.stats.damping_factors.push(1.0);
        self.stats.achieved_precision = precision;
        tracing::debug!(
            iteration = self.stats.n_iter,
            natural_level = sumx,
            "ordinary step"
        );

        let x_new = &self.ws.x + &self.ws.dxq;
        let mut f_new = nalgebra::DVector::zeros(n);
        model.evaluate(&x_new, &mut f_new)?;
        self.stats.n_fcn += 1;
        self.stats.x_iter.push(x_new.clone());

        if precision <= self.opts.rtol {
            self.ws.x = x_new;
            self.ws.f = f_new;
            self.ws.converged = true;
            return Ok(Some(SolveStatus::Converged));
        }

        self.ws.xa = std::mem::replace(&mut self.ws.x, x_new);
        self.ws.fa = std::mem::replace(&mut self.ws.f, f_new);
        self.ws.dxqa = self.ws.dxq.clone();
        self.ws.dlevf = levels::rms(&self.ws.f);

        if *iters_this_call >= self.opts.max_iterations {
            if self.opts.successive {
                return Ok(Some(SolveStatus::Continue));
            }
            return Err(SolverError::IterationsExceeded(self.opts.max_iterations));
        }
        Ok(None)
    }

    /// Evaluate a fresh Jacobian with the configured strategy and reset the
    /// rank-1 bookkeeping
    fn evaluate_fresh_jacobian<M>(&mut self, model: &mut M) -> Result<(), SolverError>
    where
        M: Problem,
    {
        let n = self.ws.x.len();
        let mut jac = match self.ws.jac.take() {
            Some(jac) => jac,
            None => match self.opts.storage {
                Storage::Dense => Jacobian::zeros_dense(n),
                Storage::Banded { ml, mu } => Jacobian::zeros_banded(n, ml, mu),
            },
        };

        let result = match (self.opts.jacobian, jac.is_banded()) {
            (JacobianMethod::Analytic, _) => {
                jacobian::analytic(model, &self.ws.x, &mut jac).map(|()| 0)
            }
            (JacobianMethod::ForwardDifference, false) => jacobian::forward_difference_dense(
                model,
                &mut self.ws.x,
                &self.ws.f,
                &self.ws.xw,
                &mut jac,
                &self.opts.machine,
            ),
            (JacobianMethod::ForwardDifference, true) => jacobian::forward_difference_banded(
                model,
                &mut self.ws.x,
                &self.ws.f,
                &self.ws.xw,
                &mut jac,
                &self.opts.machine,
            ),
            (JacobianMethod::AdaptiveForwardDifference, false) => {
                jacobian::adaptive_difference_dense(
                    model,
                    &mut self.ws.x,
                    &self.ws.f,
                    &self.ws.xw,
                    &mut self.ws.eta,
                    self.ws.conv,
                    &mut jac,
                    &self.opts.machine,
                )
            }
            (JacobianMethod::AdaptiveForwardDifference, true) => {
                jacobian::adaptive_difference_banded(
                    model,
                    &mut self.ws.x,
                    &self.ws.f,
                    &self.ws.xw,
                    &mut self.ws.eta,
                    self.ws.conv,
                    &mut jac,
                    &self.opts.machine,
                )
            }
        };

        match result {
            Ok(evals) => self.stats.n_fcn_jac += evals,
            Err(failure) => {
                // the aborted sweep is accounted as a single failed call
                self.stats.n_fcn_jac += 1;
                return Err(failure.into());
            }
        }

        self.stats.n_jac += 1;
        self.ws.nnew = 0;
        self.ws.force_fresh = false;
        self.ws.jac = Some(jac);
        Ok(())
    }

    /// A-priori damping estimate from the previous step (Deuflhard's [μ]):
    /// the simplified correction carried over from the accepted trial is
    /// compared against the new unrelaxed correction, all in the current
    /// scaling
    fn predict_damping(&mut self, dx1: &nalgebra::DVector<f64>, sumx: f64) -> f64 {
        let n = self.ws.x.len();
        let mut dxqa_norm2 = 0.0;
        let mut dx_bar_norm2 = 0.0;
        let mut diff_norm2 = 0.0;
        for i in 0..n {
            let w = self.ws.xw[i];
            let dxqa = self.ws.dxqa[i] / w;
            let dx_bar = self.ws.dx_bar[i] / w;
            dxqa_norm2 += dxqa * dxqa;
            dx_bar_norm2 += dx_bar * dx_bar;
            let diff = dx_bar - dx1[i];
            diff_norm2 += diff * diff;
        }
        let numerator = self.ws.fca * (dxqa_norm2 * dx_bar_norm2).sqrt();
        let denominator = (diff_norm2 * sumx).sqrt();
        let mu = if denominator > self.opts.machine.small {
            numerator / denominator
        } else {
            self.opts.machine.great
        };
        self.ws.dmy_cor = mu;

        let mut fc = mu.min(1.0);
        if self.opts.bounded_damping {
            fc = fc
                .clamp(
                    self.ws.fca / self.opts.fc_band,
                    self.ws.fca * self.opts.fc_band,
                )
                .min(1.0);
        }
        fc = fc.max(self.opts.fc_min);
        self.ws.fc_pri = fc;
        tracing::trace!(mu, fc, "damping predictor");
        fc
    }

    /// A-posteriori damping estimate (Deuflhard's [μ̄]) from a computed
    /// trial: compares the simplified correction of the trial against the
    /// interpolated unrelaxed correction
    fn a_posteriori(
        &self,
        fc: f64,
        sumx: f64,
        dx1_bar: &nalgebra::DVector<f64>,
        dx1: &nalgebra::DVector<f64>,
    ) -> f64 {
        let mut denom2 = 0.0;
        for i in 0..dx1.len() {
            let term = dx1_bar[i] - (1.0 - fc) * dx1[i];
            denom2 += term * term;
        }
        let denominator = denom2.sqrt();
        if denominator > self.opts.machine.small {
            0.5 * fc * fc * sumx.sqrt() / denominator
        } else {
            self.opts.machine.great
        }
    }
}

/// One-shot resolution: build a [NewtonSolver], iterate to convergence and
/// return the solution with its statistics
pub fn solve<M>(
    model: &mut M,
    x0: nalgebra::DVector<f64>,
    xscal: nalgebra::DVector<f64>,
    options: SolverOptions,
) -> Result<Solution, SolverError>
where
    M: Problem,
{
    let mut options = options;
    options.successive = false;
    let mut solver = NewtonSolver::new(x0, xscal, &options)?;
    solver.solve(model)?;
    Ok(solver.into_solution())
}

use std::fmt;

use crate::errors::SolverError;
use crate::machine::MachineConsts;

/// Problem class driving the damping defaults.
///
/// The classification expresses how far the starting point is expected to
/// lie from the solution relative to the nonlinearity of F: the stronger
/// the nonlinearity, the more cautious the initial damping and the smaller
/// the damping floor.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Nonlinearity {
    /// F is linear; the first undamped step solves the system
    Linear,
    /// Mildly nonlinear, good starting point
    Mild,
    /// Highly nonlinear
    High,
    /// Extremely nonlinear or extremely bad starting point
    Extreme,
}

impl Nonlinearity {
    pub(crate) fn default_fc_start(self) -> f64 {
        match self {
            Nonlinearity::Linear | Nonlinearity::Mild => 1.0,
            Nonlinearity::High => 1.0e-2,
            Nonlinearity::Extreme => 1.0e-4,
        }
    }

    pub(crate) fn default_fc_min(self) -> f64 {
        match self {
            Nonlinearity::Extreme => 1.0e-8,
            _ => 1.0e-4,
        }
    }
}

impl fmt::Display for Nonlinearity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Nonlinearity::Linear => "linear",
            Nonlinearity::Mild => "mildly nonlinear",
            Nonlinearity::High => "highly nonlinear",
            Nonlinearity::Extreme => "extremely nonlinear",
        };
        write!(f, "{}", name)
    }
}

/// How the Jacobian is obtained
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum JacobianMethod {
    /// The model implements [crate::model::Problem::jacobian]
    Analytic,
    /// Forward differences with a fixed relative perturbation
    ForwardDifference,
    /// Forward differences with feedback-controlled perturbations
    AdaptiveForwardDifference,
}

impl fmt::Display for JacobianMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            JacobianMethod::Analytic => "analytic",
            JacobianMethod::ForwardDifference => "forward differences",
            JacobianMethod::AdaptiveForwardDifference => {
                "feedback-controlled forward differences"
            }
        };
        write!(f, "{}", name)
    }
}

/// Jacobian storage mode
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Storage {
    Dense,
    /// Band with `ml` subdiagonals and `mu` superdiagonals
    Banded { ml: usize, mu: usize },
}

/// Whether the damping factor is confined to a multiplicative window around
/// its previous value, preventing oscillating predictions
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BoundedDamping {
    /// Active exactly for extremely nonlinear problems
    Auto,
    On,
    Off,
}

/// Solver configuration.
///
/// Every field has a default; `None` fields resolve against the problem
/// class at solver construction, preserving the historical asymmetric
/// defaults (see [SolverOptions::default]).
#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// Relative tolerance on the scaled RMS norm of the Newton correction.
    /// Clamped into `[10 n eps, 0.1]` with a warning.
    pub rtol: f64,
    /// Problem class, selects the damping defaults
    pub nonlinearity: Nonlinearity,
    /// Jacobian generation strategy
    pub jacobian: JacobianMethod,
    /// Dense or banded Jacobian storage
    pub storage: Storage,
    /// Allow Broyden rank-1 updates of the Jacobian
    pub rank1_updates: bool,
    /// Maximum number of consecutive rank-1 steps; defaults to
    /// `max(ml + mu + 1, 10)` for banded storage and `max(n, 10)` otherwise
    pub max_rank1_steps: Option<usize>,
    /// Ordinary (undamped) Newton iteration
    pub ordinary_newton: bool,
    /// Simplified Newton: the Jacobian of the starting point is kept for
    /// the whole iteration (implies ordinary Newton, excludes rank-1
    /// updates)
    pub simplified_newton: bool,
    /// Bounded-damping strategy
    pub bounded_damping: BoundedDamping,
    /// Bounding factor of the damping window
    pub fc_band: f64,
    /// Initial damping factor; defaults to 1 (linear, mildly nonlinear),
    /// 1e-2 (highly) or 1e-4 (extremely nonlinear)
    pub fc_start: Option<f64>,
    /// Minimum damping factor; defaults to 1e-4, or 1e-8 for extremely
    /// nonlinear problems
    pub fc_min: Option<f64>,
    /// Rank-1 decision threshold; defaults to 3, or to the inhibiting
    /// `10 / fc_min` when rank-1 updates are disabled
    pub sigma: Option<f64>,
    /// Corrector-increase threshold; defaults to the inhibiting
    /// `10 / fc_min`
    pub sigma2: Option<f64>,
    /// Iteration budget of one `solve` call
    pub max_iterations: usize,
    /// Skip the automatic row equilibration of the Jacobian
    pub no_row_scaling: bool,
    /// Successive-call mode: `solve` returns `Continue` instead of an
    /// iteration-limit error and may be called again to resume
    pub successive: bool,
    /// Use the user scaling vector unchanged instead of adapting it to the
    /// iterates
    pub fixed_scaling: bool,
    /// Floating-point field the solver operates in
    pub machine: MachineConsts,
}

impl Default for SolverOptions {
    fn default() -> SolverOptions {
        SolverOptions {
            rtol: 1.0e-6,
            nonlinearity: Nonlinearity::High,
            jacobian: JacobianMethod::ForwardDifference,
            storage: Storage::Dense,
            rank1_updates: false,
            max_rank1_steps: None,
            ordinary_newton: false,
            simplified_newton: false,
            bounded_damping: BoundedDamping::Auto,
            fc_band: 10.0,
            fc_start: None,
            fc_min: None,
            sigma: None,
            sigma2: None,
            max_iterations: 50,
            no_row_scaling: false,
            successive: false,
            fixed_scaling: false,
            machine: MachineConsts::default(),
        }
    }
}

/// Options with every default resolved against the problem, as used by the
/// iteration engine
#[derive(Debug, Clone)]
pub(crate) struct ResolvedOptions {
    pub rtol: f64,
    pub nonlinearity: Nonlinearity,
    pub jacobian: JacobianMethod,
    pub storage: Storage,
    pub rank1_updates: bool,
    pub max_rank1_steps: usize,
    pub ordinary_newton: bool,
    pub simplified_newton: bool,
    pub bounded_damping: bool,
    pub fc_band: f64,
    pub fc_start: f64,
    pub fc_min: f64,
    pub sigma: f64,
    pub sigma2: f64,
    pub max_iterations: usize,
    pub no_row_scaling: bool,
    pub successive: bool,
    pub fixed_scaling: bool,
    pub machine: MachineConsts,
}

impl SolverOptions {
    pub(crate) fn resolve(&self, n: usize) -> Result<ResolvedOptions, SolverError> {
        if n == 0 {
            return Err(SolverError::InvalidDimension(
                "problem dimension must be at least 1".to_string(),
            ));
        }
        if let Storage::Banded { ml, mu } = self.storage {
            if ml >= n || mu >= n {
                return Err(SolverError::InvalidDimension(format!(
                    "bandwidths ml = {}, mu = {} must be smaller than n = {}",
                    ml, mu, n
                )));
            }
        }

        if !self.rtol.is_finite() || self.rtol <= 0.0 {
            return Err(SolverError::InvalidTolerance(self.rtol));
        }
        let rtol_min = 10.0 * n as f64 * self.machine.eps;
        let mut rtol = self.rtol;
        if rtol < rtol_min {
            tracing::warn!(requested = rtol, clamped = rtol_min, "rtol raised");
            rtol = rtol_min;
        } else if rtol > 1.0e-1 {
            tracing::warn!(requested = rtol, clamped = 1.0e-1, "rtol lowered");
            rtol = 1.0e-1;
        }

        // simplified Newton already reuses the Jacobian
        let simplified_newton = self.simplified_newton;
        let ordinary_newton = self.ordinary_newton || simplified_newton;
        let rank1_updates = self.rank1_updates && !simplified_newton;

        let fc_min = match self.fc_min {
            Some(value) if value > 0.0 && value < 1.0 => value,
            Some(_) | None => self.nonlinearity.default_fc_min(),
        };
        let fc_start = match self.fc_start {
            Some(value) if value > 0.0 => value.clamp(fc_min, 1.0),
            Some(_) | None => self.nonlinearity.default_fc_start().max(fc_min),
        };
        let sigma = match self.sigma {
            Some(value) if value >= 1.0 => value,
            Some(_) | None => {
                if rank1_updates {
                    3.0
                } else {
                    10.0 / fc_min
                }
            }
        };
        let sigma2 = match self.sigma2 {
            Some(value) if value >= 1.0 => value,
            Some(_) | None => 10.0 / fc_min,
        };
        let max_rank1_steps = match self.max_rank1_steps {
            Some(value) if value >= 1 => value,
            Some(_) | None => match self.storage {
                Storage::Banded { ml, mu } => (ml + mu + 1).max(10),
                Storage::Dense => n.max(10),
            },
        };
        let bounded_damping = match self.bounded_damping {
            BoundedDamping::Auto => self.nonlinearity == Nonlinearity::Extreme,
            BoundedDamping::On => true,
            BoundedDamping::Off => false,
        };
        let fc_band = self.fc_band.max(1.0);

        Ok(ResolvedOptions {
            rtol,
            nonlinearity: self.nonlinearity,
            jacobian: self.jacobian,
            storage: self.storage,
            rank1_updates,
            max_rank1_steps,
            ordinary_newton,
            simplified_newton,
            bounded_damping,
            fc_band,
            fc_start,
            fc_min,
            sigma,
            sigma2,
            max_iterations: self.max_iterations.max(1),
            no_row_scaling: self.no_row_scaling,
            successive: self.successive,
            fixed_scaling: self.fixed_scaling,
            machine: self.machine,
        })
    }
}

impl ResolvedOptions {
    /// Default replacement for zero entries of the user scaling vector
    pub fn default_scale(&self) -> f64 {
        match self.nonlinearity {
            Nonlinearity::High | Nonlinearity::Extreme => self.rtol,
            _ => 1.0,
        }
    }
}

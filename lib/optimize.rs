//! The sweep optimizer: alternating locally optimal gate updates.
//!
//! One iteration is a full bidirectional sweep. In the right-to-left pass
//! each gate, from last to first, is contracted out of the
//! [`CircuitTensor`], replaced by its locally optimal value derived from the
//! environment matrix at its location, and contracted back in on the other
//! side; the left-to-right pass mirrors this. The tensor therefore always
//! reflects "everything except the gate currently being optimized", so each
//! environment is a single partial trace rather than a full recontraction.
//!
//! The scalar cost is the phase-invariant distance
//! 1 − |Tr(*C* *T*<sup>†</sup>)| / 2<sup>*n*</sup>. Sweeping stops once the
//! cost falls below `dist_tol`, or once the change per iteration drops under
//! `diff_tol_a + diff_tol_r · |cost|` after at least `min_iters` iterations,
//! or at `max_iters`. Every 40 iterations the tensor is rebuilt from scratch
//! to bound accumulated floating-point drift.

use log::{ debug, info };
use ndarray as nd;
use num_complex::Complex64 as C64;
use thiserror::Error;
use crate::gate::Gate;
use crate::tensor::{ CircuitTensor, TensorError, TensorResult };

/// Number of sweep iterations between full tensor rebuilds.
const REINIT_PERIOD: usize = 40;

#[derive(Debug, Error)]
pub enum OptimizeError {
    /// Returned when a difference tolerance is not finite or greater than
    /// 0.5.
    #[error("invalid parameter: difference tolerance must be finite and at most 0.5")]
    InvalidDiffTol,

    /// Returned when the distance tolerance is not finite or greater than
    /// 0.5.
    #[error("invalid parameter: distance tolerance must be finite and at most 0.5")]
    InvalidDistTol,

    /// Returned when the slowdown factor lies outside `[0, 1)`.
    #[error("invalid parameter: slowdown factor must lie in [0, 1)")]
    InvalidSlowdownFactor,

    /// Circuit-tensor construction failure (invalid target or gate
    /// locations).
    #[error(transparent)]
    Tensor(#[from] TensorError),
}
use OptimizeError::*;
pub type OptimizeResult<T> = Result<T, OptimizeError>;

/// Sweep-optimization parameters.
///
/// All fields are public; [`Optimizer::default`] gives the standard
/// tolerances. Parameters are validated when [`Optimizer::run`] is called,
/// before any tensor work begins.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Optimizer {
    /// Absolute termination threshold on the change in cost between
    /// iterations (default 1e-12). A negative value disables the difference
    /// test, running until `max_iters`.
    pub diff_tol_a: f64,
    /// Relative termination threshold on the change in cost between
    /// iterations (default 1e-6).
    pub diff_tol_r: f64,
    /// Terminate immediately once the cost falls to this value (default
    /// 1e-10). A negative value disables early termination.
    pub dist_tol: f64,
    /// Maximum number of sweep iterations (default 100000).
    pub max_iters: usize,
    /// Minimum number of sweep iterations before the difference test applies
    /// (default 1000).
    pub min_iters: usize,
    /// Damping coefficient in `[0, 1)` blending each fresh local optimum
    /// with the previous value (default 0.0).
    pub slowdown_factor: f64,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self {
            diff_tol_a: 1e-12,
            diff_tol_r: 1e-6,
            dist_tol: 1e-10,
            max_iters: 100000,
            min_iters: 1000,
            slowdown_factor: 0.0,
        }
    }
}

impl Optimizer {
    /// Alias for [`Self::default`].
    pub fn new() -> Self { Self::default() }

    /// Set the absolute difference tolerance.
    pub fn with_diff_tol_a(mut self, tol: f64) -> Self {
        self.diff_tol_a = tol;
        self
    }

    /// Set the relative difference tolerance.
    pub fn with_diff_tol_r(mut self, tol: f64) -> Self {
        self.diff_tol_r = tol;
        self
    }

    /// Set the distance tolerance.
    pub fn with_dist_tol(mut self, tol: f64) -> Self {
        self.dist_tol = tol;
        self
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iters(mut self, iters: usize) -> Self {
        self.max_iters = iters;
        self
    }

    /// Set the minimum number of iterations.
    pub fn with_min_iters(mut self, iters: usize) -> Self {
        self.min_iters = iters;
        self
    }

    /// Set the slowdown factor.
    pub fn with_slowdown_factor(mut self, factor: f64) -> Self {
        self.slowdown_factor = factor;
        self
    }

    fn validate(&self) -> OptimizeResult<()> {
        let tol_ok = |t: f64| t.is_finite() && t <= 0.5;
        if !tol_ok(self.diff_tol_a) || !tol_ok(self.diff_tol_r) {
            return Err(InvalidDiffTol);
        }
        if !tol_ok(self.dist_tol) { return Err(InvalidDistTol); }
        if !self.slowdown_factor.is_finite()
            || !(0.0..1.0).contains(&self.slowdown_factor)
        {
            return Err(InvalidSlowdownFactor);
        }
        Ok(())
    }

    /// Optimize the distance between `gates` and `target`, mutating the
    /// gates in place, and return the final cost.
    ///
    /// Fails if any parameter is out of range, if `target` is not unitary
    /// with power-of-two dimension, or if any gate's location does not fit
    /// the target. Hitting `max_iters` without reaching `dist_tol` is not an
    /// error; the returned cost tells the caller whether the fit converged.
    pub fn run(&self, gates: &mut [Gate], target: &nd::Array2<C64>)
        -> OptimizeResult<f64>
    {
        self.validate()?;
        let mut ct = CircuitTensor::new(target.clone(), gates)?;
        let dim = (1_usize << ct.num_qubits()) as f64;
        // seed with the true cost so a zero-iteration run still reports it
        let mut c1: f64 = 1.0 - trace(&ct.unitary()).norm() / dim;
        let mut c2: f64 = c1 + 1.0;
        let mut iters: usize = 0;
        while iters < self.min_iters
            || ((c1 - c2).abs() > self.diff_tol_a + self.diff_tol_r * c1.abs()
                && iters < self.max_iters)
        {
            iters += 1;

            // right-to-left pass
            for gate in gates.iter_mut().rev() {
                ct.apply_right(gate, true);
                if !gate.fixed() {
                    let env = ct.calc_env_matrix(gate.location())?;
                    gate.update(&env, self.slowdown_factor);
                }
                ct.apply_left(gate, false);
            }

            // left-to-right pass
            for gate in gates.iter_mut() {
                ct.apply_left(gate, true);
                if !gate.fixed() {
                    let env = ct.calc_env_matrix(gate.location())?;
                    gate.update(&env, self.slowdown_factor);
                }
                ct.apply_right(gate, false);
            }

            c2 = c1;
            c1 = 1.0 - trace(&ct.unitary()).norm() / dim;

            if c1 <= self.dist_tol {
                debug!("terminated: cost {:e} within distance tolerance", c1);
                return Ok(c1);
            }
            if iters % 100 == 0 { info!("iteration {}, cost {:e}", iters, c1); }
            if iters % REINIT_PERIOD == 0 { ct.reinitialize(gates); }
        }
        if iters >= self.max_iters {
            debug!("terminated: iteration limit reached at cost {:e}", c1);
        } else {
            debug!(
                "terminated: cost difference {:e} within tolerance",
                (c1 - c2).abs(),
            );
        }
        Ok(c1)
    }
}

/// Optimize the distance between `gates` and `target` with the default
/// parameters, mutating the gates in place, and return the final cost.
///
/// See [`Optimizer::run`].
pub fn optimize(gates: &mut [Gate], target: &nd::Array2<C64>)
    -> OptimizeResult<f64>
{
    Optimizer::default().run(gates, target)
}

/// Compute the distance 1 − |Tr(*C* *T*<sup>†</sup>)| / 2<sup>*n*</sup>
/// between the circuit formed by `gates` and `target`, without mutating the
/// gates.
///
/// Zero exactly when the composed circuit equals the target up to a global
/// phase; at most 1 for any unitary inputs.
pub fn get_distance(gates: &[Gate], target: &nd::Array2<C64>)
    -> TensorResult<f64>
{
    let ct = CircuitTensor::new(target.clone(), gates)?;
    let dim = (1_usize << ct.num_qubits()) as f64;
    Ok(1.0 - trace(&ct.unitary()).norm() / dim)
}

fn trace(m: &nd::Array2<C64>) -> C64 { m.diag().sum() }

//! The running contraction of a whole circuit against a target unitary.
//!
//! [`CircuitTensor`] holds the composed operator
//! *G*<sub>m</sub> ⋯ *G*<sub>1</sub> · *T*<sup>†</sup> (each gate embedded
//! into the full *n*-qubit space at its location, *T* the target) as a
//! rank-2*n* tensor with one axis of extent 2 per qubit on each side. Keeping
//! the state in this form makes three local operations cheap:
//!
//! - [`apply_right`][CircuitTensor::apply_right] /
//!   [`apply_left`][CircuitTensor::apply_left] contract a single gate in (or,
//!   with `inverse`, back out) from either end of the circuit by permuting
//!   the gate's axes to the front, reshaping to a matrix, multiplying, and
//!   permuting back;
//! - [`calc_env_matrix`][CircuitTensor::calc_env_matrix] partial-traces
//!   everything but one gate's axes, yielding the environment matrix that
//!   drives [`Gate::update`][crate::gate::Gate::update].
//!
//! Every axis permutation is paired with its exact inverse, so an
//! apply/un-apply cycle reproduces the prior tensor up to floating-point
//! error. [`reinitialize`][CircuitTensor::reinitialize] rebuilds the tensor
//! from scratch to bound the error accumulated over many such cycles.

use ndarray as nd;
use num_complex::Complex64 as C64;
use thiserror::Error;
use crate::dagger;
use crate::gate::Gate;
use crate::validate::{ self, UNITARY_TOL };

#[derive(Debug, Error)]
pub enum TensorError {
    /// Returned when the target matrix is not unitary or not of power-of-two
    /// dimension.
    #[error("error in circuit tensor creation: target matrix is not unitary")]
    InvalidTarget,

    /// Returned when a gate's location does not fit the target's qubit count.
    #[error("error in circuit tensor creation: gate location mismatch")]
    LocationMismatch,

    /// Returned when an environment matrix is requested for an invalid or
    /// out-of-range location.
    #[error("error in environment calculation: invalid location")]
    InvalidLocation,
}
use TensorError::*;
pub type TensorResult<T> = Result<T, TensorError>;

/// An entire circuit, tracked against a target unitary as a single rank-2*n*
/// tensor.
///
/// The gate list is owned by the caller; [`Self::new`] and
/// [`Self::reinitialize`] take it by reference and contract each gate's
/// current unitary into the tensor. All other operations act on one gate at a
/// time.
#[derive(Clone, Debug, PartialEq)]
pub struct CircuitTensor {
    target: nd::Array2<C64>,
    num_qubits: usize,
    tensor: nd::ArrayD<C64>,
}

impl CircuitTensor {
    /// Create a new circuit tensor equal to `target†` right-multiplied, in
    /// list order, by every gate in `gates`.
    ///
    /// Fails if `target` is not unitary with power-of-two dimension, or if
    /// any gate's location is invalid for the target's qubit count.
    pub fn new(target: nd::Array2<C64>, gates: &[Gate])
        -> TensorResult<Self>
    {
        if !validate::is_unitary(&target, UNITARY_TOL) {
            return Err(InvalidTarget);
        }
        let Some(num_qubits) = validate::num_qubits(&target) else {
            return Err(InvalidTarget);
        };
        if !gates.iter()
            .all(|g| validate::is_valid_location(g.location(), Some(num_qubits)))
        {
            return Err(LocationMismatch);
        }
        let tensor = nd::ArrayD::zeros(nd::IxDyn(&vec![2; 2 * num_qubits]));
        let mut new = Self { target, num_qubits, tensor };
        new.reinitialize(gates);
        Ok(new)
    }

    /// Return the number of qubits the circuit acts on.
    pub fn num_qubits(&self) -> usize { self.num_qubits }

    /// Return a reference to the target matrix.
    pub fn target(&self) -> &nd::Array2<C64> { &self.target }

    /// Rebuild the tensor from `target†` and the gate list, discarding the
    /// incrementally updated value to reset accumulated floating-point error.
    ///
    /// `gates` must be the same list the tensor was constructed with (with
    /// whatever in-place updates its gates have received since).
    pub fn reinitialize(&mut self, gates: &[Gate]) {
        let shape: Vec<usize> = vec![2; 2 * self.num_qubits];
        self.tensor = dagger(&self.target)
            .into_shape(nd::IxDyn(&shape))
            .unwrap();
        for gate in gates { self.apply_right(gate, false); }
    }

    /// Return the 2<sup>n</sup> × 2<sup>n</sup> matrix view of the tensor.
    pub fn unitary(&self) -> nd::Array2<C64> {
        let d = 1_usize << self.num_qubits;
        self.tensor.view()
            .into_shape((d, d))
            .unwrap()
            .to_owned()
    }

    /// Contract a gate into the circuit's right side (the end furthest from
    /// the target), or back out of it when `inverse` is set.
    ///
    /// On the matrix view this left-multiplies by the gate's embedded
    /// unitary. Calling twice with the same gate, once with and once without
    /// `inverse`, restores the prior tensor up to floating-point error.
    pub fn apply_right(&mut self, gate: &Gate, inverse: bool) {
        let n = self.num_qubits;
        let loc = gate.location();
        let k = loc.len();
        // gate axes first, then the remaining row axes, then all column axes
        let mut perm: Vec<usize> = loc.to_vec();
        perm.extend((0..n).filter(|q| !loc.contains(q)));
        perm.extend(n..2 * n);
        let utry =
            if inverse { dagger(&gate.unitary()) } else { gate.unitary() };
        let dk = 1_usize << k;
        let rest = 1_usize << (2 * n - k);
        let permuted = self.tensor.view().permuted_axes(nd::IxDyn(&perm));
        let mat = permuted.as_standard_layout()
            .into_shape((dk, rest))
            .unwrap();
        let prod = utry.dot(&mat);
        self.tensor = unpermute(prod, &perm, 2 * n);
    }

    /// Contract a gate into the circuit's left side (the target's side), or
    /// back out of it when `inverse` is set.
    ///
    /// On the matrix view this right-multiplies by the gate's embedded
    /// unitary. Mirror image of [`Self::apply_right`].
    pub fn apply_left(&mut self, gate: &Gate, inverse: bool) {
        let n = self.num_qubits;
        let loc = gate.location();
        let k = loc.len();
        // all row axes, then the remaining column axes, then the gate axes
        let mut perm: Vec<usize> = (0..n).collect();
        perm.extend((0..n).filter(|q| !loc.contains(q)).map(|q| q + n));
        perm.extend(loc.iter().map(|q| q + n));
        let utry =
            if inverse { dagger(&gate.unitary()) } else { gate.unitary() };
        let dk = 1_usize << k;
        let rest = 1_usize << (2 * n - k);
        let permuted = self.tensor.view().permuted_axes(nd::IxDyn(&perm));
        let mat = permuted.as_standard_layout()
            .into_shape((rest, dk))
            .unwrap();
        let prod = mat.dot(&utry);
        self.tensor = unpermute(prod, &perm, 2 * n);
    }

    /// Compute the environment matrix for `location`: the partial trace of
    /// the tensor over every axis pair *not* in `location`, as a
    /// 2<sup>k</sup> × 2<sup>k</sup> matrix.
    ///
    /// Fails if `location` is invalid or out of range for the circuit's
    /// qubit count.
    pub fn calc_env_matrix(&self, location: &[usize])
        -> TensorResult<nd::Array2<C64>>
    {
        if !validate::is_valid_location(location, Some(self.num_qubits)) {
            return Err(InvalidLocation);
        }
        let n = self.num_qubits;
        let k = location.len();
        let rest: Vec<usize> =
            (0..n).filter(|q| !location.contains(q)).collect();
        // traced axis pairs first, location pairs last
        let mut perm: Vec<usize> = rest.clone();
        perm.extend(rest.iter().map(|q| q + n));
        perm.extend(location.iter().copied());
        perm.extend(location.iter().map(|q| q + n));
        let dr = 1_usize << (n - k);
        let dk = 1_usize << k;
        let permuted = self.tensor.view().permuted_axes(nd::IxDyn(&perm));
        let standard = permuted.as_standard_layout();
        let a = standard
            .into_shape((dr, dr, dk, dk))
            .unwrap();
        let mut env: nd::Array2<C64> = nd::Array2::zeros((dk, dk));
        for i in 0..dr { env += &a.slice(nd::s![i, i, .., ..]); }
        Ok(env)
    }
}

// reshape a matrix product back to rank 2n and undo an axis permutation
fn unpermute(mat: nd::Array2<C64>, perm: &[usize], rank: usize)
    -> nd::ArrayD<C64>
{
    let shape: Vec<usize> = vec![2; rank];
    let mut inv_perm = vec![0; rank];
    for (i, p) in perm.iter().enumerate() { inv_perm[*p] = i; }
    mat.into_shape(nd::IxDyn(&shape))
        .unwrap()
        .permuted_axes(nd::IxDyn(&inv_perm))
        .as_standard_layout()
        .to_owned()
}

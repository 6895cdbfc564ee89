//! Fit the gates of a fixed circuit topology to a target unitary matrix.
//!
//! Given an ordered list of gate placements (each gate acting on a small
//! subset of qubit indices) and an *n*-qubit target unitary, the optimizer
//! adjusts the unitary content of each gate so that the composed circuit
//! approximates the target as closely as possible. The fit is an alternating
//! block-coordinate descent: all gates but one are held fixed while that one
//! is replaced by its locally optimal value, sweeping back and forth over the
//! circuit until the cost stops moving.
//!
//! The composed operator is maintained as a rank-2*n* tensor over qubit axes
//! (see [`CircuitTensor`]), which makes removing and reinserting a single
//! gate's contribution a local contraction instead of a full rebuild. The
//! locally optimal replacement for a gate is derived from the "environment"
//! matrix, the partial trace of the tensor over every axis the gate does not
//! touch: general gates take the SVD-based Procrustes solution, while
//! rotation gates have closed-form angle updates.
//!
//! Costs are measured by the phase-invariant distance
//! 1 − |Tr(*T*<sup>†</sup>*C*)| / 2<sup>*n*</sup>, which is zero exactly when
//! the circuit matches the target up to a global phase.
//!
//! # Example
//!
//! ```
//! use circuit_fit::{ Gate, Optimizer, gate::haar, optimize::get_distance };
//! use rand::{ SeedableRng, rngs::StdRng };
//!
//! let mut rng = StdRng::seed_from_u64(10546);
//!
//! // a Haar-random two-qubit target
//! let target = haar(2, &mut rng);
//!
//! // topology: one general gate spanning both qubits, random initial guess
//! let mut gates = vec![
//!     Gate::general(haar(2, &mut rng), &[0, 1], false).unwrap(),
//! ];
//!
//! let cost = Optimizer::default().run(&mut gates, &target).unwrap();
//! assert!(cost <= 1e-10);
//! assert!(get_distance(&gates, &target).unwrap() <= 1e-10);
//! ```

use ndarray as nd;
use num_complex::Complex64 as C64;

pub mod validate;
pub mod gate;
pub mod tensor;
pub mod optimize;

pub use gate::{ Gate, GateError };
pub use tensor::{ CircuitTensor, TensorError };
pub use optimize::{ Optimizer, OptimizeError, optimize, get_distance };

/// Return the conjugate transpose of a matrix.
pub fn dagger(m: &nd::Array2<C64>) -> nd::Array2<C64> {
    m.t().mapv(|z| z.conj())
}

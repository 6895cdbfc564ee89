//! Numeric validity checks shared by gate and circuit-tensor construction.
//!
//! All checks are predicates rather than fallible operations; callers decide
//! which error to raise. Failure details are reported on the [`log`] facade
//! at `debug` level.

use itertools::Itertools;
use ndarray as nd;
use num_complex::Complex64 as C64;
use num_traits::{ One, Zero };
use crate::dagger;

/// Absolute tolerance for the unitarity check.
pub const UNITARY_TOL: f64 = 1e-14;

/// Return `true` if `m` is square.
pub fn is_square(m: &nd::Array2<C64>) -> bool { m.nrows() == m.ncols() }

/// Return the number of qubits a square matrix acts on, or `None` if the
/// matrix is not square or its dimension is not a power of two.
pub fn num_qubits(m: &nd::Array2<C64>) -> Option<usize> {
    if !is_square(m) { return None; }
    let d = m.nrows();
    (d > 0 && d.is_power_of_two()).then(|| d.trailing_zeros() as usize)
}

/// Return `true` if `U U† = U† U = I` entrywise within an absolute tolerance
/// `tol`.
pub fn is_unitary(m: &nd::Array2<C64>, tol: f64) -> bool {
    if !is_square(m) {
        log::debug!("unitarity check failed: matrix is not square");
        return false;
    }
    let md = dagger(m);
    let dev_r = identity_dev(&m.dot(&md));
    if dev_r > tol {
        log::debug!("unitarity check failed: max|U U† − I| = {:e}", dev_r);
        return false;
    }
    let dev_l = identity_dev(&md.dot(m));
    if dev_l > tol {
        log::debug!("unitarity check failed: max|U† U − I| = {:e}", dev_l);
        return false;
    }
    true
}

/// Return `true` if `location` is strictly increasing (hence sorted and
/// duplicate-free) and, when `num_qubits` is given, every index is in range.
pub fn is_valid_location(location: &[usize], num_qubits: Option<usize>)
    -> bool
{
    if !location.iter().tuple_windows().all(|(a, b)| a < b) {
        log::debug!("invalid location {:?}: not strictly increasing", location);
        return false;
    }
    if let Some(n) = num_qubits {
        if location.iter().any(|q| *q >= n) {
            log::debug!(
                "invalid location {:?}: index out of range for {} qubits",
                location, n,
            );
            return false;
        }
    }
    true
}

// largest entrywise deviation from the identity
fn identity_dev(m: &nd::Array2<C64>) -> f64 {
    m.indexed_iter()
        .map(|((i, j), z)| {
            let t = if i == j { C64::one() } else { C64::zero() };
            (z - t).norm()
        })
        .fold(0.0, f64::max)
}

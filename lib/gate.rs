//! Gates: unitary operators applied to subsets of qubit indices.
//!
//! [`Gate`] is a closed set of variants sharing one contract: every gate
//! carries a unitary matrix of dimension 2<sup>k</sup>, a strictly increasing
//! location of k qubit indices, and a fixed flag, and every gate knows how to
//! replace itself with the locally optimal unitary given an environment
//! matrix (see [`CircuitTensor::calc_env_matrix`][crate::tensor::CircuitTensor::calc_env_matrix]).
//!
//! [`Gate::General`] holds a dense matrix and is updated with the SVD-based
//! Procrustes solution; the rotation variants hold a single angle with
//! closed-form trigonometric updates; [`Gate::Cnot`] never changes.

use std::fmt;
use ndarray as nd;
use ndarray_linalg::{ QRSquareInplace, SVD };
use num_complex::Complex64 as C64;
use num_traits::{ One, Zero };
use once_cell::sync::Lazy;
use rand::Rng;
use rand::distributions::Distribution;
use statrs::distribution::Normal;
use thiserror::Error;
use crate::dagger;
use crate::validate::{ self, UNITARY_TOL };

#[derive(Debug, Error)]
pub enum GateError {
    /// Returned when attempting to create a gate from a matrix that is not
    /// square, not of power-of-two dimension, or not unitary within
    /// [`UNITARY_TOL`].
    #[error("error in gate creation: matrix is not unitary")]
    InvalidMatrix,

    /// Returned when attempting to create a gate with a location that is not
    /// strictly increasing and duplicate-free.
    #[error("error in gate creation: invalid qubit location")]
    InvalidLocation,

    /// Returned when a gate's location size disagrees with its matrix
    /// dimension.
    #[error("error in gate creation: location size does not match matrix dimension")]
    DimensionMismatch,
}
use GateError::*;
pub type GateResult<T> = Result<T, GateError>;

/// A unitary operator over a subset of qubit indices.
#[derive(Clone, Debug, PartialEq)]
pub enum Gate {
    /// An arbitrary dense unitary.
    General {
        /// The gate's unitary matrix.
        utry: nd::Array2<C64>,
        /// Qubit indices, strictly increasing.
        location: Vec<usize>,
        /// If `true`, [`Gate::update`] is a no-op.
        fixed: bool,
    },
    /// A rotation about X on a single qubit.
    Rx { theta: f64, location: [usize; 1], fixed: bool },
    /// A rotation about Y on a single qubit.
    Ry { theta: f64, location: [usize; 1], fixed: bool },
    /// A rotation about Z on a single qubit.
    Rz { theta: f64, location: [usize; 1], fixed: bool },
    /// A rotation about XX on a pair of qubits.
    Xx { theta: f64, location: [usize; 2], fixed: bool },
    /// A controlled-NOT on a pair of qubits; always fixed.
    Cnot {
        /// Sorted qubit pair.
        location: [usize; 2],
        /// `true` if the control is the higher-indexed qubit.
        reversed: bool,
    },
}

impl Gate {
    /// Create a gate from a dense unitary matrix.
    ///
    /// Fails if the matrix is not unitary within [`UNITARY_TOL`], if the
    /// location is not strictly increasing, or if the location size does not
    /// match the matrix dimension.
    pub fn general(utry: nd::Array2<C64>, location: &[usize], fixed: bool)
        -> GateResult<Self>
    {
        if !validate::is_unitary(&utry, UNITARY_TOL) {
            return Err(InvalidMatrix);
        }
        let Some(k) = validate::num_qubits(&utry) else {
            return Err(InvalidMatrix);
        };
        if !validate::is_valid_location(location, None) {
            return Err(InvalidLocation);
        }
        if location.len() != k { return Err(DimensionMismatch); }
        Ok(Self::General { utry, location: location.to_vec(), fixed })
    }

    /// Create an X-rotation gate on a single qubit.
    pub fn rx(theta: f64, qubit: usize, fixed: bool) -> Self {
        Self::Rx { theta, location: [qubit], fixed }
    }

    /// Create a Y-rotation gate on a single qubit.
    pub fn ry(theta: f64, qubit: usize, fixed: bool) -> Self {
        Self::Ry { theta, location: [qubit], fixed }
    }

    /// Create a Z-rotation gate on a single qubit.
    pub fn rz(theta: f64, qubit: usize, fixed: bool) -> Self {
        Self::Rz { theta, location: [qubit], fixed }
    }

    /// Create an XX-rotation gate on a pair of qubits.
    ///
    /// Fails if the two indices are not strictly increasing.
    pub fn xx(theta: f64, location: (usize, usize), fixed: bool)
        -> GateResult<Self>
    {
        let (a, b) = location;
        if a >= b { return Err(InvalidLocation); }
        Ok(Self::Xx { theta, location: [a, b], fixed })
    }

    /// Create a controlled-NOT gate.
    ///
    /// The qubit pair may be given in either order; a control index above the
    /// target is expressed with the reversed CNOT matrix on the sorted
    /// location. Fails if `control == target`.
    pub fn cnot(control: usize, target: usize) -> GateResult<Self> {
        if control == target { return Err(InvalidLocation); }
        if control < target {
            Ok(Self::Cnot { location: [control, target], reversed: false })
        } else {
            Ok(Self::Cnot { location: [target, control], reversed: true })
        }
    }

    /// Return `true` if `self` is `General`.
    pub fn is_general(&self) -> bool { matches!(self, Self::General { .. }) }

    /// Return `true` if `self` is `Rx`.
    pub fn is_rx(&self) -> bool { matches!(self, Self::Rx { .. }) }

    /// Return `true` if `self` is `Ry`.
    pub fn is_ry(&self) -> bool { matches!(self, Self::Ry { .. }) }

    /// Return `true` if `self` is `Rz`.
    pub fn is_rz(&self) -> bool { matches!(self, Self::Rz { .. }) }

    /// Return `true` if `self` is `Xx`.
    pub fn is_xx(&self) -> bool { matches!(self, Self::Xx { .. }) }

    /// Return `true` if `self` is `Cnot`.
    pub fn is_cnot(&self) -> bool { matches!(self, Self::Cnot { .. }) }

    /// Return the qubit indices the gate acts on, strictly increasing.
    pub fn location(&self) -> &[usize] {
        match self {
            Self::General { location, .. } => location,
            Self::Rx { location, .. } => location,
            Self::Ry { location, .. } => location,
            Self::Rz { location, .. } => location,
            Self::Xx { location, .. } => location,
            Self::Cnot { location, .. } => location,
        }
    }

    /// Return the number of qubits the gate acts on.
    pub fn size(&self) -> usize { self.location().len() }

    /// Return `true` if [`Gate::update`] is a no-op for this gate.
    pub fn fixed(&self) -> bool {
        match self {
            Self::General { fixed, .. } => *fixed,
            Self::Rx { fixed, .. } => *fixed,
            Self::Ry { fixed, .. } => *fixed,
            Self::Rz { fixed, .. } => *fixed,
            Self::Xx { fixed, .. } => *fixed,
            Self::Cnot { .. } => true,
        }
    }

    /// Return the rotation angle, if the gate has one.
    pub fn theta(&self) -> Option<f64> {
        match self {
            Self::Rx { theta, .. } => Some(*theta),
            Self::Ry { theta, .. } => Some(*theta),
            Self::Rz { theta, .. } => Some(*theta),
            Self::Xx { theta, .. } => Some(*theta),
            _ => None,
        }
    }

    /// Return the gate's unitary matrix.
    ///
    /// Rotation variants derive the matrix from their angle; `General` clones
    /// its stored matrix.
    pub fn unitary(&self) -> nd::Array2<C64> {
        match self {
            Self::General { utry, .. } => utry.clone(),
            Self::Rx { theta, .. } => make_rx(*theta),
            Self::Ry { theta, .. } => make_ry(*theta),
            Self::Rz { theta, .. } => make_rz(*theta),
            Self::Xx { theta, .. } => make_xx(*theta),
            Self::Cnot { reversed: false, .. } => Lazy::force(&CNOT_MAT).clone(),
            Self::Cnot { reversed: true, .. } => Lazy::force(&CNOT_REV_MAT).clone(),
        }
    }

    /// Return a new gate with the conjugate-transposed unitary on the same
    /// location, with the same fixed flag.
    ///
    /// Rotation variants negate their angle exactly; CNOT is self-inverse.
    pub fn inverse(&self) -> Self {
        match self {
            Self::General { utry, location, fixed } => Self::General {
                utry: dagger(utry),
                location: location.clone(),
                fixed: *fixed,
            },
            Self::Rx { theta, location, fixed } =>
                Self::Rx { theta: -theta, location: *location, fixed: *fixed },
            Self::Ry { theta, location, fixed } =>
                Self::Ry { theta: -theta, location: *location, fixed: *fixed },
            Self::Rz { theta, location, fixed } =>
                Self::Rz { theta: -theta, location: *location, fixed: *fixed },
            Self::Xx { theta, location, fixed } =>
                Self::Xx { theta: -theta, location: *location, fixed: *fixed },
            Self::Cnot { .. } => self.clone(),
        }
    }

    /// Replace this gate's unitary with the one that (approximately)
    /// maximizes Re Tr(`env` · U) over the gate's family, holding the rest of
    /// the circuit fixed.
    ///
    /// `slowdown_factor` ∈ [0, 1) damps the step by blending the fresh
    /// optimum with the previous value; larger values converge more slowly
    /// but oscillate less near local minima. No-op for fixed gates, and for
    /// CNOT regardless of the flag.
    ///
    /// `env` must be the 2<sup>k</sup>-dimensional environment matrix for
    /// this gate's location.
    pub fn update(&mut self, env: &nd::Array2<C64>, slowdown_factor: f64) {
        if self.fixed() { return; }
        let s = slowdown_factor;
        match self {
            Self::General { utry, .. } => {
                // Procrustes: the unitary nearest to the (damped) environment
                // in the Re-trace sense is V U† for env = U Σ V†
                let m: nd::Array2<C64> =
                    env * C64::from(1.0 - s) + dagger(utry) * C64::from(s);
                let (Some(u), _, Some(vt)) = m.svd(true, true).unwrap()
                    else { unreachable!() };
                *utry = dagger(&vt).dot(&dagger(&u));
            },
            Self::Rx { theta, .. } => {
                let a = (env[[0, 0]] + env[[1, 1]]).re;
                let b = (env[[0, 1]] + env[[1, 0]]).im;
                let hyp = a.hypot(b);
                if hyp <= f64::EPSILON { return; }
                let mut new_theta = 2.0 * (a / hyp).acos();
                if b < 0.0 { new_theta = -new_theta; }
                *theta = (1.0 - s) * new_theta + s * *theta;
            },
            Self::Ry { theta, .. } => {
                let a = (env[[0, 0]] + env[[1, 1]]).re;
                let b = (env[[1, 0]] - env[[0, 1]]).re;
                let hyp = a.hypot(b);
                if hyp <= f64::EPSILON { return; }
                let mut new_theta = 2.0 * (a / hyp).acos();
                if b > 0.0 { new_theta = -new_theta; }
                *theta = (1.0 - s) * new_theta + s * *theta;
            },
            Self::Rz { theta, .. } => {
                let e = env[[1, 1]];
                if e.norm() <= f64::EPSILON { return; }
                let new_theta = -e.im.atan2(e.re);
                *theta = (1.0 - s) * new_theta + s * *theta;
            },
            Self::Xx { theta, .. } => {
                let a = (env[[0, 0]] + env[[1, 1]] + env[[2, 2]] + env[[3, 3]]).re;
                let b = (env[[0, 3]] + env[[1, 2]] + env[[2, 1]] + env[[3, 0]]).im;
                let hyp = a.hypot(b);
                if hyp <= f64::EPSILON { return; }
                let mut new_theta = 2.0 * (a / hyp).acos();
                if b < 0.0 { new_theta = -new_theta; }
                *theta = (1.0 - s) * new_theta + s * *theta;
            },
            Self::Cnot { .. } => { },
        }
    }

    /// Reshape the gate's unitary into a tensor with one axis of extent 2 per
    /// qubit on each side; either side can optionally be collapsed back into
    /// a single 2<sup>k</sup> axis.
    ///
    /// Pure view transform; no numeric change.
    pub fn tensor_format(&self, compress_left: bool, compress_right: bool)
        -> nd::ArrayD<C64>
    {
        let k = self.size();
        let dim = 1_usize << k;
        let mut shape: Vec<usize> = Vec::with_capacity(2 * k);
        if compress_left {
            shape.push(dim);
        } else {
            shape.extend(std::iter::repeat(2).take(k));
        }
        if compress_right {
            shape.push(dim);
        } else {
            shape.extend(std::iter::repeat(2).take(k));
        }
        self.unitary().into_shape(nd::IxDyn(&shape)).unwrap()
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::General { utry, location, .. } => write!(
                f, "{:?}: [[{} ... {}]]",
                location,
                utry[[0, 0]],
                utry[[utry.nrows() - 1, utry.ncols() - 1]],
            ),
            Self::Rx { theta, location, .. } =>
                write!(f, "{:?}: Rx({})", location, theta),
            Self::Ry { theta, location, .. } =>
                write!(f, "{:?}: Ry({})", location, theta),
            Self::Rz { theta, location, .. } =>
                write!(f, "{:?}: Rz({})", location, theta),
            Self::Xx { theta, location, .. } =>
                write!(f, "{:?}: XX({})", location, theta),
            Self::Cnot { location, .. } =>
                write!(f, "{:?}: CNOT", location),
        }
    }
}

/// Make an X-rotation matrix.
pub fn make_rx(theta: f64) -> nd::Array2<C64> {
    let cos = C64::from((theta / 2.0).cos());
    let isin = -C64::i() * C64::from((theta / 2.0).sin());
    nd::array![
        [cos,  isin],
        [isin, cos ],
    ]
}

/// Make a Y-rotation matrix.
pub fn make_ry(theta: f64) -> nd::Array2<C64> {
    let cos = C64::from((theta / 2.0).cos());
    let sin = C64::from((theta / 2.0).sin());
    nd::array![
        [cos, -sin],
        [sin,  cos],
    ]
}

/// Make a Z-rotation matrix.
pub fn make_rz(theta: f64) -> nd::Array2<C64> {
    nd::array![
        [C64::one(),  C64::zero()       ],
        [C64::zero(), C64::cis(theta)   ],
    ]
}

/// Make an XX-rotation matrix.
pub fn make_xx(theta: f64) -> nd::Array2<C64> {
    let cos = C64::from((theta / 2.0).cos());
    let isin = -C64::i() * C64::from((theta / 2.0).sin());
    let o = C64::zero();
    nd::array![
        [cos,  o,    o,    isin],
        [o,    cos,  isin, o   ],
        [o,    isin, cos,  o   ],
        [isin, o,    o,    cos ],
    ]
}

/// Make a CNOT matrix with the control on the lower-indexed qubit.
///
/// Since this matrix takes no arguments, consider using the
/// lazily-constructed [`CNOT_MAT`] instead.
pub fn make_cnot() -> nd::Array2<C64> {
    let o = C64::zero();
    let l = C64::one();
    nd::array![
        [l, o, o, o],
        [o, l, o, o],
        [o, o, o, l],
        [o, o, l, o],
    ]
}

/// Lazy-static version of [`make_cnot`].
pub static CNOT_MAT: Lazy<nd::Array2<C64>> = Lazy::new(make_cnot);

/// Make a CNOT matrix with the control on the higher-indexed qubit.
///
/// Since this matrix takes no arguments, consider using the
/// lazily-constructed [`CNOT_REV_MAT`] instead.
pub fn make_cnot_rev() -> nd::Array2<C64> {
    let o = C64::zero();
    let l = C64::one();
    nd::array![
        [l, o, o, o],
        [o, o, o, l],
        [o, o, l, o],
        [o, l, o, o],
    ]
}

/// Lazy-static version of [`make_cnot_rev`].
pub static CNOT_REV_MAT: Lazy<nd::Array2<C64>> = Lazy::new(make_cnot_rev);

/// Generate an `n`-qubit Haar-random unitary matrix.
pub fn haar<R>(n: usize, rng: &mut R) -> nd::Array2<C64>
where R: Rng + ?Sized
{
    let normal = Normal::standard();
    let d = 2_usize.pow(n as u32);
    let mut z: nd::Array2<C64>
        = nd::Array2::from_shape_simple_fn(
            (d, d),
            || C64::new(normal.sample(rng), normal.sample(rng)),
        );
    let (_, r) = z.qr_square_inplace().unwrap();
    nd::Zip::from(z.columns_mut())
        .and(r.diag())
        .for_each(|mut z_j, rjj| {
            let renorm = *rjj / C64::from(rjj.norm());
            z_j.map_inplace(|zij| { *zij /= renorm; });
        });
    z
}

#[cfg(test)]
mod tests {
    use std::f64::consts::{ FRAC_PI_2, PI };
    use rand::{ SeedableRng, rngs::StdRng };
    use super::*;

    fn mat_approx_eq(a: &nd::Array2<C64>, b: &nd::Array2<C64>, tol: f64) {
        assert_eq!(a.dim(), b.dim());
        let dev = a.iter().zip(b)
            .map(|(x, y)| (x - y).norm())
            .fold(0.0, f64::max);
        assert!(dev <= tol, "matrices differ by {:e}", dev);
    }

    #[test]
    fn rotation_matrices() {
        for gate in [
            Gate::rx(0.7, 0, false),
            Gate::ry(-1.3, 2, false),
            Gate::rz(2.9, 1, false),
            Gate::xx(0.4, (0, 1), false).unwrap(),
        ] {
            assert!(validate::is_unitary(&gate.unitary(), 1e-10));
        }
        // Rx(π) = -iX
        let expected = nd::array![
            [C64::zero(), -C64::i()  ],
            [-C64::i(),   C64::zero()],
        ];
        mat_approx_eq(&make_rx(PI), &expected, 1e-15);
        // Rz(π/2) = diag(1, i)
        let expected = nd::array![
            [C64::one(),  C64::zero()],
            [C64::zero(), C64::i()   ],
        ];
        mat_approx_eq(&make_rz(FRAC_PI_2), &expected, 1e-15);
    }

    #[test]
    fn constructor_validation() {
        let bad: nd::Array2<C64> = nd::Array2::eye(4) * C64::from(2.0);
        assert!(matches!(
            Gate::general(bad, &[0, 1], false),
            Err(GateError::InvalidMatrix),
        ));
        let rect: nd::Array2<C64> = nd::Array2::zeros((4, 2));
        assert!(matches!(
            Gate::general(rect, &[0, 1], false),
            Err(GateError::InvalidMatrix),
        ));
        assert!(matches!(
            Gate::general(nd::Array2::eye(4), &[1, 0], false),
            Err(GateError::InvalidLocation),
        ));
        assert!(matches!(
            Gate::general(nd::Array2::eye(4), &[2], false),
            Err(GateError::DimensionMismatch),
        ));
        assert!(matches!(
            Gate::xx(0.1, (1, 1), false),
            Err(GateError::InvalidLocation),
        ));
        assert!(matches!(Gate::cnot(3, 3), Err(GateError::InvalidLocation)));
    }

    #[test]
    fn cnot_orientation() {
        let g = Gate::cnot(0, 1).unwrap();
        assert_eq!(g.location(), &[0, 1]);
        assert!(g.fixed());
        mat_approx_eq(&g.unitary(), &make_cnot(), 0.0);
        let g = Gate::cnot(1, 0).unwrap();
        assert_eq!(g.location(), &[0, 1]);
        mat_approx_eq(&g.unitary(), &make_cnot_rev(), 0.0);
    }

    #[test]
    fn inverses() {
        let mut rng = StdRng::seed_from_u64(10546);
        let gates = [
            Gate::general(haar(2, &mut rng), &[0, 3], false).unwrap(),
            Gate::rx(0.7, 0, false),
            Gate::ry(1.1, 0, false),
            Gate::rz(-0.3, 0, false),
            Gate::xx(2.2, (1, 2), false).unwrap(),
            Gate::cnot(0, 1).unwrap(),
        ];
        for g in gates {
            let inv = g.inverse();
            assert_eq!(inv.location(), g.location());
            let prod = g.unitary().dot(&inv.unitary());
            let eye = nd::Array2::eye(prod.nrows());
            mat_approx_eq(&prod, &eye, 1e-12);
        }
    }

    #[test]
    fn rotation_updates_recover_angle() {
        // with env = U(θ0)†, Re Tr(env · U(θ)) is maximized at θ = θ0
        let theta0 = 0.7;
        let mut g = Gate::rx(0.0, 0, false);
        g.update(&dagger(&make_rx(theta0)), 0.0);
        assert!((g.theta().unwrap() - theta0).abs() < 1e-12);

        let theta0 = -1.2;
        let mut g = Gate::ry(0.0, 0, false);
        g.update(&dagger(&make_ry(theta0)), 0.0);
        assert!((g.theta().unwrap() - theta0).abs() < 1e-12);

        let theta0 = 2.1;
        let mut g = Gate::rz(0.0, 0, false);
        g.update(&dagger(&make_rz(theta0)), 0.0);
        assert!((g.theta().unwrap() - theta0).abs() < 1e-12);

        let theta0 = -0.9;
        let mut g = Gate::xx(0.0, (0, 1), false).unwrap();
        g.update(&dagger(&make_xx(theta0)), 0.0);
        assert!((g.theta().unwrap() - theta0).abs() < 1e-12);
    }

    #[test]
    fn update_damping_blends_angles() {
        let theta0 = 1.0;
        let mut g = Gate::ry(0.5, 0, false);
        g.update(&dagger(&make_ry(theta0)), 0.5);
        assert!((g.theta().unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn general_update_recovers_unitary() {
        let mut rng = StdRng::seed_from_u64(10546);
        let w = haar(2, &mut rng);
        let mut g = Gate::general(haar(2, &mut rng), &[0, 1], false).unwrap();
        g.update(&dagger(&w), 0.0);
        mat_approx_eq(&g.unitary(), &w, 1e-12);
        assert!(validate::is_unitary(&g.unitary(), 1e-10));
    }

    #[test]
    fn fixed_gates_never_update() {
        let mut rng = StdRng::seed_from_u64(10546);
        let u = haar(1, &mut rng);
        let mut g = Gate::general(u.clone(), &[0], true).unwrap();
        g.update(&dagger(&haar(1, &mut rng)), 0.0);
        mat_approx_eq(&g.unitary(), &u, 0.0);

        let mut g = Gate::cnot(0, 1).unwrap();
        g.update(&dagger(&haar(2, &mut rng)), 0.0);
        mat_approx_eq(&g.unitary(), &make_cnot(), 0.0);
    }

    #[test]
    fn unitarity_preserved_by_updates() {
        let mut rng = StdRng::seed_from_u64(10546);
        let mut g = Gate::general(haar(2, &mut rng), &[0, 1], false).unwrap();
        for _ in 0..25 {
            g.update(&haar(2, &mut rng), 0.1);
            assert!(validate::is_unitary(&g.unitary(), 1e-10));
        }
    }

    #[test]
    fn tensor_format_shapes() {
        let mut rng = StdRng::seed_from_u64(10546);
        let g = Gate::general(haar(2, &mut rng), &[0, 1], false).unwrap();
        assert_eq!(g.tensor_format(false, false).shape(), &[2, 2, 2, 2]);
        assert_eq!(g.tensor_format(true, false).shape(), &[4, 2, 2]);
        assert_eq!(g.tensor_format(false, true).shape(), &[2, 2, 4]);
        assert_eq!(g.tensor_format(true, true).shape(), &[4, 4]);
        let flat = g.tensor_format(true, true);
        assert_eq!(flat[[1, 2]], g.unitary()[[1, 2]]);
    }

    #[test]
    fn haar_samples_are_unitary() {
        let mut rng = StdRng::seed_from_u64(10546);
        for n in 1..=3 {
            assert!(validate::is_unitary(&haar(n, &mut rng), 1e-10));
        }
    }
}

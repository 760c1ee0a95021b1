//! Miscellaneous numeric utilities shared across the solver and narrow phase.
//!
//! Most of this module mirrors the "wide" trait shapes the teacher uses
//! throughout its dynamics pipeline (`WAngularInertia`, `WCross`, `WDot`,
//! `WBasis`, ...), generalized over the [`WReal`] bound. This crate's solver
//! iterates one constraint at a time rather than through a packed SIMD
//! element type, so each trait currently has a single implementor; the
//! bound is kept so call sites read the same as code written against a
//! genuinely generic scalar.

use na::{Matrix3, Scalar, SimdRealField, Vector3};
use num_traits::{One, Zero};
use std::ops::IndexMut;

use crate::math::Real;

/// Blanket trait for "the scalar type the solver's wide-math traits are
/// built from". This crate has a single implementor (see the module docs);
/// it is kept as a named bound so call sites read the same as the teacher's
/// generic solver math.
pub trait WReal: SimdRealField<Element = Real> + Copy {}
impl WReal for Real {}

pub(crate) fn inv(val: Real) -> Real {
    if val == 0.0 {
        0.0
    } else {
        1.0 / val
    }
}

pub(crate) fn simd_inv<N: SimdRealField + Copy>(val: N) -> N {
    use na::SimdPartialOrd as _;
    N::zero().select(val.simd_eq(N::zero()), N::one() / val)
}

/// Symmetric 3x3 matrix, stored as its six distinct entries. Used for inverse
/// inertia tensors, which are always symmetric.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SdpMatrix3<N> {
    pub m11: N,
    pub m12: N,
    pub m13: N,
    pub m22: N,
    pub m23: N,
    pub m33: N,
}

impl<N: Scalar + Zero> SdpMatrix3<N> {
    pub fn zero() -> Self {
        Self {
            m11: N::zero(),
            m12: N::zero(),
            m13: N::zero(),
            m22: N::zero(),
            m23: N::zero(),
            m33: N::zero(),
        }
    }
}

impl SdpMatrix3<Real> {
    pub fn is_zero(&self) -> bool {
        self.m11 == 0.0
            && self.m12 == 0.0
            && self.m13 == 0.0
            && self.m22 == 0.0
            && self.m23 == 0.0
            && self.m33 == 0.0
    }
}

impl<N: Scalar + Zero + One> SdpMatrix3<N> {
    pub fn identity() -> Self {
        Self {
            m11: N::one(),
            m12: N::zero(),
            m13: N::zero(),
            m22: N::one(),
            m23: N::zero(),
            m33: N::one(),
        }
    }

    pub fn from_diagonal(x: N, y: N, z: N) -> Self {
        Self {
            m11: x,
            m12: N::zero(),
            m13: N::zero(),
            m22: y,
            m23: N::zero(),
            m33: z,
        }
    }
}

impl SdpMatrix3<Real> {
    pub fn from_matrix(m: &Matrix3<Real>) -> Self {
        Self {
            m11: m.m11,
            m12: m.m12,
            m13: m.m13,
            m22: m.m22,
            m23: m.m23,
            m33: m.m33,
        }
    }
}

impl<N: SimdRealField + Copy> std::ops::Mul<N> for SdpMatrix3<N> {
    type Output = Self;
    fn mul(self, rhs: N) -> Self {
        Self {
            m11: self.m11 * rhs,
            m12: self.m12 * rhs,
            m13: self.m13 * rhs,
            m22: self.m22 * rhs,
            m23: self.m23 * rhs,
            m33: self.m33 * rhs,
        }
    }
}

/// Trait computing the matrix rotation `R * M * R^T` of a symmetric inverse
/// inertia tensor into world space (§4.4 step 3).
pub trait WAngularInertia<N> {
    fn inverse(&self) -> Self;
    fn transform_vector(&self, v: Vector3<N>) -> Vector3<N>;
    fn squared(&self) -> Self;
    fn into_matrix(self) -> Matrix3<N>;
    fn transform_matrix(&self, m: &Matrix3<N>) -> Matrix3<N>;
}

impl WAngularInertia<Real> for SdpMatrix3<Real> {
    fn inverse(&self) -> Self {
        let minor_m12_m23 = self.m22 * self.m33 - self.m23 * self.m23;
        let minor_m11_m23 = self.m12 * self.m33 - self.m13 * self.m23;
        let minor_m11_m22 = self.m12 * self.m23 - self.m13 * self.m22;

        let determinant =
            self.m11 * minor_m12_m23 - self.m12 * minor_m11_m23 + self.m13 * minor_m11_m22;

        if determinant == 0.0 {
            Self::zero()
        } else {
            SdpMatrix3 {
                m11: minor_m12_m23 / determinant,
                m12: -minor_m11_m23 / determinant,
                m13: minor_m11_m22 / determinant,
                m22: (self.m11 * self.m33 - self.m13 * self.m13) / determinant,
                m23: (self.m13 * self.m12 - self.m23 * self.m11) / determinant,
                m33: (self.m11 * self.m22 - self.m12 * self.m12) / determinant,
            }
        }
    }

    fn transform_vector(&self, v: Vector3<Real>) -> Vector3<Real> {
        let x = self.m11 * v.x + self.m12 * v.y + self.m13 * v.z;
        let y = self.m12 * v.x + self.m22 * v.y + self.m23 * v.z;
        let z = self.m13 * v.x + self.m23 * v.y + self.m33 * v.z;
        Vector3::new(x, y, z)
    }

    fn squared(&self) -> Self {
        SdpMatrix3 {
            m11: self.m11 * self.m11 + self.m12 * self.m12 + self.m13 * self.m13,
            m12: self.m11 * self.m12 + self.m12 * self.m22 + self.m13 * self.m23,
            m13: self.m11 * self.m13 + self.m12 * self.m23 + self.m13 * self.m33,
            m22: self.m12 * self.m12 + self.m22 * self.m22 + self.m23 * self.m23,
            m23: self.m12 * self.m13 + self.m22 * self.m23 + self.m23 * self.m33,
            m33: self.m13 * self.m13 + self.m23 * self.m23 + self.m33 * self.m33,
        }
    }

    #[rustfmt::skip]
    fn into_matrix(self) -> Matrix3<Real> {
        Matrix3::new(
            self.m11, self.m12, self.m13,
            self.m12, self.m22, self.m23,
            self.m13, self.m23, self.m33,
        )
    }

    #[rustfmt::skip]
    fn transform_matrix(&self, m: &Matrix3<Real>) -> Matrix3<Real> {
        self.into_matrix() * *m
    }
}

/// Trait to copy the sign of each component of one scalar to another (used by
/// the friction-tangent-basis construction).
pub trait WSign<Rhs>: Sized {
    fn copy_sign_to(self, to: Rhs) -> Rhs;
}

impl WSign<Real> for Real {
    fn copy_sign_to(self, to: Self) -> Self {
        const MINUS_ZERO: Real = -0.0;
        let signbit = MINUS_ZERO.to_bits();
        Real::from_bits((signbit & self.to_bits()) | ((!signbit) & to.to_bits()))
    }
}

/// Trait to compute a vector's orthonormal tangent basis, used to build the
/// two-direction friction basis at a contact manifold's centroid (§4.7).
pub trait WBasis: Sized {
    type Basis;
    fn orthonormal_basis(self) -> Self::Basis;
}

impl<N: SimdRealField + Copy + WSign<N>> WBasis for Vector3<N> {
    type Basis = [Vector3<N>; 2];
    // Robust, branchless construction: https://graphics.pixar.com/library/OrthonormalB/paper.pdf
    fn orthonormal_basis(self) -> [Vector3<N>; 2] {
        let sign = self.z.copy_sign_to(N::one());
        let a = -N::one() / (sign + self.z);
        let b = self.x * self.y * a;

        [
            Vector3::new(
                N::one() + sign * self.x * self.x * a,
                sign * b,
                -sign * self.x,
            ),
            Vector3::new(b, sign + self.y * self.y * a, -self.y),
        ]
    }
}

pub(crate) trait WCrossMatrix: Sized {
    type CrossMat;
    fn gcross_matrix(self) -> Self::CrossMat;
}

impl<N: SimdRealField + Copy> WCrossMatrix for Vector3<N> {
    type CrossMat = Matrix3<N>;

    #[rustfmt::skip]
    fn gcross_matrix(self) -> Matrix3<N> {
        Matrix3::new(
            N::zero(), -self.z, self.y,
            self.z, N::zero(), -self.x,
            -self.y, self.x, N::zero(),
        )
    }
}

pub(crate) trait WCross<Rhs>: Sized {
    type Result;
    fn gcross(&self, rhs: Rhs) -> Self::Result;
}

impl<N: SimdRealField + Copy> WCross<Vector3<N>> for Vector3<N> {
    type Result = Vector3<N>;
    fn gcross(&self, rhs: Vector3<N>) -> Self::Result {
        self.cross(&rhs)
    }
}

pub(crate) trait WDot<Rhs>: Sized {
    type Result;
    fn gdot(&self, rhs: Rhs) -> Self::Result;
}

impl<N: SimdRealField + Copy> WDot<Vector3<N>> for Vector3<N> {
    type Result = N;
    fn gdot(&self, rhs: Vector3<N>) -> Self::Result {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }
}

// RAII guard enabling flush-to-zero / denormals-are-zero on x86, restoring the
// previous MXCSR flags on drop. Denormals have an outsized performance impact
// on the iterative solver's inner loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct FlushToZeroDenormalsAreZeroFlags {
    original_flags: u32,
}

impl FlushToZeroDenormalsAreZeroFlags {
    #[cfg(not(all(
        not(feature = "enhanced-determinism"),
        any(target_arch = "x86_64", target_arch = "x86"),
        target_feature = "sse"
    )))]
    pub fn flush_denormal_to_zero() -> Self {
        Self { original_flags: 0 }
    }

    #[cfg(all(
        not(feature = "enhanced-determinism"),
        any(target_arch = "x86", target_arch = "x86_64"),
        target_feature = "sse"
    ))]
    pub fn flush_denormal_to_zero() -> Self {
        unsafe {
            #[cfg(target_arch = "x86")]
            use std::arch::x86::{_mm_getcsr, _mm_setcsr, _MM_FLUSH_ZERO_ON};
            #[cfg(target_arch = "x86_64")]
            use std::arch::x86_64::{_mm_getcsr, _mm_setcsr, _MM_FLUSH_ZERO_ON};

            let original_flags = _mm_getcsr();
            _mm_setcsr(original_flags | _MM_FLUSH_ZERO_ON | (1 << 6));
            Self { original_flags }
        }
    }
}

#[cfg(all(
    not(feature = "enhanced-determinism"),
    any(target_arch = "x86", target_arch = "x86_64"),
    target_feature = "sse"
))]
impl Drop for FlushToZeroDenormalsAreZeroFlags {
    fn drop(&mut self) {
        #[cfg(target_arch = "x86")]
        unsafe {
            std::arch::x86::_mm_setcsr(self.original_flags)
        }
        #[cfg(target_arch = "x86_64")]
        unsafe {
            std::arch::x86_64::_mm_setcsr(self.original_flags)
        }
    }
}

#[macro_export]
macro_rules! enable_flush_to_zero {
    () => {
        let _flush_to_zero_reset_guard =
            $crate::utils::FlushToZeroDenormalsAreZeroFlags::flush_denormal_to_zero();
    };
}

/// Methods for simultaneously indexing a container with two distinct indices.
pub trait IndexMut2<I>: IndexMut<I> {
    fn index_mut2(&mut self, i: usize, j: usize) -> (&mut Self::Output, &mut Self::Output);
}

impl<T> IndexMut2<usize> for Vec<T> {
    fn index_mut2(&mut self, i: usize, j: usize) -> (&mut T, &mut T) {
        assert!(i != j, "Unable to index the same element twice.");
        assert!(i < self.len() && j < self.len(), "Index out of bounds.");

        unsafe {
            let a = &mut *(self.get_unchecked_mut(i) as *mut _);
            let b = &mut *(self.get_unchecked_mut(j) as *mut _);
            (a, b)
        }
    }
}

impl<T> IndexMut2<usize> for [T] {
    fn index_mut2(&mut self, i: usize, j: usize) -> (&mut T, &mut T) {
        assert!(i != j, "Unable to index the same element twice.");
        assert!(i < self.len() && j < self.len(), "Index out of bounds.");

        unsafe {
            let a = &mut *(self.get_unchecked_mut(i) as *mut _);
            let b = &mut *(self.get_unchecked_mut(j) as *mut _);
            (a, b)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sdp_matrix3_inverse_identity() {
        let m = SdpMatrix3::<Real>::identity();
        let inv = m.inverse();
        assert_eq!(inv, SdpMatrix3::identity());
    }

    #[test]
    fn sdp_matrix3_inverse_roundtrip() {
        let m = SdpMatrix3 {
            m11: 2.0,
            m12: 0.0,
            m13: 0.0,
            m22: 3.0,
            m23: 0.0,
            m33: 4.0,
        };
        let inv = m.inverse();
        let v = Vector3::new(1.0, 1.0, 1.0);
        let roundtrip = inv.transform_vector(m.transform_vector(v));
        assert!((roundtrip - v).norm() < 1e-5);
    }

    #[test]
    fn orthonormal_basis_is_orthogonal() {
        let n = Vector3::new(0.0_f32, 0.0, 1.0);
        let [t1, t2] = n.orthonormal_basis();
        assert!(t1.dot(&n).abs() < 1e-6);
        assert!(t2.dot(&n).abs() < 1e-6);
        assert!(t1.dot(&t2).abs() < 1e-6);
    }
}

//! Scalar, vector and SIMD-lane type aliases shared by the whole crate.
//!
//! Everything above this module is written in terms of these aliases rather
//! than `f32`/`nalgebra::Vector3` directly, so that a future `f64` build only
//! requires touching this file.

use na::{Isometry3, Matrix3, Quaternion, UnitQuaternion, Vector3};

#[cfg(feature = "f64")]
pub type Real = f64;
#[cfg(not(feature = "f64"))]
pub type Real = f32;

pub type Vector = Vector3<Real>;
pub type Point = na::Point3<Real>;
pub type Rotation = UnitQuaternion<Real>;
pub type Isometry = Isometry3<Real>;
pub type AngVector = Vector3<Real>;
pub type Quat = Quaternion<Real>;
pub type SymmetricMatrix = crate::utils::SdpMatrix3<Real>;
pub type AngularInertia = SymmetricMatrix;
pub type CrossMatrix = Matrix3<Real>;

/// Spatial dimension of the world this crate simulates (always 3 here; the
/// teacher workspace supported a `dim2` feature as well but §1 of the
/// specification is explicitly 3-D: positions are three components and
/// orientations are unit quaternions).
pub const DIM: usize = 3;

/// Number of scalar degrees of freedom of a single rigid body (3 linear + 3
/// angular).
pub const SPATIAL_DIM: usize = 6;

/// Threshold below which an angular velocity is treated as exactly zero
/// during orientation integration (§4.4 step 2).
pub const ANGULAR_VELOCITY_EPSILON: Real = 1e-15;

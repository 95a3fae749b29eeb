//! Rotation and angle primitives shared by every prior residual.
//!
//! All functions are generic over [`RealField`] so the same formula is
//! evaluated over `f64` and over the dual numbers `tiny_solver` uses for
//! automatic differentiation. Rotations are axis-angle 3-vectors: the
//! direction is the rotation axis and the norm is the angle in radians.

use nalgebra::{RealField, Vector3};

/// Lifts an `f64` constant into the scalar type of the residual.
#[inline]
pub fn constant<T: RealField>(value: f64) -> T {
    nalgebra::convert(value)
}

/// Lifts an `f64` vector into the scalar type of the residual.
#[inline]
pub fn constant_vector<T: RealField>(v: &Vector3<f64>) -> Vector3<T> {
    Vector3::new(constant(v.x), constant(v.y), constant(v.z))
}

/// Real part of a scalar, dropping any derivative it carries.
#[inline]
pub fn real_part<T: RealField>(value: &T) -> f64 {
    nalgebra::convert_ref_unchecked(value)
}

/// Rotates `point` by the axis-angle rotation `angle_axis`.
///
/// Uses the Rodrigues formula
/// `p cos θ + (w × p) sin θ + w (w · p)(1 − cos θ)` with `w` the unit axis.
/// When `θ²` is below machine epsilon the first-order expansion `p + r × p`
/// is used instead, so that the derivative at the identity stays finite.
///
/// # Arguments
///
/// * `angle_axis` - Axis-angle rotation.
/// * `point` - Vector to rotate.
///
/// # Returns
///
/// The rotated vector `R(angle_axis) · point`.
pub fn rotate_point<T: RealField>(angle_axis: &Vector3<T>, point: &Vector3<T>) -> Vector3<T> {
    let theta2 = angle_axis.dot(angle_axis);
    if theta2 > constant(f64::EPSILON) {
        let theta = theta2.sqrt();
        let cos_theta = theta.clone().cos();
        let sin_theta = theta.clone().sin();
        let w = angle_axis / theta;

        let w_cross_pt = w.cross(point);
        let tmp = w.dot(point) * (T::one() - cos_theta.clone());

        point * cos_theta + w_cross_pt * sin_theta + w * tmp
    } else {
        point + angle_axis.cross(point)
    }
}

/// Unit quaternion stored as scalar part and vector part.
#[derive(Debug, Clone, PartialEq)]
struct Quat<T: RealField> {
    w: T,
    v: Vector3<T>,
}

impl<T: RealField> Quat<T> {
    fn from_angle_axis(angle_axis: &Vector3<T>) -> Self {
        let theta2 = angle_axis.dot(angle_axis);
        if theta2 > constant(f64::EPSILON) {
            let theta = theta2.sqrt();
            let half_theta = theta.clone() * constant(0.5);
            let k = half_theta.clone().sin() / theta;
            Quat {
                w: half_theta.cos(),
                v: angle_axis * k,
            }
        } else {
            // sin(θ/2)/θ → 1/2
            Quat {
                w: T::one(),
                v: angle_axis * constant::<T>(0.5),
            }
        }
    }

    fn to_angle_axis(&self) -> Vector3<T> {
        let sin_squared = self.v.dot(&self.v);
        if sin_squared > constant(f64::EPSILON) {
            let sin_theta = sin_squared.sqrt();
            let cos_theta = self.w.clone();
            // Keep the angle in [-π, π] for q and -q.
            let half_angle = if cos_theta < T::zero() {
                (-sin_theta.clone()).atan2(-cos_theta)
            } else {
                sin_theta.clone().atan2(cos_theta)
            };
            let k = half_angle * constant(2.0) / sin_theta;
            &self.v * k
        } else {
            &self.v * constant::<T>(2.0)
        }
    }

    fn compose(&self, rhs: &Quat<T>) -> Quat<T> {
        Quat {
            w: self.w.clone() * rhs.w.clone() - self.v.dot(&rhs.v),
            v: &rhs.v * self.w.clone() + &self.v * rhs.w.clone() + self.v.cross(&rhs.v),
        }
    }
}

/// Composes two axis-angle rotations, returning the axis-angle of `R(a) · R(b)`.
///
/// Applying the result to a point is the same as rotating by `b` first and
/// then by `a`.
pub fn compose_rotations<T: RealField>(a: &Vector3<T>, b: &Vector3<T>) -> Vector3<T> {
    let qa = Quat::from_angle_axis(a);
    let qb = Quat::from_angle_axis(b);
    qa.compose(&qb).to_angle_axis()
}

/// Signed difference `a - b` wrapped once into `[-π, π]`.
///
/// Only a single `±2π` correction is applied, callers pass angles that are
/// already within one turn of each other.
pub fn diff_between_angles<T: RealField>(a: T, b: T) -> T {
    let d = a - b;
    if d > T::pi() {
        d - T::two_pi()
    } else if d < -T::pi() {
        d + T::two_pi()
    } else {
        d
    }
}

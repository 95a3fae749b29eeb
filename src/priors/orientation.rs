//! Orientation priors: gravity direction and pan / tilt / roll angles.
//!
//! The angle priors compute the predicted angle from the rotated camera axes
//! and compare it to the target with [`diff_between_angles`], so targets near
//! ±π do not produce a 2π jump. Near the singular configurations of each
//! angle (the angle is undefined or its derivative blows up) the residual is
//! set to zero, which also removes its gradient contribution.

use crate::geometry::{constant, constant_vector, diff_between_angles, rotate_point};
use crate::pose::{ShotLayout, ShotPose, POSE_DIM};
use crate::priors::PriorCost;

use nalgebra::{DVector, RealField, Vector3};
use tiny_solver::factors::Factor;

/// Below this, the rotated optical axis is considered vertical for pan.
const PAN_EPSILON: f64 = 1e-8;
/// Degeneracy threshold for roll.
const ROLL_EPSILON: f64 = 1e-5;

fn z_axis<T: RealField>() -> Vector3<T> {
    Vector3::new(T::zero(), T::zero(), T::one())
}

fn x_axis<T: RealField>() -> Vector3<T> {
    Vector3::new(T::one(), T::zero(), T::zero())
}

/// Prior on the gravity direction measured by a camera-mounted accelerometer.
///
/// The measured acceleration (camera frame) rotated into the world must
/// match the world vertical `(0, 0, 1)`.
#[derive(Debug, Clone)]
pub struct UpVectorCost {
    acceleration: Vector3<f64>,
    layout: ShotLayout,
    scale: f64,
}

impl UpVectorCost {
    /// # Arguments
    ///
    /// * `acceleration` - Measured acceleration in the camera frame, normalized here.
    /// * `std_deviation` - Standard deviation of the unit up-vector components.
    /// * `layout` - Whether the shot belongs to a rig.
    pub fn new(acceleration: Vector3<f64>, std_deviation: f64, layout: ShotLayout) -> Self {
        Self {
            acceleration: acceleration.try_normalize(0.0).unwrap_or(acceleration),
            layout,
            scale: 1.0 / std_deviation,
        }
    }

    pub fn acceleration(&self) -> &Vector3<f64> {
        &self.acceleration
    }
}

impl<T: RealField> Factor<T> for UpVectorCost {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        let rotation = self.layout.rotation(params);
        let acceleration = constant_vector::<T>(&self.acceleration);
        let z_world = rotate_point(&rotation, &acceleration);
        let residual = (z_world - z_axis::<T>()) * constant::<T>(self.scale);
        DVector::from_column_slice(residual.as_slice())
    }
}

impl PriorCost for UpVectorCost {
    const NAME: &'static str = "UpVectorCost";

    fn residual_dim(&self) -> usize {
        3
    }

    fn parameter_block_sizes(&self) -> Vec<usize> {
        self.layout.block_sizes()
    }
}

/// Prior on the heading (pan) of a shot.
///
/// The predicted angle is `atan2(z.x, z.y)` with `z` the optical axis in the
/// world, i.e. measured from the world Y axis towards X.
#[derive(Debug, Clone)]
pub struct PanAngleCost {
    angle: f64,
    scale: f64,
}

impl PanAngleCost {
    pub fn new(angle: f64, std_deviation: f64) -> Self {
        Self {
            angle,
            scale: 1.0 / std_deviation,
        }
    }
}

impl<T: RealField> Factor<T> for PanAngleCost {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        let rotation = ShotPose::from_block(&params[0]).rotation;
        let z_world = rotate_point(&rotation, &z_axis());

        let eps = constant::<T>(PAN_EPSILON);
        if z_world.x.clone().abs() < eps.clone() && z_world.y.clone().abs() < eps {
            return DVector::from_element(1, T::zero());
        }

        let predicted = z_world.x.clone().atan2(z_world.y.clone());
        let residual =
            constant::<T>(self.scale) * diff_between_angles(predicted, constant(self.angle));
        DVector::from_element(1, residual)
    }
}

impl PriorCost for PanAngleCost {
    const NAME: &'static str = "PanAngleCost";

    fn residual_dim(&self) -> usize {
        1
    }

    fn parameter_block_sizes(&self) -> Vec<usize> {
        vec![POSE_DIM]
    }
}

/// Prior on the tilt of a shot: the elevation of the optical axis, positive
/// when the camera looks down.
#[derive(Debug, Clone)]
pub struct TiltAngleCost {
    angle: f64,
    scale: f64,
}

impl TiltAngleCost {
    pub fn new(angle: f64, std_deviation: f64) -> Self {
        Self {
            angle,
            scale: 1.0 / std_deviation,
        }
    }
}

impl<T: RealField> Factor<T> for TiltAngleCost {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        let rotation = ShotPose::from_block(&params[0]).rotation;
        let ez = rotate_point(&rotation, &z_axis());

        let l = (ez.x.clone() * ez.x.clone() + ez.y.clone() * ez.y.clone()).sqrt();
        let predicted = -ez.z.clone().atan2(l);

        let residual =
            constant::<T>(self.scale) * diff_between_angles(predicted, constant(self.angle));
        DVector::from_element(1, residual)
    }
}

impl PriorCost for TiltAngleCost {
    const NAME: &'static str = "TiltAngleCost";

    fn residual_dim(&self) -> usize {
        1
    }

    fn parameter_block_sizes(&self) -> Vec<usize> {
        vec![POSE_DIM]
    }
}

/// Prior on the roll of a shot around its optical axis.
#[derive(Debug, Clone)]
pub struct RollAngleCost {
    angle: f64,
    scale: f64,
}

impl RollAngleCost {
    pub fn new(angle: f64, std_deviation: f64) -> Self {
        Self {
            angle,
            scale: 1.0 / std_deviation,
        }
    }
}

impl<T: RealField> Factor<T> for RollAngleCost {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        let rotation = ShotPose::from_block(&params[0]).rotation;
        let ex = rotate_point(&rotation, &x_axis());
        let ez = rotate_point(&rotation, &z_axis());

        // Horizontal axis orthogonal to the optical axis.
        let a = Vector3::new(ez.y.clone(), -ez.x.clone(), T::zero());
        let la = (a.x.clone() * a.x.clone() + a.y.clone() * a.y.clone()).sqrt();

        let eps = constant::<T>(ROLL_EPSILON);
        if la < eps {
            return DVector::from_element(1, T::zero());
        }

        let a = Vector3::new(a.x.clone() / la.clone(), a.y.clone() / la, a.z.clone());
        let b = ex.cross(&a);
        let sin_roll = ez.dot(&b);
        if sin_roll <= -(T::one() - eps) {
            return DVector::from_element(1, T::zero());
        }

        let predicted = sin_roll.asin();
        let residual =
            constant::<T>(self.scale) * diff_between_angles(predicted, constant(self.angle));
        DVector::from_element(1, residual)
    }
}

impl PriorCost for RollAngleCost {
    const NAME: &'static str = "RollAngleCost";

    fn residual_dim(&self) -> usize {
        1
    }

    fn parameter_block_sizes(&self) -> Vec<usize> {
        vec![POSE_DIM]
    }
}

//! Typed views over the flat parameter blocks the solver optimizes.
//!
//! The solver stores every variable as a `DVector`. This module converts the
//! blocks a residual receives into [`ShotPose`] and [`Bias`] values, and
//! resolves rig shots (an instance pose composed with a per-camera offset)
//! through [`ShotLayout`].
//!
//! Conventions: the rotation of a pose maps camera-frame directions into the
//! world frame and the translation is the camera position in the world.

use crate::geometry::{compose_rotations, rotate_point};
use nalgebra::{DVector, RealField, Vector3};
use serde::{Deserialize, Serialize};

/// Size of a shot pose block: `[rx, ry, rz, tx, ty, tz]`.
pub const POSE_DIM: usize = 6;
/// Size of a bias block: `[rx, ry, rz, tx, ty, tz, scale]`.
pub const BIAS_DIM: usize = 7;
/// Size of a 3D point block: `[x, y, z]`.
pub const POINT_DIM: usize = 3;
/// Size of an optimized standard deviation block: `[sigma]`.
pub const STD_DEVIATION_DIM: usize = 1;

/// Pose of a shot (or of a rig instance / rig camera) in axis-angle form.
#[derive(Debug, Clone, PartialEq)]
pub struct ShotPose<T: RealField> {
    /// Axis-angle rotation from camera frame to world frame.
    pub rotation: Vector3<T>,
    /// Camera position in the world frame.
    pub translation: Vector3<T>,
}

impl<T: RealField> ShotPose<T> {
    pub const RX: usize = 0;
    pub const RY: usize = 1;
    pub const RZ: usize = 2;
    pub const TX: usize = 3;
    pub const TY: usize = 4;
    pub const TZ: usize = 5;

    pub fn new(rotation: Vector3<T>, translation: Vector3<T>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    pub fn identity() -> Self {
        Self::new(Vector3::zeros(), Vector3::zeros())
    }

    /// Reads a pose from a parameter block laid out as `[r(3), t(3)]`.
    pub fn from_block(block: &DVector<T>) -> Self {
        debug_assert!(block.len() >= POSE_DIM, "pose block must have 6 values");
        Self {
            rotation: Vector3::new(
                block[Self::RX].clone(),
                block[Self::RY].clone(),
                block[Self::RZ].clone(),
            ),
            translation: Vector3::new(
                block[Self::TX].clone(),
                block[Self::TY].clone(),
                block[Self::TZ].clone(),
            ),
        }
    }

    /// Flattens the pose into a parameter block.
    pub fn to_block(&self) -> DVector<T> {
        DVector::from_iterator(
            POSE_DIM,
            self.rotation.iter().chain(self.translation.iter()).cloned(),
        )
    }

    /// Composes this (instance) pose with a per-camera offset expressed in
    /// the instance frame: rotation `R_i · R_c`, translation `t_i + R_i · t_c`.
    pub fn compose(&self, camera: &ShotPose<T>) -> ShotPose<T> {
        ShotPose {
            rotation: compose_rotations(&self.rotation, &camera.rotation),
            translation: &self.translation + rotate_point(&self.rotation, &camera.translation),
        }
    }

    /// Maps a point from the camera frame into the world frame.
    pub fn transform_point(&self, point: &Vector3<T>) -> Vector3<T> {
        rotate_point(&self.rotation, point) + &self.translation
    }
}

/// Similarity transform applied to a position prior before it is compared
/// with the optimized shot positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Bias<T: RealField> {
    pub rotation: Vector3<T>,
    pub translation: Vector3<T>,
    pub scale: T,
}

impl<T: RealField> Bias<T> {
    pub const RX: usize = 0;
    pub const TX: usize = 3;
    pub const SCALE: usize = 6;

    pub fn new(rotation: Vector3<T>, translation: Vector3<T>, scale: T) -> Self {
        Self {
            rotation,
            translation,
            scale,
        }
    }

    pub fn identity() -> Self {
        Self::new(Vector3::zeros(), Vector3::zeros(), T::one())
    }

    /// Reads a bias from a parameter block laid out as `[r(3), t(3), scale]`.
    pub fn from_block(block: &DVector<T>) -> Self {
        debug_assert!(block.len() >= BIAS_DIM, "bias block must have 7 values");
        let pose = ShotPose::from_block(block);
        Self {
            rotation: pose.rotation,
            translation: pose.translation,
            scale: block[Self::SCALE].clone(),
        }
    }

    pub fn to_block(&self) -> DVector<T> {
        DVector::from_iterator(
            BIAS_DIM,
            self.rotation
                .iter()
                .chain(self.translation.iter())
                .chain(std::iter::once(&self.scale))
                .cloned(),
        )
    }

    /// Applies `scale · R · p + t`.
    pub fn transform_point(&self, point: &Vector3<T>) -> Vector3<T> {
        rotate_point(&self.rotation, point) * self.scale.clone() + &self.translation
    }
}

/// Which parameter blocks describe the pose of a shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotLayout {
    /// One pose block at index 0.
    #[default]
    Single,
    /// Rig instance pose at index 0 and per-camera offset at index 1.
    Rig,
}

impl ShotLayout {
    /// Number of pose blocks this layout reads, always leading the
    /// parameter list of the residual.
    pub fn num_blocks(&self) -> usize {
        match self {
            ShotLayout::Single => 1,
            ShotLayout::Rig => 2,
        }
    }

    pub fn block_sizes(&self) -> Vec<usize> {
        vec![POSE_DIM; self.num_blocks()]
    }

    /// Effective world pose of the shot.
    pub fn pose<T: RealField>(&self, params: &[DVector<T>]) -> ShotPose<T> {
        let instance = ShotPose::from_block(&params[0]);
        match self {
            ShotLayout::Single => instance,
            ShotLayout::Rig => instance.compose(&ShotPose::from_block(&params[1])),
        }
    }

    /// Effective world rotation of the shot.
    pub fn rotation<T: RealField>(&self, params: &[DVector<T>]) -> Vector3<T> {
        match self {
            ShotLayout::Single => ShotPose::from_block(&params[0]).rotation,
            ShotLayout::Rig => self.pose(params).rotation,
        }
    }

    /// Effective world position (optical center) of the shot.
    pub fn position<T: RealField>(&self, params: &[DVector<T>]) -> Vector3<T> {
        match self {
            ShotLayout::Single => ShotPose::from_block(&params[0]).translation,
            ShotLayout::Rig => {
                let instance = ShotPose::from_block(&params[0]);
                let camera = ShotPose::from_block(&params[1]);
                instance.translation + rotate_point(&instance.rotation, &camera.translation)
            }
        }
    }
}

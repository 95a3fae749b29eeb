//! Absolute position priors on shots and on 3D points.

use crate::geometry::{constant, constant_vector};
use crate::pose::{ShotLayout, POINT_DIM, STD_DEVIATION_DIM};
use crate::priors::PriorCost;

use nalgebra::{DVector, RealField, Vector3};
use serde::{Deserialize, Serialize};
use tiny_solver::factors::Factor;

/// A world axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Axes of a position residual that are constrained by the prior.
///
/// Residual components of disabled axes are forced to zero, the residual
/// keeps its three components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionConstraint {
    pub x: bool,
    pub y: bool,
    pub z: bool,
}

impl PositionConstraint {
    pub const X: Self = Self::new(true, false, false);
    pub const Y: Self = Self::new(false, true, false);
    pub const Z: Self = Self::new(false, false, true);
    pub const XY: Self = Self::new(true, true, false);
    pub const XYZ: Self = Self::new(true, true, true);

    pub const fn new(x: bool, y: bool, z: bool) -> Self {
        Self { x, y, z }
    }

    pub fn from_axes(axes: &[Axis]) -> Self {
        axes.iter().fold(Self::new(false, false, false), |c, axis| match axis {
            Axis::X => Self { x: true, ..c },
            Axis::Y => Self { y: true, ..c },
            Axis::Z => Self { z: true, ..c },
        })
    }

    pub fn contains(&self, axis: Axis) -> bool {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

impl Default for PositionConstraint {
    fn default() -> Self {
        Self::XYZ
    }
}

/// How the uncertainty of an [`AbsolutePositionCost`] is expressed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionUncertainty {
    /// Fixed horizontal (X, Y) and vertical (Z) standard deviations.
    Fixed { horizontal: f64, vertical: f64 },
    /// A single standard deviation optimized as its own parameter block,
    /// placed right after the shot pose blocks.
    Parameter,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Scaling {
    Fixed { scale_xy: f64, scale_z: f64 },
    Parameter,
}

/// Prior on the position of a shot, e.g. from GPS.
///
/// Residual: `prior - position`, divided by the standard deviation and with
/// unconstrained axes set to zero.
#[derive(Debug, Clone)]
pub struct AbsolutePositionCost {
    layout: ShotLayout,
    position_prior: Vector3<f64>,
    scaling: Scaling,
    constraint: PositionConstraint,
}

impl AbsolutePositionCost {
    pub fn new(
        layout: ShotLayout,
        position_prior: Vector3<f64>,
        uncertainty: PositionUncertainty,
        constraint: PositionConstraint,
    ) -> Self {
        let scaling = match uncertainty {
            PositionUncertainty::Fixed {
                horizontal,
                vertical,
            } => Scaling::Fixed {
                scale_xy: 1.0 / horizontal,
                scale_z: 1.0 / vertical,
            },
            PositionUncertainty::Parameter => Scaling::Parameter,
        };
        Self {
            layout,
            position_prior,
            scaling,
            constraint,
        }
    }

    pub fn has_std_deviation_param(&self) -> bool {
        self.scaling == Scaling::Parameter
    }

    pub fn constraint(&self) -> PositionConstraint {
        self.constraint
    }
}

impl<T: RealField> Factor<T> for AbsolutePositionCost {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        let position = self.layout.position(params);
        let mut residual = constant_vector::<T>(&self.position_prior) - position;

        match self.scaling {
            Scaling::Parameter => {
                let std_deviation = params[self.layout.num_blocks()][0].clone();
                residual /= std_deviation;
            }
            Scaling::Fixed { scale_xy, scale_z } => {
                residual[0] *= constant::<T>(scale_xy);
                residual[1] *= constant::<T>(scale_xy);
                residual[2] *= constant::<T>(scale_z);
            }
        }

        for axis in Axis::ALL {
            if !self.constraint.contains(axis) {
                residual[axis.index()] *= T::zero();
            }
        }

        DVector::from_column_slice(residual.as_slice())
    }
}

impl PriorCost for AbsolutePositionCost {
    const NAME: &'static str = "AbsolutePositionCost";

    fn residual_dim(&self) -> usize {
        3
    }

    fn parameter_block_sizes(&self) -> Vec<usize> {
        let mut sizes = self.layout.block_sizes();
        if self.has_std_deviation_param() {
            sizes.push(STD_DEVIATION_DIM);
        }
        sizes
    }
}

/// Prior on the position of a 3D point.
///
/// Residual: `(point - prior) / std_deviation`.
#[derive(Debug, Clone)]
pub struct PointPositionPriorCost {
    position: Vector3<f64>,
    scale: f64,
}

impl PointPositionPriorCost {
    pub fn new(position: Vector3<f64>, std_deviation: f64) -> Self {
        Self {
            position,
            scale: 1.0 / std_deviation,
        }
    }
}

impl<T: RealField> Factor<T> for PointPositionPriorCost {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        let p = &params[0];
        let scale = constant::<T>(self.scale);
        DVector::from_fn(POINT_DIM, |i, _| {
            scale.clone() * (p[i].clone() - constant::<T>(self.position[i]))
        })
    }
}

impl PriorCost for PointPositionPriorCost {
    const NAME: &'static str = "PointPositionPriorCost";

    fn residual_dim(&self) -> usize {
        3
    }

    fn parameter_block_sizes(&self) -> Vec<usize> {
        vec![POINT_DIM]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::ShotPose;
    use crate::priors::test_utils::assert_jacobian_matches;
    use approx::assert_relative_eq;

    fn shot_at(position: Vector3<f64>) -> DVector<f64> {
        ShotPose::new(Vector3::new(0.1, -0.2, 0.3), position).to_block()
    }

    #[test]
    fn test_constraint_from_axes() {
        assert_eq!(
            PositionConstraint::from_axes(&[Axis::X, Axis::Y]),
            PositionConstraint::XY
        );
        assert_eq!(PositionConstraint::from_axes(&Axis::ALL), PositionConstraint::XYZ);
        assert!(!PositionConstraint::Z.contains(Axis::X));
        assert!(PositionConstraint::Z.contains(Axis::Z));
    }

    #[test]
    fn test_absolute_position_fixed_std() {
        let cost = AbsolutePositionCost::new(
            ShotLayout::Single,
            Vector3::new(0.0, 0.0, 10.0),
            PositionUncertainty::Fixed {
                horizontal: 1.0,
                vertical: 2.0,
            },
            PositionConstraint::XYZ,
        );
        let params = vec![shot_at(Vector3::new(1.0, 0.0, 10.0))];
        let residual: DVector<f64> = cost.residual_func(&params);
        assert_eq!(residual.len(), 3);
        assert_relative_eq!(residual[0], -1.0);
        assert_relative_eq!(residual[1], 0.0);
        assert_relative_eq!(residual[2], 0.0);
    }

    #[test]
    fn test_absolute_position_vertical_scale() {
        let cost = AbsolutePositionCost::new(
            ShotLayout::Single,
            Vector3::new(0.0, 0.0, 10.0),
            PositionUncertainty::Fixed {
                horizontal: 1.0,
                vertical: 2.0,
            },
            PositionConstraint::XYZ,
        );
        let residual: DVector<f64> =
            cost.residual_func(&[shot_at(Vector3::new(0.0, 0.0, 14.0))]);
        assert_relative_eq!(residual[2], 0.5 * (10.0 - 14.0));
    }

    #[test]
    fn test_absolute_position_y_only_mask() {
        let horizontal = 0.25;
        let cost = AbsolutePositionCost::new(
            ShotLayout::Single,
            Vector3::new(3.0, -4.0, 5.0),
            PositionUncertainty::Fixed {
                horizontal,
                vertical: 7.0,
            },
            PositionConstraint::Y,
        );

        for predicted in [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(10.0, 2.0, -30.0),
            Vector3::new(-1.5, -4.0, 5.0),
        ] {
            let residual: DVector<f64> = cost.residual_func(&[shot_at(predicted)]);
            assert_eq!(residual[0], 0.0);
            assert_eq!(residual[2], 0.0);
            assert_relative_eq!(residual[1], (1.0 / horizontal) * (-4.0 - predicted.y));
        }
    }

    #[test]
    fn test_absolute_position_std_parameter() {
        let cost = AbsolutePositionCost::new(
            ShotLayout::Single,
            Vector3::new(2.0, 4.0, 6.0),
            PositionUncertainty::Parameter,
            PositionConstraint::XYZ,
        );
        assert_eq!(cost.parameter_block_sizes(), vec![6, 1]);

        let params = vec![
            shot_at(Vector3::new(0.0, 0.0, 0.0)),
            DVector::from_vec(vec![2.0]),
        ];
        let residual: DVector<f64> = cost.residual_func(&params);
        assert_relative_eq!(residual, DVector::from_vec(vec![1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_absolute_position_rig_layout() {
        let instance = ShotPose::new(
            Vector3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2),
            Vector3::new(1.0, 1.0, 0.0),
        );
        // Camera 2 units along the instance x axis, which points along world y.
        let camera = ShotPose::new(Vector3::zeros(), Vector3::new(2.0, 0.0, 0.0));
        let cost = AbsolutePositionCost::new(
            ShotLayout::Rig,
            Vector3::new(1.0, 3.0, 0.0),
            PositionUncertainty::Fixed {
                horizontal: 1.0,
                vertical: 1.0,
            },
            PositionConstraint::XYZ,
        );
        assert_eq!(cost.parameter_block_sizes(), vec![6, 6]);
        let residual: DVector<f64> =
            cost.residual_func(&[instance.to_block(), camera.to_block()]);
        assert_relative_eq!(residual, DVector::zeros(3), epsilon = 1e-12);
    }

    #[test]
    fn test_absolute_position_jacobian() {
        let cost = AbsolutePositionCost::new(
            ShotLayout::Rig,
            Vector3::new(1.0, 2.0, 3.0),
            PositionUncertainty::Fixed {
                horizontal: 0.5,
                vertical: 2.0,
            },
            PositionConstraint::XY,
        );
        let params = vec![
            ShotPose::new(Vector3::new(0.2, 0.1, -0.4), Vector3::new(0.5, 1.0, 2.0)).to_block(),
            ShotPose::new(Vector3::new(0.0, 0.3, 0.1), Vector3::new(0.1, -0.2, 0.3)).to_block(),
        ];
        assert_jacobian_matches(cost, &params, 1e-6);

        let cost = AbsolutePositionCost::new(
            ShotLayout::Single,
            Vector3::new(1.0, 2.0, 3.0),
            PositionUncertainty::Parameter,
            PositionConstraint::XYZ,
        );
        let params = vec![shot_at(Vector3::new(0.0, 1.0, 4.0)), DVector::from_vec(vec![1.5])];
        assert_jacobian_matches(cost, &params, 1e-6);
    }

    #[test]
    fn test_point_position_prior_at_prior_is_zero() {
        for std_deviation in [0.01, 1.0, 250.0] {
            let cost = PointPositionPriorCost::new(Vector3::new(1.0, 2.0, 3.0), std_deviation);
            let residual: DVector<f64> =
                cost.residual_func(&[DVector::from_vec(vec![1.0, 2.0, 3.0])]);
            assert_eq!(residual, DVector::zeros(3));
        }
    }

    #[test]
    fn test_point_position_prior_scaled() {
        let cost = PointPositionPriorCost::new(Vector3::new(1.0, 2.0, 3.0), 0.5);
        let residual: DVector<f64> =
            cost.residual_func(&[DVector::from_vec(vec![2.0, 2.0, 1.0])]);
        assert_relative_eq!(residual, DVector::from_vec(vec![2.0, 0.0, -4.0]));
        assert_jacobian_matches(cost, &[DVector::from_vec(vec![2.0, 2.0, 1.0])], 1e-6);
    }
}

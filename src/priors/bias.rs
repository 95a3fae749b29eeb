//! Position prior expressed through a bias transform.

use crate::geometry::{constant, constant_vector};
use crate::pose::{Bias, ShotPose, BIAS_DIM, POSE_DIM};
use crate::priors::PriorCost;

use nalgebra::{DVector, RealField, Vector3};
use tiny_solver::factors::Factor;

/// Compares the position of a shot with a prior mapped through an optimized
/// [`Bias`]: `scale · R · prior + t`.
///
/// Parameter blocks: the shot pose, then the bias.
#[derive(Debug, Clone)]
pub struct PositionPriorCost {
    position_prior: Vector3<f64>,
    scale: f64,
}

impl PositionPriorCost {
    pub fn new(position_prior: Vector3<f64>, std_deviation: f64) -> Self {
        Self {
            position_prior,
            scale: 1.0 / std_deviation,
        }
    }
}

impl<T: RealField> Factor<T> for PositionPriorCost {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        let shot = ShotPose::from_block(&params[0]);
        let bias = Bias::from_block(&params[1]);

        let prior = constant_vector::<T>(&self.position_prior);
        let predicted = bias.transform_point(&prior);
        let residual = (shot.translation - predicted) * constant::<T>(self.scale);
        DVector::from_column_slice(residual.as_slice())
    }
}

impl PriorCost for PositionPriorCost {
    const NAME: &'static str = "PositionPriorCost";

    fn residual_dim(&self) -> usize {
        3
    }

    fn parameter_block_sizes(&self) -> Vec<usize> {
        vec![POSE_DIM, BIAS_DIM]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::priors::test_utils::assert_jacobian_matches;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_identity_bias() {
        let cost = PositionPriorCost::new(Vector3::new(1.0, 2.0, 3.0), 0.5);
        let shot = ShotPose::new(Vector3::new(0.3, 0.0, 0.1), Vector3::new(2.0, 2.0, 2.0));
        let residual: DVector<f64> =
            cost.residual_func(&[shot.to_block(), Bias::identity().to_block()]);
        assert_relative_eq!(residual, DVector::from_vec(vec![2.0, 0.0, -2.0]), epsilon = 1e-12);
    }

    #[test]
    fn test_similarity_bias() {
        // prior (1,0,0) rotated 90 deg around z is (0,1,0), scaled by 2 and
        // shifted by (10,0,0): the shot is expected at (10,2,0).
        let cost = PositionPriorCost::new(Vector3::new(1.0, 0.0, 0.0), 1.0);
        let bias = Bias::new(
            Vector3::new(0.0, 0.0, FRAC_PI_2),
            Vector3::new(10.0, 0.0, 0.0),
            2.0,
        );
        let shot = ShotPose::new(Vector3::zeros(), Vector3::new(10.0, 2.0, 0.0));
        let residual: DVector<f64> = cost.residual_func(&[shot.to_block(), bias.to_block()]);
        assert_relative_eq!(residual, DVector::zeros(3), epsilon = 1e-12);
    }

    #[test]
    fn test_position_prior_jacobian() {
        let cost = PositionPriorCost::new(Vector3::new(4.0, -1.0, 2.0), 0.3);
        let shot = ShotPose::new(Vector3::new(0.1, 0.2, 0.3), Vector3::new(1.0, 0.5, -2.0));
        let bias = Bias::new(
            Vector3::new(-0.2, 0.4, 0.1),
            Vector3::new(0.5, 0.0, 1.0),
            1.3,
        );
        assert_jacobian_matches(cost, &[shot.to_block(), bias.to_block()], 1e-6);
    }
}

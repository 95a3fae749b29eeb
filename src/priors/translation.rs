//! Unit-norm regularizer on shot translations.

use crate::pose::{ShotPose, POSE_DIM};
use crate::priors::PriorCost;

use nalgebra::{DVector, RealField};
use tiny_solver::factors::Factor;

/// Pulls the translation of a shot towards unit norm.
///
/// Residual: `ln(|t|²)`, zero exactly when `|t| = 1`. Used to fix the gauge
/// of reconstructions without absolute scale.
#[derive(Debug, Clone, Default)]
pub struct UnitTranslationPriorCost;

impl UnitTranslationPriorCost {
    pub fn new() -> Self {
        Self
    }
}

impl<T: RealField> Factor<T> for UnitTranslationPriorCost {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        let t = ShotPose::from_block(&params[0]).translation;
        DVector::from_element(1, t.norm_squared().ln())
    }
}

impl PriorCost for UnitTranslationPriorCost {
    const NAME: &'static str = "UnitTranslationPriorCost";

    fn residual_dim(&self) -> usize {
        1
    }

    fn parameter_block_sizes(&self) -> Vec<usize> {
        vec![POSE_DIM]
    }
}

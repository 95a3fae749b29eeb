//! The `priors` module provides the residual costs that tie camera poses and
//! 3D points to external priors during bundle adjustment.
//!
//! Every cost implements [`tiny_solver::factors::Factor`] for any
//! [`nalgebra::RealField`] scalar. `tiny_solver` evaluates it over `f64` for
//! the residual and over dual numbers for the Jacobian, so each formula is
//! written exactly once. Costs are immutable after construction and can be
//! evaluated concurrently.
//!
//! Available costs:
//! - [`AbsolutePositionCost`]: GPS-like position prior with axis selection.
//! - [`UpVectorCost`]: accelerometer / gravity direction prior.
//! - [`PanAngleCost`], [`TiltAngleCost`], [`RollAngleCost`]: orientation priors.
//! - [`PositionPriorCost`]: position prior seen through a bias transform.
//! - [`UnitTranslationPriorCost`]: keeps a translation at unit norm.
//! - [`PointPositionPriorCost`]: position prior on a 3D point.
//! - [`HeatmapCost`]: geolocation likelihood sampled from a raster.
//!
//! [`CostFunction`] binds a cost to its fixed residual dimension and
//! parameter block sizes, checks parameter layouts at the boundary and
//! registers the cost in a `tiny_solver::Problem`.

use crate::error::PriorError;

use log::trace;
use nalgebra::{DMatrix, DVector};
use tiny_solver::factors::FactorImpl;

pub mod bias;
pub mod heatmap;
pub mod orientation;
pub mod position;
pub mod translation;

pub use bias::PositionPriorCost;
pub use heatmap::HeatmapCost;
pub use orientation::{PanAngleCost, RollAngleCost, TiltAngleCost, UpVectorCost};
pub use position::{
    AbsolutePositionCost, Axis, PointPositionPriorCost, PositionConstraint, PositionUncertainty,
};
pub use translation::UnitTranslationPriorCost;

/// A residual cost with a fixed arity.
pub trait PriorCost: FactorImpl + Send + Sized + 'static {
    /// Name used in logs and error messages.
    const NAME: &'static str;

    /// Number of residual values produced per evaluation.
    fn residual_dim(&self) -> usize;

    /// Sizes of the parameter blocks, in the order the cost reads them.
    fn parameter_block_sizes(&self) -> Vec<usize>;

    /// Binds the cost to its arity.
    fn into_cost_function(self) -> CostFunction {
        CostFunction {
            name: Self::NAME,
            residual_dim: self.residual_dim(),
            parameter_block_sizes: self.parameter_block_sizes(),
            factor: Box::new(self),
        }
    }
}

/// A type-erased cost with fixed residual dimension and parameter block sizes.
pub struct CostFunction {
    name: &'static str,
    residual_dim: usize,
    parameter_block_sizes: Vec<usize>,
    factor: Box<dyn FactorImpl + Send>,
}

impl std::fmt::Debug for CostFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostFunction")
            .field("name", &self.name)
            .field("residual_dim", &self.residual_dim)
            .field("parameter_block_sizes", &self.parameter_block_sizes)
            .finish()
    }
}

impl CostFunction {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn residual_dim(&self) -> usize {
        self.residual_dim
    }

    pub fn parameter_block_sizes(&self) -> &[usize] {
        &self.parameter_block_sizes
    }

    /// Checks that `params` matches the expected block count and sizes.
    pub fn check_parameters(&self, params: &[DVector<f64>]) -> Result<(), PriorError> {
        if params.len() != self.parameter_block_sizes.len() {
            return Err(PriorError::ParameterBlockCount {
                expected: self.parameter_block_sizes.len(),
                actual: params.len(),
            });
        }
        for (index, (block, &expected)) in params
            .iter()
            .zip(self.parameter_block_sizes.iter())
            .enumerate()
        {
            if block.len() != expected {
                return Err(PriorError::ParameterBlockSize {
                    index,
                    expected,
                    actual: block.len(),
                });
            }
        }
        Ok(())
    }

    /// Evaluates the residual at `params`.
    pub fn evaluate(&self, params: &[DVector<f64>]) -> Result<DVector<f64>, PriorError> {
        self.evaluate_with_jacobian(params)
            .map(|(residual, _)| residual)
    }

    /// Evaluates the residual and its Jacobian at `params`.
    ///
    /// The Jacobian has one row per residual and one column per parameter,
    /// blocks concatenated in order.
    pub fn evaluate_with_jacobian(
        &self,
        params: &[DVector<f64>],
    ) -> Result<(DVector<f64>, DMatrix<f64>), PriorError> {
        self.check_parameters(params)?;
        Ok(self.factor.residual_with_jacobian(params))
    }

    /// Registers the cost in `problem` over the variables named by `keys`.
    ///
    /// # Errors
    ///
    /// [`PriorError::ParameterBlockCount`] if `keys` does not name one
    /// variable per parameter block.
    pub fn add_to_problem(
        self,
        problem: &mut tiny_solver::Problem,
        keys: &[&str],
    ) -> Result<(), PriorError> {
        if keys.len() != self.parameter_block_sizes.len() {
            return Err(PriorError::ParameterBlockCount {
                expected: self.parameter_block_sizes.len(),
                actual: keys.len(),
            });
        }
        trace!(
            "Adding {} residual block over {:?} (dim {})",
            self.name,
            keys,
            self.residual_dim
        );
        problem.add_residual_block(self.residual_dim, keys, self.factor, None);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;
    use approx::assert_abs_diff_eq;
    use tiny_solver::factors::Factor;

    /// Central-difference Jacobian of the `f64` residual.
    pub fn numeric_jacobian<F: Factor<f64>>(factor: &F, params: &[DVector<f64>]) -> DMatrix<f64> {
        let h = 1e-6;
        let residual = factor.residual_func(params);
        let num_params: usize = params.iter().map(|p| p.len()).sum();
        let mut jacobian = DMatrix::zeros(residual.len(), num_params);

        let mut column = 0;
        for block in 0..params.len() {
            for i in 0..params[block].len() {
                let mut plus = params.to_vec();
                let mut minus = params.to_vec();
                plus[block][i] += h;
                minus[block][i] -= h;
                let diff =
                    (factor.residual_func(&plus) - factor.residual_func(&minus)) / (2.0 * h);
                jacobian.set_column(column, &diff);
                column += 1;
            }
        }
        jacobian
    }

    /// Checks the automatic Jacobian of a cost against finite differences.
    pub fn assert_jacobian_matches<F>(cost: F, params: &[DVector<f64>], tolerance: f64)
    where
        F: PriorCost + Factor<f64>,
    {
        let expected = numeric_jacobian(&cost, params);
        let (_, jacobian) = cost
            .into_cost_function()
            .evaluate_with_jacobian(params)
            .unwrap();
        assert_eq!(jacobian.shape(), expected.shape());
        assert_abs_diff_eq!(jacobian, expected, epsilon = tolerance);
    }
}

//! Geolocation prior sampled from a heatmap raster.

use crate::geometry::constant;
use crate::heatmap::GridInterpolator;
use crate::pose::{ShotPose, POSE_DIM};
use crate::priors::{CostFunction, PriorCost};

use nalgebra::{DVector, RealField, Vector3};
use std::sync::Arc;
use tiny_solver::factors::Factor;

/// Samples a heatmap at the horizontal position of a shot.
///
/// The raster is centred on `(x_offset, y_offset)`; one cell covers
/// `resolution` world units, rows grow towards negative `y` and columns
/// towards positive `x`. The height of the shot is ignored.
#[derive(Debug)]
pub struct HeatmapCost<I: GridInterpolator> {
    interpolator: Arc<I>,
    x_offset: f64,
    y_offset: f64,
    height: f64,
    width: f64,
    resolution: f64,
    scale: f64,
}

impl<I: GridInterpolator> Clone for HeatmapCost<I> {
    fn clone(&self) -> Self {
        Self {
            interpolator: Arc::clone(&self.interpolator),
            ..*self
        }
    }
}

impl<I: GridInterpolator + 'static> HeatmapCost<I> {
    pub fn new(
        interpolator: Arc<I>,
        x_offset: f64,
        y_offset: f64,
        height: f64,
        width: f64,
        resolution: f64,
        std_deviation: f64,
    ) -> Self {
        Self {
            interpolator,
            x_offset,
            y_offset,
            height,
            width,
            resolution,
            scale: 1.0 / std_deviation,
        }
    }

    /// Builds the cost and binds it to its arity: one residual over one
    /// shot pose block.
    pub fn create(
        interpolator: Arc<I>,
        x_offset: f64,
        y_offset: f64,
        height: f64,
        width: f64,
        resolution: f64,
        std_deviation: f64,
    ) -> CostFunction {
        Self::new(
            interpolator,
            x_offset,
            y_offset,
            height,
            width,
            resolution,
            std_deviation,
        )
        .into_cost_function()
    }

    pub fn interpolator(&self) -> &Arc<I> {
        &self.interpolator
    }

    /// Fractional `(row, col)` raster location of a world position.
    pub fn raster_coordinates<T: RealField>(&self, position: &Vector3<T>) -> (T, T) {
        let x = position.x.clone() - constant::<T>(self.x_offset);
        let y = position.y.clone() - constant::<T>(self.y_offset);
        let resolution = constant::<T>(self.resolution);

        let row = constant::<T>(self.height / 2.0) - y / resolution.clone();
        let col = constant::<T>(self.width / 2.0) + x / resolution;
        (row, col)
    }
}

impl<T: RealField, I: GridInterpolator + 'static> Factor<T> for HeatmapCost<I> {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        let position = ShotPose::from_block(&params[0]).translation;
        let (row, col) = self.raster_coordinates(&position);
        let value = self.interpolator.evaluate(row, col);
        DVector::from_element(1, value * constant::<T>(self.scale))
    }
}

impl<I: GridInterpolator + 'static> PriorCost for HeatmapCost<I> {
    const NAME: &'static str = "HeatmapCost";

    fn residual_dim(&self) -> usize {
        1
    }

    fn parameter_block_sizes(&self) -> Vec<usize> {
        vec![POSE_DIM]
    }
}

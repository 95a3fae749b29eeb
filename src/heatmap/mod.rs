//! Heatmap rasters used as geolocation priors.
//!
//! A heatmap is a discrete 2D grid of cost values. [`BiCubicInterpolator`]
//! turns it into a continuously differentiable field that can be sampled at
//! fractional (row, column) positions with any [`RealField`] scalar, so the
//! derivative of the sampled value flows back into the shot position.

use crate::error::PriorError;
use crate::geometry::{constant, real_part};
use image::GenericImageView;
use log::{debug, info};
use nalgebra::{DMatrix, RealField};
use std::path::Path;

/// Read-only continuous reconstruction of a 2D grid.
pub trait GridInterpolator: Send + Sync {
    /// Samples the field at a fractional `(row, col)` location.
    fn evaluate<T: RealField>(&self, row: T, col: T) -> T;
}

/// Row-major raster of `f64` values.
///
/// Reads outside the raster are clamped to the nearest border cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid2D {
    data: DMatrix<f64>,
}

impl Grid2D {
    /// Wraps a matrix whose rows are raster rows.
    ///
    /// # Errors
    ///
    /// [`PriorError::InvalidHeatmap`] if the matrix is empty or holds
    /// non-finite values.
    pub fn new(data: DMatrix<f64>) -> Result<Self, PriorError> {
        if data.is_empty() {
            return Err(PriorError::InvalidHeatmap(
                "Heatmap raster cannot be empty".to_string(),
            ));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(PriorError::InvalidHeatmap(
                "Heatmap raster contains non-finite values".to_string(),
            ));
        }
        Ok(Self { data })
    }

    /// Builds a grid from `rows * cols` values stored row after row.
    pub fn from_row_major(values: &[f64], rows: usize, cols: usize) -> Result<Self, PriorError> {
        if values.len() != rows * cols {
            return Err(PriorError::InvalidHeatmap(format!(
                "Expected {} values for a {}x{} raster, got {}",
                rows * cols,
                rows,
                cols,
                values.len()
            )));
        }
        Self::new(DMatrix::from_row_slice(rows, cols, values))
    }

    /// Builds a grid from a list of rows, all of the same length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, PriorError> {
        let cols = rows.first().map_or(0, Vec::len);
        if let Some((index, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != cols) {
            return Err(PriorError::InvalidHeatmap(format!(
                "Row {} has {} values, expected {}",
                index,
                row.len(),
                cols
            )));
        }
        let values: Vec<f64> = rows.iter().flatten().copied().collect();
        Self::from_row_major(&values, rows.len(), cols)
    }

    /// Loads a grayscale raster from an image file, one cell per pixel with
    /// the luminance mapped to `[0, 1]`. Image row 0 is raster row 0.
    pub fn load_from_image<P: AsRef<Path>>(path: P) -> Result<Self, PriorError> {
        let path = path.as_ref();
        let img = image::open(path)?;
        let (width, height) = img.dimensions();
        let luma = img.to_luma32f();
        let data = DMatrix::from_fn(height as usize, width as usize, |r, c| {
            luma.get_pixel(c as u32, r as u32).0[0] as f64
        });
        info!(
            "Loaded {}x{} heatmap from image {}",
            height,
            width,
            path.display()
        );
        Self::new(data)
    }

    /// Loads a raster from a headerless CSV file, one raster row per line.
    pub fn load_from_csv<P: AsRef<Path>>(path: P) -> Result<Self, PriorError> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let row = record
                .iter()
                .map(|field| {
                    field.parse::<f64>().map_err(|e| {
                        PriorError::InvalidHeatmap(format!(
                            "Invalid value `{field}` on line {}: {e}",
                            line + 1
                        ))
                    })
                })
                .collect::<Result<Vec<f64>, PriorError>>()?;
            rows.push(row);
        }

        let grid = Self::from_rows(&rows)?;
        info!(
            "Loaded {}x{} heatmap from CSV {}",
            grid.rows(),
            grid.cols(),
            path.display()
        );
        Ok(grid)
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// Value at integer `(row, col)`, clamped to the raster border.
    pub fn value(&self, row: i64, col: i64) -> f64 {
        let r = row.clamp(0, self.rows() as i64 - 1) as usize;
        let c = col.clamp(0, self.cols() as i64 - 1) as usize;
        self.data[(r, c)]
    }

    /// Smallest and largest cell values.
    pub fn value_range(&self) -> (f64, f64) {
        (self.data.min(), self.data.max())
    }
}

/// Cubic Hermite (Catmull-Rom) spline through `p1` and `p2`, with tangents
/// taken from the neighbours `p0` and `p3`. `x` is in `[0, 1]`.
fn cubic_hermite<T: RealField>(p: [T; 4], x: T) -> T {
    let [p0, p1, p2, p3] = p;
    let half = constant::<T>(0.5);
    let two = constant::<T>(2.0);
    let three = constant::<T>(3.0);
    let four = constant::<T>(4.0);
    let five = constant::<T>(5.0);

    let a = (-p0.clone() + three.clone() * p1.clone() - three * p2.clone() + p3.clone())
        * half.clone();
    let b = (two * p0.clone() - five * p1.clone() + four * p2.clone() - p3) * half.clone();
    let c = (-p0 + p2) * half;
    let d = p1;

    d + x.clone() * (c + x.clone() * (b + x * a))
}

/// Bicubic interpolation over a [`Grid2D`].
///
/// Interpolates through every grid node (the value at integer coordinates is
/// the cell value) and has a continuous first derivative.
#[derive(Debug, Clone)]
pub struct BiCubicInterpolator {
    grid: Grid2D,
}

impl BiCubicInterpolator {
    pub fn new(grid: Grid2D) -> Self {
        let (min, max) = grid.value_range();
        debug!(
            "Bicubic interpolator over {}x{} grid, values in [{}, {}]",
            grid.rows(),
            grid.cols(),
            min,
            max
        );
        Self { grid }
    }

    pub fn grid(&self) -> &Grid2D {
        &self.grid
    }

    /// Raster height in cells.
    pub fn height(&self) -> f64 {
        self.grid.rows() as f64
    }

    /// Raster width in cells.
    pub fn width(&self) -> f64 {
        self.grid.cols() as f64
    }
}

/// Splits a coordinate into the stencil cell and the fractional offset.
///
/// Past two cells outside the raster every tap of the stencil reads the same
/// border cell, so the cell is pinned there and the offset is zero. This
/// keeps the cell arithmetic in range for huge or infinite coordinates.
fn stencil_cell<T: RealField>(coord: T, len: usize) -> (i64, T) {
    let floor = real_part(&coord).floor();
    let lowest = -2.0;
    let highest = len as f64 + 1.0;
    if floor < lowest {
        (lowest as i64, T::zero())
    } else if floor <= highest {
        // The fractional part carries the derivative, the cell index does not.
        (floor as i64, coord - constant::<T>(floor))
    } else {
        // Also taken by NaN.
        (highest as i64, T::zero())
    }
}

impl GridInterpolator for BiCubicInterpolator {
    fn evaluate<T: RealField>(&self, row: T, col: T) -> T {
        let (r0, row_frac) = stencil_cell(row, self.grid.rows());
        let (c0, col_frac) = stencil_cell(col, self.grid.cols());

        let along_cols = |r: i64| -> T {
            let p = [
                constant::<T>(self.grid.value(r, c0 - 1)),
                constant::<T>(self.grid.value(r, c0)),
                constant::<T>(self.grid.value(r, c0 + 1)),
                constant::<T>(self.grid.value(r, c0 + 2)),
            ];
            cubic_hermite(p, col_frac.clone())
        };

        let f = [
            along_cols(r0 - 1),
            along_cols(r0),
            along_cols(r0 + 1),
            along_cols(r0 + 2),
        ];
        cubic_hermite(f, row_frac)
    }
}

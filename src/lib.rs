//! SfM Priors Library
//!
//! Differentiable residuals that tie structure-from-motion unknowns (shot
//! poses, rig offsets, bias transforms, 3D points) to absolute priors during
//! bundle adjustment:
//! - GPS-like position priors with per-axis selection
//! - Gravity (up-vector) priors
//! - Pan, tilt and roll orientation priors
//! - Position priors through a similarity bias
//! - Unit-norm translation regularization
//! - 3D point position priors
//! - Geolocation heatmap priors sampled with bicubic interpolation
//!
//! Every residual is written once, generically over the scalar type, and
//! registered with the tiny-solver optimization framework, which evaluates
//! it over dual numbers to obtain Jacobians.

pub mod config;
pub mod error;
pub mod geometry;
pub mod heatmap;
pub mod pose;
pub mod priors;

// Re-export commonly used types
pub use config::{HeatmapConfig, PriorConfig};
pub use error::PriorError;
pub use heatmap::{BiCubicInterpolator, Grid2D, GridInterpolator};
pub use pose::{Bias, ShotLayout, ShotPose};

pub use priors::{
    AbsolutePositionCost, Axis, CostFunction, HeatmapCost, PanAngleCost, PointPositionPriorCost,
    PositionConstraint, PositionPriorCost, PositionUncertainty, PriorCost, RollAngleCost,
    TiltAngleCost, UnitTranslationPriorCost, UpVectorCost,
};

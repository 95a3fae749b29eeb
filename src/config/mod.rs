//! Default uncertainties for the prior residuals.
//!
//! A [`PriorConfig`] is read from YAML or JSON; every field has a default so
//! partial files are accepted. After loading, [`PriorConfig::validate`]
//! checks that every standard deviation can be turned into a residual scale.

use crate::error::{check_std_deviation, PriorError};
use crate::heatmap::{BiCubicInterpolator, Grid2D};
use crate::pose::ShotLayout;
use crate::priors::{
    AbsolutePositionCost, CostFunction, HeatmapCost, PanAngleCost, PointPositionPriorCost,
    PositionConstraint, PositionPriorCost, PositionUncertainty, PriorCost, RollAngleCost,
    TiltAngleCost, UpVectorCost,
};

use log::{info, warn};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorConfig {
    /// Horizontal (X, Y) standard deviation of position priors, in meters.
    pub gps_horizontal_std: f64,
    /// Vertical (Z) standard deviation of position priors, in meters.
    pub gps_vertical_std: f64,
    /// Optimize a shared position standard deviation instead of using the
    /// fixed values above.
    pub optimize_gps_std: bool,
    pub position_constraint: PositionConstraint,
    /// Standard deviation of the up-vector prior.
    pub gravity_std: f64,
    /// Standard deviations of the orientation priors, in radians.
    pub pan_std: f64,
    pub tilt_std: f64,
    pub roll_std: f64,
    pub point_std: f64,
    /// Standard deviation of position priors seen through a bias transform.
    pub bias_std: f64,
    pub heatmap: Option<HeatmapConfig>,
}

impl Default for PriorConfig {
    fn default() -> Self {
        Self {
            gps_horizontal_std: 5.0,
            gps_vertical_std: 10.0,
            optimize_gps_std: false,
            position_constraint: PositionConstraint::XYZ,
            gravity_std: 0.1,
            pan_std: 0.1,
            tilt_std: 0.1,
            roll_std: 0.1,
            point_std: 1.0,
            bias_std: 1.0,
            heatmap: None,
        }
    }
}

/// Geolocation heatmap prior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapConfig {
    /// Raster file: `.csv` for a numeric grid, any image format otherwise.
    pub path: PathBuf,
    /// World position of the raster center.
    pub x_offset: f64,
    pub y_offset: f64,
    /// World units per raster cell.
    pub resolution: f64,
    pub std_deviation: f64,
}

impl HeatmapConfig {
    pub fn validate(&self) -> Result<(), PriorError> {
        check_std_deviation("heatmap.std_deviation", self.std_deviation)?;
        if !(self.resolution > 0.0 && self.resolution.is_finite()) {
            return Err(PriorError::InvalidConfig(format!(
                "heatmap.resolution must be positive and finite, got {}",
                self.resolution
            )));
        }
        if self.path.as_os_str().is_empty() {
            return Err(PriorError::InvalidConfig(
                "heatmap.path cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Loads the raster and wraps it in a shareable interpolator.
    pub fn load_interpolator(&self) -> Result<Arc<BiCubicInterpolator>, PriorError> {
        let is_csv = self
            .path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        let grid = if is_csv {
            Grid2D::load_from_csv(&self.path)?
        } else {
            Grid2D::load_from_image(&self.path)?
        };
        Ok(Arc::new(BiCubicInterpolator::new(grid)))
    }

    /// Builds a [`HeatmapCost`] over `interpolator`, taking the raster size
    /// from its grid.
    pub fn cost(&self, interpolator: Arc<BiCubicInterpolator>) -> CostFunction {
        let height = interpolator.height();
        let width = interpolator.width();
        HeatmapCost::create(
            interpolator,
            self.x_offset,
            self.y_offset,
            height,
            width,
            self.resolution,
            self.std_deviation,
        )
    }
}

impl PriorConfig {
    pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, PriorError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config: PriorConfig = serde_yaml::from_str(&contents)?;
        info!("Loaded prior configuration from {}", path.display());
        Ok(config)
    }

    pub fn load_from_json<P: AsRef<Path>>(path: P) -> Result<Self, PriorError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config: PriorConfig = serde_json::from_str(&contents)?;
        info!("Loaded prior configuration from {}", path.display());
        Ok(config)
    }

    pub fn save_to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), PriorError> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;
        Ok(())
    }

    /// Checks every standard deviation and the heatmap settings.
    pub fn validate(&self) -> Result<(), PriorError> {
        let stds = [
            ("gps_horizontal_std", self.gps_horizontal_std),
            ("gps_vertical_std", self.gps_vertical_std),
            ("gravity_std", self.gravity_std),
            ("pan_std", self.pan_std),
            ("tilt_std", self.tilt_std),
            ("roll_std", self.roll_std),
            ("point_std", self.point_std),
            ("bias_std", self.bias_std),
        ];
        for (name, value) in stds {
            check_std_deviation(name, value)?;
        }

        if let Some(heatmap) = &self.heatmap {
            heatmap.validate()?;
        }

        let constraint = self.position_constraint;
        if !(constraint.x || constraint.y || constraint.z) {
            warn!("Position constraint enables no axis, position priors will have no effect");
        }
        if self.optimize_gps_std {
            info!("Position prior standard deviation is optimized, fixed GPS std is ignored");
        }
        Ok(())
    }

    fn position_uncertainty(&self) -> PositionUncertainty {
        if self.optimize_gps_std {
            PositionUncertainty::Parameter
        } else {
            PositionUncertainty::Fixed {
                horizontal: self.gps_horizontal_std,
                vertical: self.gps_vertical_std,
            }
        }
    }

    pub fn absolute_position_cost(
        &self,
        layout: ShotLayout,
        position_prior: Vector3<f64>,
    ) -> CostFunction {
        AbsolutePositionCost::new(
            layout,
            position_prior,
            self.position_uncertainty(),
            self.position_constraint,
        )
        .into_cost_function()
    }

    pub fn up_vector_cost(&self, layout: ShotLayout, acceleration: Vector3<f64>) -> CostFunction {
        UpVectorCost::new(acceleration, self.gravity_std, layout).into_cost_function()
    }

    pub fn pan_angle_cost(&self, angle: f64) -> CostFunction {
        PanAngleCost::new(angle, self.pan_std).into_cost_function()
    }

    pub fn tilt_angle_cost(&self, angle: f64) -> CostFunction {
        TiltAngleCost::new(angle, self.tilt_std).into_cost_function()
    }

    pub fn roll_angle_cost(&self, angle: f64) -> CostFunction {
        RollAngleCost::new(angle, self.roll_std).into_cost_function()
    }

    pub fn point_position_cost(&self, position: Vector3<f64>) -> CostFunction {
        PointPositionPriorCost::new(position, self.point_std).into_cost_function()
    }

    pub fn position_prior_cost(&self, position_prior: Vector3<f64>) -> CostFunction {
        PositionPriorCost::new(position_prior, self.bias_std).into_cost_function()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{BIAS_DIM, POINT_DIM, POSE_DIM, STD_DEVIATION_DIM};

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("{}_{name}", std::process::id()))
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = PriorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.position_constraint, PositionConstraint::XYZ);
        assert!(config.heatmap.is_none());
    }

    #[test]
    fn test_load_partial_yaml() {
        let path = temp_path("sfm_priors_config_partial.yaml");
        fs::write(
            &path,
            "gps_horizontal_std: 2.5\n\
             position_constraint: { x: true, y: true, z: false }\n\
             optimize_gps_std: true\n",
        )
        .unwrap();

        let config = PriorConfig::load_from_yaml(&path).unwrap();
        assert_eq!(config.gps_horizontal_std, 2.5);
        assert_eq!(config.gps_vertical_std, 10.0);
        assert_eq!(config.position_constraint, PositionConstraint::XY);
        assert!(config.optimize_gps_std);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_json_with_heatmap() {
        let path = temp_path("sfm_priors_config.json");
        fs::write(
            &path,
            r#"{
                "pan_std": 0.05,
                "heatmap": {
                    "path": "heatmap.csv",
                    "x_offset": 10.0,
                    "y_offset": -4.0,
                    "resolution": 0.5,
                    "std_deviation": 2.0
                }
            }"#,
        )
        .unwrap();

        let config = PriorConfig::load_from_json(&path).unwrap();
        assert_eq!(config.pan_std, 0.05);
        let heatmap = config.heatmap.as_ref().unwrap();
        assert_eq!(heatmap.path, PathBuf::from("heatmap.csv"));
        assert_eq!(heatmap.resolution, 0.5);
        assert!(config.validate().is_ok());
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_yaml_round_trip() {
        let path = temp_path("sfm_priors_config_round_trip.yaml");
        let config = PriorConfig {
            roll_std: 0.3,
            position_constraint: PositionConstraint::Z,
            ..Default::default()
        };
        config.save_to_yaml(&path).unwrap();
        assert_eq!(PriorConfig::load_from_yaml(&path).unwrap(), config);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        let path = temp_path("sfm_priors_config_malformed.yaml");
        fs::write(&path, "gps_horizontal_std: [not, a, number]\n").unwrap();
        assert!(matches!(
            PriorConfig::load_from_yaml(&path),
            Err(PriorError::YamlError(_))
        ));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_validate_rejects_bad_std() {
        let config = PriorConfig {
            tilt_std: 0.0,
            ..Default::default()
        };
        match config.validate() {
            Err(PriorError::InvalidStdDeviation { name, value }) => {
                assert_eq!(name, "tilt_std");
                assert_eq!(value, 0.0);
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let config = PriorConfig {
            point_std: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_heatmap() {
        let heatmap = HeatmapConfig {
            path: PathBuf::from("heatmap.png"),
            x_offset: 0.0,
            y_offset: 0.0,
            resolution: -1.0,
            std_deviation: 1.0,
        };
        let config = PriorConfig {
            heatmap: Some(heatmap),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PriorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_cost_constructors_follow_config() {
        let config = PriorConfig::default();
        let cost = config.absolute_position_cost(ShotLayout::Single, Vector3::zeros());
        assert_eq!(cost.parameter_block_sizes(), &[POSE_DIM]);

        let config = PriorConfig {
            optimize_gps_std: true,
            ..Default::default()
        };
        let cost = config.absolute_position_cost(ShotLayout::Rig, Vector3::zeros());
        assert_eq!(
            cost.parameter_block_sizes(),
            &[POSE_DIM, POSE_DIM, STD_DEVIATION_DIM]
        );

        assert_eq!(
            config
                .up_vector_cost(ShotLayout::Single, Vector3::z())
                .residual_dim(),
            3
        );
        assert_eq!(config.pan_angle_cost(0.0).residual_dim(), 1);
        assert_eq!(config.tilt_angle_cost(0.0).residual_dim(), 1);
        assert_eq!(config.roll_angle_cost(0.0).residual_dim(), 1);
        assert_eq!(
            config.point_position_cost(Vector3::zeros()).parameter_block_sizes(),
            &[POINT_DIM]
        );
        assert_eq!(
            config.position_prior_cost(Vector3::zeros()).parameter_block_sizes(),
            &[POSE_DIM, BIAS_DIM]
        );
    }

    #[test]
    fn test_heatmap_cost_from_csv() {
        let path = temp_path("sfm_priors_config_heatmap.csv");
        fs::write(&path, "1,2,3\n4,5,6\n").unwrap();
        let heatmap = HeatmapConfig {
            path: path.clone(),
            x_offset: 0.0,
            y_offset: 0.0,
            resolution: 1.0,
            std_deviation: 1.0,
        };

        let interpolator = heatmap.load_interpolator().unwrap();
        assert_eq!(interpolator.height(), 2.0);
        assert_eq!(interpolator.width(), 3.0);

        let cost = heatmap.cost(interpolator);
        assert_eq!(cost.name(), "HeatmapCost");
        // Origin samples the raster center (row 1, col 1.5).
        let value = cost.evaluate(&[nalgebra::DVector::zeros(POSE_DIM)]).unwrap();
        assert!(value[0] > 4.0 && value[0] < 6.0);
        fs::remove_file(&path).ok();
    }
}

//! Prior Adjustment Demo
//!
//! Builds a small synthetic scene and adjusts it against absolute priors only:
//! - GPS positions, gravity and heading on a sequence of shots
//! - a two-camera rig whose instance carries a GPS prior
//! - a bias transform aligning positions from a local frame with GPS
//! - 3D point priors
//! - a unit-norm baseline
//! - a geolocation heatmap (synthetic, or loaded from the configuration)
//!
//! Usage:
//! ```bash
//! cargo run --example prior_adjustment -- --num-shots 6 --config priors.yaml
//! ```

use clap::Parser;
use log::info;
use nalgebra::{DMatrix, DVector, Rotation3, Vector3};
use sfm_priors::pose::{Bias, ShotPose};
use sfm_priors::{
    AbsolutePositionCost, BiCubicInterpolator, Grid2D, HeatmapCost, PositionConstraint,
    PositionUncertainty, PriorConfig, PriorCost, ShotLayout, UnitTranslationPriorCost,
};
use std::collections::HashMap;
use std::f64::consts::FRAC_PI_2;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tiny_solver::{LevenbergMarquardtOptimizer, Optimizer as TinySolverOptimizer};

/// Adjust a synthetic scene against absolute priors
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Prior configuration file (.yaml, .yml or .json)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Number of shots along the trajectory (at least 3)
    #[arg(short = 'n', long, default_value = "6")]
    num_shots: usize,

    /// Magnitude of the perturbation applied to the initial values
    #[arg(long, default_value = "0.5")]
    noise: f64,

    /// Side of the synthetic heatmap raster, in cells
    #[arg(long, default_value = "64")]
    heatmap_size: usize,
}

fn load_config(path: Option<&PathBuf>) -> Result<PriorConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) if path.extension().is_some_and(|ext| ext == "json") => {
            PriorConfig::load_from_json(path)?
        }
        Some(path) => PriorConfig::load_from_yaml(path)?,
        None => {
            info!("No configuration given, using defaults");
            PriorConfig::default()
        }
    };
    config.validate()?;
    Ok(config)
}

/// Deterministic pseudo-noise in `[-1, 1]`.
fn wobble(seed: usize, axis: usize) -> f64 {
    ((seed * 7 + axis * 13) as f64 * 0.618).sin()
}

fn perturb(v: &Vector3<f64>, seed: usize, amount: f64) -> Vector3<f64> {
    v + Vector3::new(wobble(seed, 0), wobble(seed, 1), wobble(seed, 2)) * amount
}

/// Camera looking at the horizon with the given heading.
fn heading_rotation(heading: f64) -> Rotation3<f64> {
    Rotation3::from_scaled_axis(Vector3::new(0.0, 0.0, -heading))
        * Rotation3::from_scaled_axis(Vector3::new(-FRAC_PI_2, 0.0, 0.0))
}

/// Bowl-shaped raster with its minimum at the center.
fn synthetic_heatmap(size: usize) -> Result<Arc<BiCubicInterpolator>, Box<dyn std::error::Error>> {
    let center = size as f64 / 2.0;
    let data = DMatrix::from_fn(size, size, |r, c| {
        ((r as f64 - center).powi(2) + (c as f64 - center).powi(2)).sqrt() / size as f64
    });
    Ok(Arc::new(BiCubicInterpolator::new(Grid2D::new(data)?)))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let cli = Cli::parse();
    if cli.num_shots < 3 {
        return Err("At least 3 shots are needed to estimate the bias".into());
    }
    let config = load_config(cli.config.as_ref())?;
    info!("Prior configuration: {:?}", config);

    println!("PRIOR ADJUSTMENT DEMO");
    println!("=====================");
    println!("Shots: {}, noise: {}\n", cli.num_shots, cli.noise);

    let mut problem = tiny_solver::Problem::new();
    let mut initial_values: HashMap<String, DVector<f64>> = HashMap::new();
    let mut ground_truth: HashMap<String, Vector3<f64>> = HashMap::new();

    // The local frame is the GPS frame rotated, scaled and shifted.
    let true_bias = Bias::new(Vector3::new(0.0, 0.0, 0.3), Vector3::new(2.0, -1.0, 0.5), 1.5);
    let to_local = |p: &Vector3<f64>| {
        let rotation = Rotation3::from_scaled_axis(true_bias.rotation);
        rotation.inverse() * ((p - true_bias.translation) / true_bias.scale)
    };

    // Shots along a curved trajectory, looking along it.
    let mut gps_positions = Vec::new();
    for i in 0..cli.num_shots {
        let key = format!("shot_{i}");
        let t = i as f64;
        let position = Vector3::new(10.0 * t, 3.0 * (0.5 * t).sin(), 1.5);
        let heading = 0.1 * t;
        let rotation = heading_rotation(heading);

        config
            .absolute_position_cost(ShotLayout::Single, position)
            .add_to_problem(&mut problem, &[key.as_str()])?;
        config
            .up_vector_cost(ShotLayout::Single, rotation.inverse() * Vector3::z())
            .add_to_problem(&mut problem, &[key.as_str()])?;
        config
            .pan_angle_cost(heading)
            .add_to_problem(&mut problem, &[key.as_str()])?;
        config
            .position_prior_cost(to_local(&position))
            .add_to_problem(&mut problem, &[key.as_str(), "bias"])?;

        let initial = ShotPose::new(
            perturb(&rotation.scaled_axis(), i, 0.1 * cli.noise),
            perturb(&position, i, cli.noise),
        );
        initial_values.insert(key.clone(), initial.to_block());
        ground_truth.insert(key, position);
        gps_positions.push(position);
    }

    initial_values.insert("bias".to_string(), Bias::<f64>::identity().to_block());

    // A rig: GPS and gravity through the composed camera pose, heading on the
    // instance. The camera offset is known from calibration.
    let rig_camera = ShotPose::new(Vector3::new(0.0, 0.2, 0.0), Vector3::new(0.3, 0.0, 0.0));
    let rig_camera_rotation = Rotation3::from_scaled_axis(rig_camera.rotation);
    let instance_rotation = heading_rotation(-0.2);
    let instance = ShotPose::new(instance_rotation.scaled_axis(), Vector3::new(-5.0, 4.0, 2.0));
    let rig_pose = instance.compose(&rig_camera);
    let rig_up = (instance_rotation * rig_camera_rotation).inverse() * Vector3::z();
    let rig_keys = ["rig_instance", "rig_camera"];

    config
        .absolute_position_cost(ShotLayout::Rig, rig_pose.translation)
        .add_to_problem(&mut problem, &rig_keys)?;
    config
        .up_vector_cost(ShotLayout::Rig, rig_up)
        .add_to_problem(&mut problem, &rig_keys)?;
    config
        .pan_angle_cost(-0.2)
        .add_to_problem(&mut problem, &["rig_instance"])?;

    let camera_axis = rig_camera_rotation * Vector3::z();
    config
        .absolute_position_cost(ShotLayout::Single, rig_camera.translation)
        .add_to_problem(&mut problem, &["rig_camera"])?;
    config
        .up_vector_cost(ShotLayout::Single, rig_camera_rotation.inverse() * Vector3::z())
        .add_to_problem(&mut problem, &["rig_camera"])?;
    config
        .pan_angle_cost(camera_axis.x.atan2(camera_axis.y))
        .add_to_problem(&mut problem, &["rig_camera"])?;

    initial_values.insert(
        "rig_instance".to_string(),
        ShotPose::new(
            perturb(&instance.rotation, 99, 0.1 * cli.noise),
            perturb(&instance.translation, 99, cli.noise),
        )
        .to_block(),
    );
    initial_values.insert("rig_camera".to_string(), rig_camera.to_block());
    ground_truth.insert("rig_instance".to_string(), instance.translation);

    // 3D points with their own priors.
    for j in 0..4 {
        let key = format!("point_{j}");
        let position = Vector3::new(5.0 * j as f64, 20.0, 3.0 + j as f64);
        config
            .point_position_cost(position)
            .add_to_problem(&mut problem, &[key.as_str()])?;
        let initial = perturb(&position, 50 + j, cli.noise);
        initial_values.insert(key.clone(), DVector::from_column_slice(initial.as_slice()));
        ground_truth.insert(key, position);
    }

    // A unit baseline: horizontal position from GPS, height from the norm.
    let level = heading_rotation(0.0);
    UnitTranslationPriorCost::new()
        .into_cost_function()
        .add_to_problem(&mut problem, &["baseline"])?;
    AbsolutePositionCost::new(
        ShotLayout::Single,
        Vector3::new(0.6, 0.0, 0.0),
        PositionUncertainty::Fixed {
            horizontal: config.gps_horizontal_std,
            vertical: config.gps_vertical_std,
        },
        PositionConstraint::XY,
    )
    .into_cost_function()
    .add_to_problem(&mut problem, &["baseline"])?;
    config
        .up_vector_cost(ShotLayout::Single, level.inverse() * Vector3::z())
        .add_to_problem(&mut problem, &["baseline"])?;
    config
        .pan_angle_cost(0.0)
        .add_to_problem(&mut problem, &["baseline"])?;
    initial_values.insert(
        "baseline".to_string(),
        ShotPose::new(
            perturb(&level.scaled_axis(), 77, 0.1 * cli.noise),
            Vector3::new(0.5, 0.1, 0.7),
        )
        .to_block(),
    );

    // Heatmap on the first shot, centered on its GPS position.
    if let Some(first) = gps_positions.first() {
        let heatmap = match &config.heatmap {
            Some(heatmap) => heatmap.cost(heatmap.load_interpolator()?),
            None => {
                let interpolator = synthetic_heatmap(cli.heatmap_size)?;
                let size = cli.heatmap_size as f64;
                HeatmapCost::create(interpolator, first.x, first.y, size, size, 0.5, 1.0)
            }
        };
        heatmap.add_to_problem(&mut problem, &["shot_0"])?;
    }

    info!("Problem has {} variables", initial_values.len());

    let start = Instant::now();
    let optimizer = LevenbergMarquardtOptimizer::default();
    let result = optimizer
        .optimize(&problem, &initial_values, None)
        .ok_or("Optimization failed")?;
    let elapsed = start.elapsed();
    info!("Optimization finished in {:?}", elapsed);

    println!("Optimization time: {:?}\n", elapsed);
    println!("{:<12} {:>12} {:>12}", "variable", "start error", "final error");
    let mut keys: Vec<&String> = ground_truth.keys().collect();
    keys.sort();
    for key in keys {
        let truth = ground_truth[key];
        let position = |values: &HashMap<String, DVector<f64>>| -> Option<Vector3<f64>> {
            let block = values.get(key)?;
            Some(if block.len() == 3 {
                Vector3::from_column_slice(block.as_slice())
            } else {
                ShotPose::from_block(block).translation
            })
        };
        if let (Some(before), Some(after)) = (position(&initial_values), position(&result)) {
            println!(
                "{:<12} {:>12.6} {:>12.6}",
                key,
                (before - truth).norm(),
                (after - truth).norm()
            );
        }
    }

    if let Some(bias) = result.get("bias") {
        let bias = Bias::from_block(bias);
        println!(
            "\nEstimated bias: rotation {:?}, translation {:?}, scale {:.4}",
            bias.rotation.as_slice(),
            bias.translation.as_slice(),
            bias.scale
        );
        println!(
            "True bias:      rotation {:?}, translation {:?}, scale {:.4}",
            true_bias.rotation.as_slice(),
            true_bias.translation.as_slice(),
            true_bias.scale
        );
    }
    if let Some(baseline) = result.get("baseline") {
        let baseline = ShotPose::from_block(baseline);
        println!(
            "Baseline translation {:?}, norm {:.6}",
            baseline.translation.as_slice(),
            baseline.translation.norm()
        );
    }

    Ok(())
}

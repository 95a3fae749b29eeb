use thiserror::Error;

/// Errors raised at the boundary of the prior residuals: parameter block
/// layout checks, configuration validation and heatmap loading.
///
/// The residual formulas themselves never fail.
#[derive(Error, Debug)]
pub enum PriorError {
    #[error("Expected {expected} parameter blocks, got {actual}")]
    ParameterBlockCount { expected: usize, actual: usize },
    #[error("Parameter block {index} must have {expected} values, got {actual}")]
    ParameterBlockSize {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Standard deviation `{name}` must be positive and finite, got {value}")]
    InvalidStdDeviation { name: String, value: f64 },
    #[error("Invalid heatmap: {0}")]
    InvalidHeatmap(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to parse YAML: {0}")]
    YamlError(String),
    #[error("Failed to parse JSON: {0}")]
    JsonError(String),
    #[error("Failed to read image: {0}")]
    ImageError(String),
    #[error("Failed to read CSV: {0}")]
    CsvError(String),
    #[error("IO Error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for PriorError {
    fn from(err: std::io::Error) -> Self {
        PriorError::IOError(err.to_string())
    }
}

impl From<serde_yaml::Error> for PriorError {
    fn from(err: serde_yaml::Error) -> Self {
        PriorError::YamlError(err.to_string())
    }
}

impl From<serde_json::Error> for PriorError {
    fn from(err: serde_json::Error) -> Self {
        PriorError::JsonError(err.to_string())
    }
}

impl From<image::ImageError> for PriorError {
    fn from(err: image::ImageError) -> Self {
        PriorError::ImageError(err.to_string())
    }
}

impl From<csv::Error> for PriorError {
    fn from(err: csv::Error) -> Self {
        PriorError::CsvError(err.to_string())
    }
}

/// Checks that a standard deviation can be inverted into a residual scale.
pub(crate) fn check_std_deviation(name: &str, value: f64) -> Result<(), PriorError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(PriorError::InvalidStdDeviation {
            name: name.to_string(),
            value,
        })
    }
}

use super::covariance::CovarianceMode;
use super::weights::{DEFAULT_RCOND_TOLERANCE, SolverOptions, SolverOutputs};
use crate::transform::{HarmonicConvention, TransformError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use thiserror::Error;

/// Errors from reading, writing or validating a [`MultitaperConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML config file: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to serialize config to TOML format: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Invalid harmonic convention: {0}")]
    Convention(#[from] TransformError),
    #[error("Config field '{field}' has the invalid value {value}.")]
    InvalidValue { field: &'static str, value: String },
}

/// Conventions and solver settings shared by a family of runs.
///
/// `norm` and `csphase` keep the conventional integer codes so config files
/// stay interchangeable with other spherical-harmonic tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultitaperConfig {
    /// 1 = geodesy 4π, 2 = Schmidt, 3 = unnormalized, 4 = orthonormal.
    pub norm: i32,
    /// 1 excludes the Condon-Shortley phase, -1 includes it.
    pub csphase: i32,
    /// Only compute taper variances, not their covariances.
    pub nocross: bool,
    pub rcond_tolerance: f64,
}

impl Default for MultitaperConfig {
    fn default() -> Self {
        let convention = HarmonicConvention::default();
        Self {
            norm: convention.normalization.code(),
            csphase: convention.csphase.code(),
            nocross: false,
            rcond_tolerance: DEFAULT_RCOND_TOLERANCE,
        }
    }
}

impl MultitaperConfig {
    pub fn convention(&self) -> Result<HarmonicConvention, ConfigError> {
        Ok(HarmonicConvention::from_codes(self.norm, self.csphase)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.convention()?;
        if !(self.rcond_tolerance.is_finite() && self.rcond_tolerance >= 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "rcond_tolerance",
                value: self.rcond_tolerance.to_string(),
            });
        }
        Ok(())
    }

    pub fn solver_options(&self, outputs: SolverOutputs) -> SolverOptions {
        SolverOptions {
            outputs,
            mode: CovarianceMode::from_nocross(self.nocross),
            rcond_tolerance: self.rcond_tolerance,
        }
    }

    /// Saves the config to a file in a human-readable TOML format.
    pub fn save(&self, path: &str) -> Result<(), ConfigError> {
        self.validate()?;
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        Ok(())
    }

    /// Loads and validates a config from a TOML file. Missing fields take
    /// their default values.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&toml_string)?;
        config.validate()?;
        log::debug!("Loaded multitaper config from {path}: {config:?}");
        Ok(config)
    }
}

//! Configuration file loading for the rating tool.
//!
//! Every setting has a command-line counterpart; the file only supplies
//! defaults for flags that were not given.

use rating_core::{DEFAULT_AVERAGE, DEFAULT_CONFIDENCE, DEFAULT_POINTS_AT_76};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur when loading or parsing configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse the configuration file as valid TOML.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    /// Settings that cannot be used together.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// A competitor held at a fixed rating.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AnchorEntry {
    pub name: String,
    pub rating: f64,
}

/// Belief about one competitor's rating.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PriorEntry {
    pub name: String,
    pub rating: f64,
    pub sigma: f64,
}

/// Belief that `name_a` is rated `delta` above `name_b`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RelativePriorEntry {
    pub name_a: String,
    pub name_b: String,
    pub delta: f64,
    pub sigma: f64,
}

/// Belief about a model parameter.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct PriorValue {
    pub value: f64,
    pub sigma: f64,
}

/// Settings read from `rating.toml`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RatingFileConfig {
    /// Rating of the pool average, or of the single anchor.
    #[serde(default = "default_average")]
    pub average: f64,
    /// Rating points for a 76% expected score.
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub white_advantage: Option<f64>,
    #[serde(default)]
    pub fit_white_advantage: bool,
    #[serde(default)]
    pub draw_rate: Option<f64>,
    #[serde(default)]
    pub fit_draw_rate: bool,
    #[serde(default)]
    pub bayesian: bool,
    /// Confidence for reported errors, in percent.
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub simulations: usize,
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub allow_disconnected: bool,
    #[serde(default)]
    pub errors_relative_to_average: bool,
    /// Single anchor. Its rating overrides `average`.
    #[serde(default)]
    pub anchor: Option<AnchorEntry>,
    #[serde(default)]
    pub anchors: Vec<AnchorEntry>,
    #[serde(default)]
    pub priors: Vec<PriorEntry>,
    #[serde(default)]
    pub relative_priors: Vec<RelativePriorEntry>,
    #[serde(default)]
    pub white_advantage_prior: Option<PriorValue>,
    #[serde(default)]
    pub draw_rate_prior: Option<PriorValue>,
}

fn default_average() -> f64 {
    DEFAULT_AVERAGE
}

fn default_scale() -> f64 {
    DEFAULT_POINTS_AT_76
}

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

fn default_threads() -> usize {
    1
}

impl Default for RatingFileConfig {
    fn default() -> Self {
        Self {
            average: default_average(),
            scale: default_scale(),
            white_advantage: None,
            fit_white_advantage: false,
            draw_rate: None,
            fit_draw_rate: false,
            bayesian: false,
            confidence: default_confidence(),
            simulations: 0,
            threads: default_threads(),
            seed: None,
            allow_disconnected: false,
            errors_relative_to_average: false,
            anchor: None,
            anchors: Vec::new(),
            priors: Vec::new(),
            relative_priors: Vec::new(),
            white_advantage_prior: None,
            draw_rate_prior: None,
        }
    }
}

impl RatingFileConfig {
    /// Loads the configuration from `path`, or from [`Self::config_path()`]
    /// when no path is given.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if the file exists but cannot be read,
    /// [`ConfigError::ParseError`] if it is not valid TOML, or
    /// [`ConfigError::Invalid`] if it sets both `anchor` and `anchors`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = path.map_or_else(Self::config_path, Path::to_path_buf);
        let config: Self = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            tracing::debug!(path = %config_path.display(), "config loaded");
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Returns the default path of the configuration file.
    ///
    /// Currently returns `rating.toml` in the current working directory.
    pub fn config_path() -> PathBuf {
        PathBuf::from("rating.toml")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.anchor.is_some() && !self.anchors.is_empty() {
            return Err(ConfigError::Invalid(
                "set either anchor or anchors, not both".to_string(),
            ));
        }
        Ok(())
    }
}

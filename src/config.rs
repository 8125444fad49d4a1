//! Configuration for the inference pipeline.
//!
//! [`ModelConfig`] is the scaling and transform metadata written by training
//! next to the exported network. [`RunnerConfig`] holds the settings of the
//! `precept` binary.

use crate::error::SessionError;
use anyhow::{Context, Result};
use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Feature names, scaling bounds and Box-Cox parameters of one trained model.
///
/// Positions in `input_names` / `output_names` are tensor indices. Decoding
/// does not check any invariant; call [`ModelConfig::validate`] (or
/// [`ModelConfig::load`], which does it for you) before use.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// Input feature names
    #[serde(rename = "params_x")]
    pub input_names: Vec<String>,
    /// Output feature names
    #[serde(rename = "params_y")]
    pub output_names: Vec<String>,
    /// Number of inputs
    pub num_x: usize,
    /// Number of outputs
    pub num_y: usize,
    pub min_x: Vec<f64>,
    pub max_x: Vec<f64>,
    pub min_y: Vec<f64>,
    pub max_y: Vec<f64>,
    /// Inputs that were Box-Cox transformed before scaling
    #[serde(rename = "mask_x", default)]
    pub transformed_inputs: Vec<String>,
    /// Outputs that were Box-Cox transformed before scaling
    #[serde(rename = "mask_y", default)]
    pub transformed_outputs: Vec<String>,
    /// One lambda per entry of `transformed_inputs`, same order
    #[serde(rename = "lambdas_x", default)]
    pub lambda_x: Vec<f64>,
    /// One lambda per entry of `transformed_outputs`, same order
    #[serde(rename = "lambdas_y", default)]
    pub lambda_y: Vec<f64>,
}

impl ModelConfig {
    /// Decode and validate a config file. The format follows the file
    /// extension (`.yml`/`.yaml`, `.toml`, `.json`).
    ///
    /// An unreadable or syntactically broken file is a `ConfigLoad` error; a
    /// value of the wrong type or a missing required key is `ConfigInvalid`
    /// naming the key.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SessionError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SessionError::ConfigLoad {
                path: path.to_path_buf(),
                message: "file not found".to_string(),
            });
        }

        let config = Config::builder()
            .add_source(File::from(path))
            .build()
            .and_then(|c| c.try_deserialize::<ModelConfig>())
            .map_err(|e| decode_error(path, e))?;
        config.validate()?;
        Ok(config)
    }

    /// Decode and validate an in-memory YAML document.
    pub fn from_yaml_str(document: &str) -> Result<Self, SessionError> {
        let config = Config::builder()
            .add_source(File::from_str(document, FileFormat::Yaml))
            .build()
            .and_then(|c| c.try_deserialize::<ModelConfig>())
            .map_err(|e| decode_error(Path::new("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the pipeline relies on. Returns the first
    /// violation found.
    pub fn validate(&self) -> Result<(), SessionError> {
        check_side(
            ("num_x", self.num_x),
            ("params_x", &self.input_names),
            ("min_x", &self.min_x),
            ("max_x", &self.max_x),
        )?;
        check_side(
            ("num_y", self.num_y),
            ("params_y", &self.output_names),
            ("min_y", &self.min_y),
            ("max_y", &self.max_y),
        )?;
        check_mask(("mask_x", &self.transformed_inputs), ("lambdas_x", &self.lambda_x))?;
        check_mask(("mask_y", &self.transformed_outputs), ("lambdas_y", &self.lambda_y))?;
        Ok(())
    }
}

/// Attribute a decoder error to a config key where the decoder names one.
fn decode_error(path: &Path, err: ConfigError) -> SessionError {
    let key = match &err {
        ConfigError::Type { key: Some(key), .. } => Some(key.as_str()),
        ConfigError::NotFound(key) => Some(key.as_str()),
        ConfigError::Message(message) => missing_field(message),
        _ => None,
    };

    match key {
        Some(key) => SessionError::invalid(top_level_key(key), err.to_string()),
        None => SessionError::ConfigLoad {
            path: path.to_path_buf(),
            message: err.to_string(),
        },
    }
}

/// serde reports a missing struct field as a plain message.
fn missing_field(message: &str) -> Option<&str> {
    message
        .strip_prefix("missing field `")
        .and_then(|rest| rest.strip_suffix('`'))
}

/// `min_x[0]` -> `min_x`
fn top_level_key(key: &str) -> &str {
    key.split(['[', '.']).next().unwrap_or(key)
}

fn check_side(
    (count_field, count): (&str, usize),
    (names_field, names): (&str, &[String]),
    (min_field, min): (&str, &[f64]),
    (max_field, max): (&str, &[f64]),
) -> Result<(), SessionError> {
    if count == 0 {
        return Err(SessionError::invalid(count_field, "must be positive"));
    }
    if names.len() != count {
        return Err(SessionError::invalid(
            names_field,
            format!("has {} names but {} = {}", names.len(), count_field, count),
        ));
    }
    check_unique(names_field, names)?;

    for (field, bounds) in [(min_field, min), (max_field, max)] {
        if bounds.len() != count {
            return Err(SessionError::invalid(
                field,
                format!("has {} values but {} = {}", bounds.len(), count_field, count),
            ));
        }
        if let Some(i) = bounds.iter().position(|b| !b.is_finite()) {
            return Err(SessionError::invalid(
                field,
                format!("value for '{}' is not finite", names[i]),
            ));
        }
    }

    // An equal pair would divide by zero when scaling.
    for (i, (&lo, &hi)) in min.iter().zip(max).enumerate() {
        if hi <= lo {
            return Err(SessionError::invalid(
                max_field,
                format!(
                    "upper bound {} for '{}' is not above lower bound {}",
                    hi, names[i], lo
                ),
            ));
        }
        if !(hi - lo).is_finite() {
            return Err(SessionError::invalid(
                max_field,
                format!("range [{}, {}] for '{}' overflows", lo, hi, names[i]),
            ));
        }
    }
    Ok(())
}

fn check_mask(
    (mask_field, mask): (&str, &[String]),
    (lambda_field, lambdas): (&str, &[f64]),
) -> Result<(), SessionError> {
    if mask.len() != lambdas.len() {
        return Err(SessionError::invalid(
            lambda_field,
            format!(
                "has {} values but {} lists {} features",
                lambdas.len(),
                mask_field,
                mask.len()
            ),
        ));
    }
    if let Some(i) = lambdas.iter().position(|l| !l.is_finite()) {
        return Err(SessionError::invalid(
            lambda_field,
            format!("lambda for '{}' is not finite", mask[i]),
        ));
    }
    check_unique(mask_field, mask)
}

fn check_unique(field: &str, names: &[String]) -> Result<(), SessionError> {
    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(SessionError::invalid(
                field,
                format!("'{}' is listed more than once", name),
            ));
        }
    }
    Ok(())
}

/// Settings for the `precept` binary.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Path to the exported ONNX network
    pub model_path: String,
    /// Path to the model's YAML config
    pub config_path: String,
    /// Number of intra-op threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
    /// Seed for generated demo inputs
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

fn default_onnx_threads() -> usize {
    1
}

fn default_seed() -> u64 {
    666
}

impl RunnerConfig {
    /// Load runner settings from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

//! Resolution of masked feature names to tensor positions.

use crate::config::ModelConfig;
use crate::error::{FeatureSide, SessionError};
use std::path::Path;

/// Tensor positions of the Box-Cox transformed features.
///
/// `inputs[k]` is the position of `transformed_inputs[k]` within
/// `input_names` and pairs with `lambda_x[k]`; likewise for outputs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexMap {
    inputs: Vec<usize>,
    outputs: Vec<usize>,
}

impl IndexMap {
    /// Resolve both masks against their feature lists. Fails on the first
    /// masked name that is not a feature of the model.
    pub fn resolve(config: &ModelConfig) -> Result<Self, SessionError> {
        Ok(Self {
            inputs: resolve_side(
                FeatureSide::Input,
                &config.input_names,
                &config.transformed_inputs,
            )?,
            outputs: resolve_side(
                FeatureSide::Output,
                &config.output_names,
                &config.transformed_outputs,
            )?,
        })
    }

    pub fn inputs(&self) -> &[usize] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[usize] {
        &self.outputs
    }
}

fn resolve_side(
    side: FeatureSide,
    names: &[String],
    mask: &[String],
) -> Result<Vec<usize>, SessionError> {
    mask.iter()
        .map(|m| {
            names
                .iter()
                .position(|n| n == m)
                .ok_or_else(|| SessionError::UnknownFeature {
                    side,
                    name: m.clone(),
                })
        })
        .collect()
}

/// A validated [`ModelConfig`] together with its [`IndexMap`].
///
/// This is the only way to obtain an index map paired with the config it was
/// resolved from, so an `InferenceSession` built from it never has to
/// re-check bounds or mask indices.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    config: ModelConfig,
    index_map: IndexMap,
}

impl ResolvedConfig {
    /// Validate `config` and resolve its masks.
    pub fn resolve(config: ModelConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let index_map = IndexMap::resolve(&config)?;
        Ok(Self { config, index_map })
    }

    /// Decode, validate and resolve a config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SessionError> {
        Self::resolve(ModelConfig::load(path)?)
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn index_map(&self) -> &IndexMap {
        &self.index_map
    }
}

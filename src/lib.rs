//! Precept Inference Library
//!
//! Runs a pretrained feed-forward regression network on raw, real-unit
//! feature values. Inputs go through the same Box-Cox transform and min-max
//! scaling used to produce the training data; outputs are mapped back to
//! real units on the way out.

pub mod config;
pub mod error;
pub mod models;
pub mod transform;

pub use config::{ModelConfig, RunnerConfig};
pub use error::{FeatureSide, SessionError};
pub use models::{
    ForwardPass, IndexMap, InferenceSession, ModelBackend, ModelLoader, ResolvedConfig,
    SessionState,
};

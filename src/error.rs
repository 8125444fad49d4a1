//! Error types for session construction and prediction.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which side of the network a feature belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureSide {
    Input,
    Output,
}

impl fmt::Display for FeatureSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureSide::Input => write!(f, "input"),
            FeatureSide::Output => write!(f, "output"),
        }
    }
}

/// Errors raised while building an inference session or running a prediction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    /// The model runtime could not load the network file.
    #[error("Failed to load model from {}: {message}", .path.display())]
    ModelLoad { path: PathBuf, message: String },

    /// The model config could not be read or decoded.
    #[error("Failed to load config from {}: {message}", .path.display())]
    ConfigLoad { path: PathBuf, message: String },

    /// The decoded config violates an invariant.
    #[error("Invalid config field '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    /// A masked feature name is not one of the model's features.
    #[error("Unknown {side} feature '{name}' in transform mask")]
    UnknownFeature { side: FeatureSide, name: String },

    /// The caller passed a vector of the wrong length.
    #[error("Shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// `predict` was called on a session that never became ready.
    #[error("Session is not ready: {reason}")]
    NotReady { reason: String },

    /// The forward pass failed inside the model runtime.
    #[error("Inference runtime error: {message}")]
    InferenceRuntime { message: String },
}

impl SessionError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SessionError::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Construction-time errors leave a session permanently unusable; the
    /// others only fail the call that raised them.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionError::ModelLoad { .. }
                | SessionError::ConfigLoad { .. }
                | SessionError::ConfigInvalid { .. }
                | SessionError::UnknownFeature { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_message() {
        let error = SessionError::ShapeMismatch {
            expected: 5,
            actual: 4,
        };
        assert_eq!(error.to_string(), "Shape mismatch: expected 5 values, got 4");
    }

    #[test]
    fn test_unknown_feature_message() {
        let error = SessionError::UnknownFeature {
            side: FeatureSide::Output,
            name: "flux".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Unknown output feature 'flux' in transform mask"
        );
    }

    #[test]
    fn test_model_load_carries_path() {
        let error = SessionError::ModelLoad {
            path: PathBuf::from("models/net.onnx"),
            message: "no such file".to_string(),
        };
        assert!(error.to_string().contains("models/net.onnx"));
        assert!(error.is_terminal());
    }

    #[test]
    fn test_per_call_errors_are_not_terminal() {
        assert!(!SessionError::ShapeMismatch { expected: 1, actual: 2 }.is_terminal());
        assert!(!SessionError::InferenceRuntime {
            message: "boom".to_string()
        }
        .is_terminal());
        assert!(!SessionError::NotReady {
            reason: "x".to_string()
        }
        .is_terminal());
    }
}

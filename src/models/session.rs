//! Inference session: raw feature values in, raw predictions out.

use crate::config::ModelConfig;
use crate::error::SessionError;
use crate::models::index_map::{IndexMap, ResolvedConfig};
use crate::models::loader::{LoadedModel, ModelLoader};
use crate::models::runtime::{ForwardPass, ModelBackend};
use crate::transform;
use std::path::Path;
use tracing::{debug, info, warn};

/// A loaded network plus the pre- and post-processing it was trained with.
///
/// A session is immutable once built. Every fallible step (model load, config
/// decode, validation, mask resolution) happens before the value exists, so a
/// session in hand is always ready to predict. Replacing a model means
/// building a new session, never mutating a live one.
///
/// `predict` takes `&self`; sharing a session across threads is as safe as
/// the model's [`ForwardPass`] implementation.
pub struct InferenceSession<M = LoadedModel> {
    model: M,
    resolved: ResolvedConfig,
}

impl InferenceSession<LoadedModel> {
    /// Load an ONNX network and its config with a single-threaded runtime.
    pub fn open<P, Q>(model_path: P, config_path: Q) -> Result<Self, SessionError>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        Self::open_with_threads(model_path, config_path, 1)
    }

    /// Load an ONNX network and its config, running inference on
    /// `onnx_threads` intra-op threads.
    pub fn open_with_threads<P, Q>(
        model_path: P,
        config_path: Q,
        onnx_threads: usize,
    ) -> Result<Self, SessionError>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let loader =
            ModelLoader::with_threads(onnx_threads).map_err(|e| SessionError::ModelLoad {
                path: model_path.as_ref().to_path_buf(),
                message: format!("{:#}", e),
            })?;
        Self::open_with(&loader, model_path, config_path)
    }
}

impl<M: ForwardPass> InferenceSession<M> {
    /// Load the network through `backend`, then decode, validate and resolve
    /// the config. Stops at the first failure.
    pub fn open_with<B, P, Q>(backend: &B, model_path: P, config_path: Q) -> Result<Self, SessionError>
    where
        B: ModelBackend<Model = M>,
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let model_path = model_path.as_ref();
        let config_path = config_path.as_ref();

        let model = backend
            .load(model_path)
            .map_err(|e| SessionError::ModelLoad {
                path: model_path.to_path_buf(),
                message: format!("{:#}", e),
            })?;

        let resolved = ResolvedConfig::load(config_path)?;

        info!(
            model = %model_path.display(),
            config = %config_path.display(),
            num_x = resolved.config().num_x,
            num_y = resolved.config().num_y,
            transformed_inputs = resolved.index_map().inputs().len(),
            transformed_outputs = resolved.index_map().outputs().len(),
            "Inference session ready"
        );

        Ok(Self::from_parts(model, resolved))
    }

    /// Assemble a session from an already loaded model and resolved config.
    pub fn from_parts(model: M, resolved: ResolvedConfig) -> Self {
        Self { model, resolved }
    }

    /// Map raw inputs into model space: Box-Cox the masked inputs, then
    /// min-max scale all of them.
    pub fn preprocess(&self, raw_inputs: &[f64]) -> Result<Vec<f64>, SessionError> {
        let config = self.config();
        check_len(config.num_x, raw_inputs.len())?;

        let transformed = transform::apply_masked_transform(
            raw_inputs,
            self.resolved.index_map().inputs(),
            &config.lambda_x,
            transform::power_transform,
        );
        Ok(transform::scale_all(&transformed, &config.min_x, &config.max_x))
    }

    /// Map model outputs back to real units: unscale all of them, then undo
    /// the Box-Cox transform on the masked outputs.
    pub fn postprocess(&self, model_outputs: &[f64]) -> Result<Vec<f64>, SessionError> {
        let config = self.config();
        check_len(config.num_y, model_outputs.len())?;

        let unscaled = transform::unscale_all(model_outputs, &config.min_y, &config.max_y);
        Ok(transform::apply_masked_transform(
            &unscaled,
            self.resolved.index_map().outputs(),
            &config.lambda_y,
            transform::inverse_power_transform,
        ))
    }

    /// Run one prediction on raw feature values.
    ///
    /// `raw_inputs` must hold exactly [`num_inputs`](Self::num_inputs) values
    /// in `input_names` order. The result holds
    /// [`num_outputs`](Self::num_outputs) values in `output_names` order.
    /// Numeric domain violations in the Box-Cox steps surface as NaN in the
    /// result rather than as errors.
    pub fn predict(&self, raw_inputs: &[f64]) -> Result<Vec<f64>, SessionError> {
        let scaled = self.preprocess(raw_inputs)?;

        // The runtime works in f32; narrow only for the call itself
        let model_input: Vec<f32> = scaled.iter().map(|&v| v as f32).collect();
        let model_outputs: Vec<f64> = self
            .model
            .forward(&model_input)
            .map_err(|e| SessionError::InferenceRuntime {
                message: format!("{:#}", e),
            })?
            .into_iter()
            .map(f64::from)
            .collect();

        let num_y = self.config().num_y;
        if model_outputs.len() != num_y {
            return Err(SessionError::InferenceRuntime {
                message: format!(
                    "model returned {} values, config expects {}",
                    model_outputs.len(),
                    num_y
                ),
            });
        }

        let outputs = self.postprocess(&model_outputs)?;
        debug!(inputs = ?raw_inputs, outputs = ?outputs, "Prediction complete");
        Ok(outputs)
    }

    /// Get the validated model config
    pub fn config(&self) -> &ModelConfig {
        self.resolved.config()
    }

    /// Get the tensor positions of the transformed features
    pub fn index_map(&self) -> &IndexMap {
        self.resolved.index_map()
    }

    /// Get the loaded model
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Get the number of raw inputs `predict` expects
    pub fn num_inputs(&self) -> usize {
        self.config().num_x
    }

    /// Get the number of values `predict` returns
    pub fn num_outputs(&self) -> usize {
        self.config().num_y
    }

    /// Get the input feature names, in tensor order
    pub fn input_names(&self) -> &[String] {
        &self.config().input_names
    }

    /// Get the output feature names, in tensor order
    pub fn output_names(&self) -> &[String] {
        &self.config().output_names
    }

    /// Get the per-input lower scaling bounds
    pub fn min_x(&self) -> &[f64] {
        &self.config().min_x
    }

    /// Get the per-input upper scaling bounds
    pub fn max_x(&self) -> &[f64] {
        &self.config().max_x
    }

    /// Get the per-output lower scaling bounds
    pub fn min_y(&self) -> &[f64] {
        &self.config().min_y
    }

    /// Get the per-output upper scaling bounds
    pub fn max_y(&self) -> &[f64] {
        &self.config().max_y
    }

    /// Get the Box-Cox lambdas of the transformed inputs
    pub fn lambda_x(&self) -> &[f64] {
        &self.config().lambda_x
    }

    /// Get the Box-Cox lambdas of the transformed outputs
    pub fn lambda_y(&self) -> &[f64] {
        &self.config().lambda_y
    }

    /// Get the names of the transformed inputs
    pub fn mask_x(&self) -> &[String] {
        &self.config().transformed_inputs
    }

    /// Get the names of the transformed outputs
    pub fn mask_y(&self) -> &[String] {
        &self.config().transformed_outputs
    }
}

fn check_len(expected: usize, actual: usize) -> Result<(), SessionError> {
    if expected != actual {
        return Err(SessionError::ShapeMismatch { expected, actual });
    }
    Ok(())
}

/// Outcome of building a session: ready to predict, or failed for good.
///
/// Construction errors are terminal. A failed state keeps the reason and
/// answers every `predict` with [`SessionError::NotReady`]; callers wanting a
/// retry build a new state from corrected inputs.
pub enum SessionState<M = LoadedModel> {
    Ready(InferenceSession<M>),
    Failed { reason: String },
}

impl SessionState<LoadedModel> {
    /// Like [`InferenceSession::open`], recording a failure instead of
    /// returning it.
    pub fn open<P, Q>(model_path: P, config_path: Q) -> Self
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        Self::from_result(InferenceSession::open(model_path, config_path))
    }
}

impl<M: ForwardPass> SessionState<M> {
    /// Like [`InferenceSession::open_with`], recording a failure instead of
    /// returning it.
    pub fn open_with<B, P, Q>(backend: &B, model_path: P, config_path: Q) -> Self
    where
        B: ModelBackend<Model = M>,
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        Self::from_result(InferenceSession::open_with(backend, model_path, config_path))
    }

    /// Record the outcome of a construction attempt
    pub fn from_result(result: Result<InferenceSession<M>, SessionError>) -> Self {
        match result {
            Ok(session) => SessionState::Ready(session),
            Err(e) => {
                warn!(error = %e, "Inference session failed to initialize");
                SessionState::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Whether construction succeeded
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionState::Ready(_))
    }

    /// The ready session, or `NotReady` carrying the construction failure.
    pub fn session(&self) -> Result<&InferenceSession<M>, SessionError> {
        match self {
            SessionState::Ready(session) => Ok(session),
            SessionState::Failed { reason } => Err(SessionError::NotReady {
                reason: reason.clone(),
            }),
        }
    }

    /// Predict through the ready session, or fail with `NotReady`
    pub fn predict(&self, raw_inputs: &[f64]) -> Result<Vec<f64>, SessionError> {
        self.session()?.predict(raw_inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Echoes the input back, counting calls.
    struct Echo {
        calls: Cell<usize>,
    }

    impl ForwardPass for Echo {
        fn forward(&self, input: &[f32]) -> anyhow::Result<Vec<f32>> {
            self.calls.set(self.calls.get() + 1);
            Ok(input.to_vec())
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn session() -> InferenceSession<Echo> {
        let config = ModelConfig {
            input_names: names(&["a", "b", "c"]),
            output_names: names(&["a", "b", "c"]),
            num_x: 3,
            num_y: 3,
            min_x: vec![0.0, -1.0, 2.0],
            max_x: vec![10.0, 1.0, 4.0],
            min_y: vec![0.0, -1.0, 2.0],
            max_y: vec![10.0, 1.0, 4.0],
            transformed_inputs: vec![],
            transformed_outputs: vec![],
            lambda_x: vec![],
            lambda_y: vec![],
        };
        let resolved = ResolvedConfig::resolve(config).unwrap();
        InferenceSession::from_parts(
            Echo {
                calls: Cell::new(0),
            },
            resolved,
        )
    }

    #[test]
    fn test_preprocess_scales_inputs() {
        let session = session();
        let scaled = session.preprocess(&[5.0, 0.0, 3.0]).unwrap();
        assert_eq!(scaled, vec![0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_echo_round_trip() {
        let session = session();
        let raw = [7.5, -0.25, 3.5];
        let out = session.predict(&raw).unwrap();
        for (o, r) in out.iter().zip(raw) {
            assert!((o - r).abs() < 1e-5, "{o} vs {r}");
        }
    }

    #[test]
    fn test_wrong_length_does_no_work() {
        let session = session();
        let err = session.predict(&[1.0, 2.0]).unwrap_err();

        assert_eq!(
            err,
            SessionError::ShapeMismatch {
                expected: 3,
                actual: 2
            }
        );
        assert_eq!(session.model().calls.get(), 0);

        // The session stays usable
        assert!(session.predict(&[1.0, 0.0, 3.0]).is_ok());
        assert_eq!(session.model().calls.get(), 1);
    }

    #[test]
    fn test_postprocess_rejects_wrong_length() {
        let session = session();
        assert!(matches!(
            session.postprocess(&[0.0; 4]),
            Err(SessionError::ShapeMismatch {
                expected: 3,
                actual: 4
            })
        ));
    }

    #[test]
    fn test_accessors() {
        let session = session();
        assert_eq!(session.num_inputs(), 3);
        assert_eq!(session.num_outputs(), 3);
        assert_eq!(session.input_names()[1], "b");
        assert_eq!(session.max_x(), &[10.0, 1.0, 4.0]);
        assert!(session.mask_x().is_empty());
    }

    #[test]
    fn test_failed_state_reports_not_ready() {
        let state: SessionState<Echo> = SessionState::from_result(Err(SessionError::ModelLoad {
            path: "missing.onnx".into(),
            message: "not found".to_string(),
        }));

        assert!(!state.is_ready());
        match state.predict(&[1.0, 2.0, 3.0]) {
            Err(SessionError::NotReady { reason }) => assert!(reason.contains("missing.onnx")),
            other => panic!("expected NotReady, got {other:?}"),
        }
    }

    #[test]
    fn test_ready_state_delegates() {
        let state = SessionState::from_result(Ok(session()));
        assert!(state.is_ready());
        assert_eq!(state.predict(&[5.0, 0.0, 3.0]).unwrap().len(), 3);
    }
}

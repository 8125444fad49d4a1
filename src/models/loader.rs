//! ONNX model loader

use crate::models::runtime::{ForwardPass, ModelBackend};
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Loaded ONNX network with the tensor names used to feed it.
pub struct LoadedModel {
    /// ONNX Runtime session. `Session::run` needs exclusive access, so
    /// concurrent forward passes are serialised here.
    session: Mutex<Session>,
    /// Input name for the model
    pub input_name: String,
    /// Output name for the predictions
    pub output_name: String,
}

/// Loader for ONNX models
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Result<Self> {
        // Initialize ONNX Runtime
        ort::init().commit()?;
        info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
        Ok(Self { onnx_threads })
    }

    /// Load an ONNX network from file
    pub fn load_model<P: AsRef<Path>>(&self, path: P) -> Result<LoadedModel> {
        let path = path.as_ref();

        info!(path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        // Regression networks have a single input and a single output
        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .context("Model declares no inputs")?;
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .context("Model declares no outputs")?;

        info!(
            input = %input_name,
            output = %output_name,
            "Model loaded successfully"
        );

        Ok(LoadedModel {
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }
}

impl ModelBackend for ModelLoader {
    type Model = LoadedModel;

    fn load(&self, path: &Path) -> Result<LoadedModel> {
        self.load_model(path)
    }
}

impl ForwardPass for LoadedModel {
    fn forward(&self, input: &[f32]) -> Result<Vec<f32>> {
        // Prepare input tensor - shape [1, num_features]
        let shape = vec![1_i64, input.len() as i64];
        let input_tensor =
            Tensor::from_array((shape, input.to_vec())).context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let outputs = session.run(ort::inputs![&self.input_name => input_tensor])?;

        let output = outputs
            .get(self.output_name.as_str())
            .with_context(|| format!("Model produced no output named '{}'", self.output_name))?;

        // Copy out of the runtime's buffer before `outputs` is dropped
        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .context("Model output is not an f32 tensor")?;
        debug!(shape = ?shape, "Forward pass complete");

        Ok(data.to_vec())
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self { onnx_threads: 1 }
    }
}

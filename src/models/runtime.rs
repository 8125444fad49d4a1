//! Seam between the pipeline and the neural-network runtime.
//!
//! The pipeline only ever sees plain `f32` rows. Native tensor types stay
//! inside the implementations of these traits.

use anyhow::Result;
use std::path::Path;

/// A loaded network that can evaluate one input row.
///
/// `forward` receives a single row of `num_x` scaled inputs (a `[1, num_x]`
/// batch) and returns the `num_y` model outputs as an owned vector.
///
/// Implementations are shared by reference across callers of
/// [`InferenceSession::predict`](crate::InferenceSession::predict). A runtime
/// whose native handle cannot run concurrent forward passes must serialise
/// access itself.
pub trait ForwardPass {
    fn forward(&self, input: &[f32]) -> Result<Vec<f32>>;
}

/// Loads networks from disk.
pub trait ModelBackend {
    type Model: ForwardPass;

    fn load(&self, path: &Path) -> Result<Self::Model>;
}

impl<T: ForwardPass + ?Sized> ForwardPass for Box<T> {
    fn forward(&self, input: &[f32]) -> Result<Vec<f32>> {
        (**self).forward(input)
    }
}

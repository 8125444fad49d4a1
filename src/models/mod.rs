//! Model runtime integration and the inference session

pub mod index_map;
pub mod loader;
pub mod runtime;
pub mod session;

pub use index_map::{IndexMap, ResolvedConfig};
pub use loader::{LoadedModel, ModelLoader};
pub use runtime::{ForwardPass, ModelBackend};
pub use session::{InferenceSession, SessionState};

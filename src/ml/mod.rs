// ============================================================
// Layer 5 — ML / Model Layer
// ============================================================
// All graph evaluation lives here; burn and ort are not
// imported anywhere else.
//
//   hub_encoder.rs   — hub name → vector table
//   text_encoder.rs  — text → vector (TF-IDF, or ONNX)
//   predictor.rs     — vector → probability (Burn dense graph, or ONNX)
//   onnx.rs          — onnxruntime sessions (feature "onnx")
//   runtime.rs       — LoadedModel: one extracted artifact, implements Scorer
//   cache.rs         — bounded LRU of LoadedModels with single-flight loads

pub mod cache;
pub mod hub_encoder;
pub mod predictor;
pub mod runtime;
pub mod text_encoder;

#[cfg(feature = "onnx")]
pub mod onnx;

pub use cache::{ArtifactModelProvider, ModelCache};
pub use runtime::LoadedModel;

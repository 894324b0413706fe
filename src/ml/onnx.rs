// ============================================================
// Layer 5 — ONNX Graphs (feature "onnx")
// ============================================================
// Bundles exported straight from the training pipeline carry
// text_encoder.onnx and predictor.onnx. Both take one input
// named "input":
//
//   text_encoder.onnx   string [1, 1]  → f32 [1, text_dim]
//   predictor.onnx      f32    [1, D]  → f32 [1, 1]
//
// `Session::run` needs `&mut`, so each session sits behind a
// mutex; scoring through one model is serialised per graph.

use std::path::Path;

use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use parking_lot::Mutex;

use crate::error::{ServiceError, ServiceResult, Stage};

const INPUT_NAME: &str = "input";

fn open_session(path: &Path, stage: Stage) -> ServiceResult<Mutex<Session>> {
    let session = Session::builder()
        .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
        .and_then(|b| b.commit_from_file(path))
        .map_err(|e| ServiceError::backend(stage, format!("{}: {e}", path.display())))?;
    tracing::debug!(stage = %stage, "loaded ONNX graph '{}'", path.display());
    Ok(Mutex::new(session))
}

// ─── OnnxTextEncoder ──────────────────────────────────────────────────────────
pub struct OnnxTextEncoder {
    session: Mutex<Session>,
}

impl OnnxTextEncoder {
    pub fn load(path: &Path) -> ServiceResult<Self> {
        Ok(Self { session: open_session(path, Stage::TextEncoder)? })
    }

    /// Width is only known after the first run.
    pub fn dim(&self) -> Option<usize> {
        None
    }

    pub fn encode(&self, text: &str) -> ServiceResult<Vec<f32>> {
        let input = Tensor::<String>::from_string_array(([1usize, 1], vec![text.to_owned()]))
            .map_err(|e| ServiceError::backend(Stage::TextEncoder, format!("input: {e}")))?;
        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![INPUT_NAME => input])
            .map_err(|e| ServiceError::backend(Stage::TextEncoder, format!("run: {e}")))?;
        let (_, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ServiceError::backend(Stage::TextEncoder, format!("output: {e}")))?;
        Ok(data.to_vec())
    }
}

// ─── OnnxPredictor ────────────────────────────────────────────────────────────
pub struct OnnxPredictor {
    session: Mutex<Session>,
}

impl OnnxPredictor {
    pub fn load(path: &Path) -> ServiceResult<Self> {
        Ok(Self { session: open_session(path, Stage::Predictor)? })
    }

    pub fn input_dim(&self) -> Option<usize> {
        None
    }

    pub fn predict(&self, input: &[f32]) -> ServiceResult<f32> {
        let tensor = Tensor::from_array(([1usize, input.len()], input.to_vec()))
            .map_err(|e| ServiceError::backend(Stage::Predictor, format!("input: {e}")))?;
        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![INPUT_NAME => tensor])
            .map_err(|e| ServiceError::backend(Stage::Predictor, format!("run: {e}")))?;
        let (_, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ServiceError::backend(Stage::Predictor, format!("output: {e}")))?;
        data.first()
            .copied()
            .ok_or_else(|| ServiceError::backend(Stage::Predictor, "predictor returned no output"))
    }
}

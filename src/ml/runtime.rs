// ============================================================
// Layer 5 — Model Runtime
// ============================================================
// Turns one fetched artifact into a ready LoadedModel:
//
//   1. extract the archive into a private TempDir
//   2. parse hub_encoder.json         → HubEncoder
//   3. load text_encoder.{json,onnx}  → TextEncoder
//      load predictor.{json,onnx}     → Predictor
//   4. parse metadata.json            → diagnostics only
//
// Any failing step drops the TempDir, so a half-extracted
// archive never outlives construction. A loaded model is
// read-only and shared between concurrent requests; its
// scratch directory is removed when the last handle drops.

use std::{fs, path::Path};

use tempfile::TempDir;

use crate::domain::{ModelKey, Scorer};
use crate::error::{ServiceError, ServiceResult, Stage};
use crate::infra::bundle::{
    extract_bundle, find_graph, BundleMetadata, HUB_ENCODER_FILE, METADATA_FILE,
    PREDICTOR_STEM, TEXT_ENCODER_STEM,
};
use crate::ml::{hub_encoder::HubEncoder, predictor::Predictor, text_encoder::TextEncoder};

pub struct LoadedModel {
    key:          ModelKey,
    hub_encoder:  HubEncoder,
    text_encoder: TextEncoder,
    predictor:    Predictor,
    metadata:     Option<BundleMetadata>,
    scratch:      TempDir,
}

impl LoadedModel {
    /// Build a model from a local artifact file. Blocking; callers on
    /// the async runtime go through `spawn_blocking`.
    pub fn from_artifact(artifact: &Path, key: &ModelKey) -> ServiceResult<Self> {
        Self::construct(artifact, key).map_err(|e| e.with_key(key.as_str()))
    }

    fn construct(artifact: &Path, key: &ModelKey) -> ServiceResult<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("hub-inference-")
            .tempdir()
            .map_err(|e| ServiceError::backend(Stage::Extract, format!("scratch dir: {e}")))?;
        let dir = scratch.path();

        extract_bundle(artifact, dir)?;

        let hub_encoder = HubEncoder::from_file(&dir.join(HUB_ENCODER_FILE))?;

        let (path, format) = find_graph(dir, TEXT_ENCODER_STEM).ok_or_else(|| {
            ServiceError::backend(Stage::TextEncoder, "bundle has no text_encoder.json or text_encoder.onnx")
        })?;
        let text_encoder = TextEncoder::load(&path, format)?;

        let (path, format) = find_graph(dir, PREDICTOR_STEM).ok_or_else(|| {
            ServiceError::backend(Stage::Predictor, "bundle has no predictor.json or predictor.onnx")
        })?;
        let predictor = Predictor::load(&path, format)?;

        let metadata = read_metadata(&dir.join(METADATA_FILE), key)?;

        let model = Self { key: key.clone(), hub_encoder, text_encoder, predictor, metadata, scratch };
        model.check_dimensions();

        tracing::info!(
            model = %key,
            hubs = model.hub_encoder.len(),
            hub_dim = model.hub_encoder.hub_dim(),
            version = model.version().unwrap_or("unknown"),
            "Model loaded"
        );
        Ok(model)
    }

    /// Compare metadata against what was actually loaded. Disagreement
    /// is reported but never fatal.
    fn check_dimensions(&self) {
        let hub_dim = self.hub_encoder.hub_dim();
        let text_dim = self.text_encoder.dim();
        let input_dim = self.predictor.input_dim();

        if let (Some(text_dim), Some(input_dim)) = (text_dim, input_dim) {
            if text_dim + hub_dim != input_dim {
                tracing::warn!(
                    model = %self.key,
                    text_dim, hub_dim, input_dim,
                    "text + hub width does not match predictor input; scoring will fail"
                );
            }
        }

        let Some(meta) = &self.metadata else { return };
        let checks = [
            ("hub_encoder_dim", meta.hub_encoder_dim, Some(hub_dim)),
            ("text_encoder_dim", meta.text_encoder_dim, text_dim),
            ("predictor_input_dim", meta.predictor_input_dim, input_dim),
        ];
        for (field, declared, actual) in checks {
            if let Some(actual) = actual.filter(|&a| a != declared) {
                tracing::warn!(model = %self.key, field, declared, actual, "metadata disagrees with loaded graph");
            }
        }
    }

    pub fn key(&self) -> &ModelKey {
        &self.key
    }

    pub fn metadata(&self) -> Option<&BundleMetadata> {
        self.metadata.as_ref()
    }

    pub fn version(&self) -> Option<&str> {
        self.metadata.as_ref().map(|m| m.version.as_str())
    }

    pub fn hub_dim(&self) -> usize {
        self.hub_encoder.hub_dim()
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    pub fn encode_text(&self, text: &str) -> ServiceResult<Vec<f32>> {
        self.text_encoder.encode(text)
    }

    /// Unknown hubs encode to zeros of `hub_dim`.
    pub fn encode_hub(&self, hub: &str) -> Vec<f32> {
        self.hub_encoder.encode(hub).to_vec()
    }
}

fn read_metadata(path: &Path, key: &ModelKey) -> ServiceResult<Option<BundleMetadata>> {
    if !path.is_file() {
        tracing::warn!(model = %key, "bundle has no {METADATA_FILE}; skipping dimension checks");
        return Ok(None);
    }
    let raw = fs::read(path).map_err(|e| ServiceError::backend(Stage::Metadata, e))?;
    serde_json::from_slice(&raw)
        .map(Some)
        .map_err(|e| ServiceError::backend(Stage::Metadata, e))
}

impl Scorer for LoadedModel {
    fn score(&self, text: &str, hub: &str) -> ServiceResult<f32> {
        let mut input = self.encode_text(text)?;
        input.extend_from_slice(self.hub_encoder.encode(hub));
        self.predictor
            .predict(&input)
            .map_err(|e| e.with_key(self.key.as_str()))
    }
}

impl Drop for LoadedModel {
    fn drop(&mut self) {
        tracing::debug!(model = %self.key, "Releasing model scratch dir '{}'", self.scratch.path().display());
    }
}

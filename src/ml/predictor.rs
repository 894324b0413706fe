// ============================================================
// Layer 5 — Predictor Graph (Burn)
// ============================================================
// Maps the concatenated [text_vec ++ hub_vec] to a probability.
//
// predictor.json is a feed-forward graph evaluated in order:
//
//   {
//     "input_dim": 512,
//     "nodes": [
//       { "op": "linear", "weight": [[...out...] × in], "bias": [...out...] },
//       { "op": "batch_norm", "mean": [...], "var": [...],
//         "gamma": [...], "beta": [...], "eps": 1e-5 },
//       { "op": "relu" },
//       { "op": "linear", ... },
//       { "op": "sigmoid" }
//     ]
//   }
//
// Shapes are checked once at load; the last width must be 1.
// Evaluation runs on Burn's NdArray CPU backend. Dropout is
// absent because it is the identity at inference time.

use std::{fs, path::Path};

use burn::{
    backend::NdArray,
    tensor::{activation, Tensor, TensorData},
};
use serde::Deserialize;

use crate::error::{ServiceError, ServiceResult, Stage};
use crate::infra::bundle::GraphFormat;

type InferBackend = NdArray<f32>;

fn default_eps() -> f32 {
    1e-5
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum NodeSpec {
    Linear {
        weight: Vec<Vec<f32>>,
        bias:   Vec<f32>,
    },
    BatchNorm {
        mean:  Vec<f32>,
        var:   Vec<f32>,
        gamma: Vec<f32>,
        beta:  Vec<f32>,
        #[serde(default = "default_eps")]
        eps:   f32,
    },
    Relu,
    Sigmoid,
    Tanh,
}

#[derive(Debug, Deserialize)]
struct GraphFile {
    input_dim: usize,
    nodes:     Vec<NodeSpec>,
}

/// One validated step. Weights are kept row-major so each call can
/// build fresh tensors from shared read-only data.
#[derive(Debug, Clone)]
enum Layer {
    Linear { weight: Vec<f32>, bias: Vec<f32>, in_dim: usize, out_dim: usize },
    /// Batch norm folded into `x * scale + shift`.
    Affine { scale: Vec<f32>, shift: Vec<f32> },
    Relu,
    Sigmoid,
    Tanh,
}

// ─── DenseGraph ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct DenseGraph {
    input_dim: usize,
    layers:    Vec<Layer>,
}

fn shape_error(node: usize, msg: String) -> ServiceError {
    ServiceError::backend(Stage::Predictor, format!("node {node}: {msg}"))
}

impl DenseGraph {
    pub fn from_json(raw: &[u8]) -> ServiceResult<Self> {
        let file: GraphFile = serde_json::from_slice(raw)
            .map_err(|e| ServiceError::backend(Stage::Predictor, e))?;
        Self::build(file)
    }

    fn build(file: GraphFile) -> ServiceResult<Self> {
        let mut width = file.input_dim;
        let mut layers = Vec::with_capacity(file.nodes.len());

        for (i, node) in file.nodes.into_iter().enumerate() {
            let layer = match node {
                NodeSpec::Linear { weight, bias } => {
                    if weight.len() != width {
                        return Err(shape_error(i, format!("linear expects {width} rows, got {}", weight.len())));
                    }
                    let out_dim = bias.len();
                    if let Some(row) = weight.iter().position(|r| r.len() != out_dim) {
                        return Err(shape_error(i, format!("row {row} width differs from bias width {out_dim}")));
                    }
                    let in_dim = width;
                    width = out_dim;
                    Layer::Linear { weight: weight.concat(), bias, in_dim, out_dim }
                }
                NodeSpec::BatchNorm { mean, var, gamma, beta, eps } => {
                    if [mean.len(), var.len(), gamma.len(), beta.len()].iter().any(|&n| n != width) {
                        return Err(shape_error(i, format!("batch_norm parameters must have width {width}")));
                    }
                    let mut scale = Vec::with_capacity(width);
                    let mut shift = Vec::with_capacity(width);
                    for j in 0..width {
                        let denom = (var[j] + eps).sqrt();
                        if denom.is_nan() || denom <= 0.0 {
                            return Err(shape_error(i, format!("non-positive variance at {j}")));
                        }
                        let s = gamma[j] / denom;
                        scale.push(s);
                        shift.push(beta[j] - mean[j] * s);
                    }
                    Layer::Affine { scale, shift }
                }
                NodeSpec::Relu => Layer::Relu,
                NodeSpec::Sigmoid => Layer::Sigmoid,
                NodeSpec::Tanh => Layer::Tanh,
            };
            layers.push(layer);
        }

        if width != 1 {
            return Err(ServiceError::backend(
                Stage::Predictor,
                format!("graph must end with a single output, got width {width}"),
            ));
        }
        Ok(Self { input_dim: file.input_dim, layers })
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn predict(&self, input: &[f32]) -> ServiceResult<f32> {
        if input.len() != self.input_dim {
            return Err(ServiceError::backend(
                Stage::Predictor,
                format!("input width {} does not match predictor input_dim {}", input.len(), self.input_dim),
            ));
        }

        let device = Default::default();
        let mut x = Tensor::<InferBackend, 2>::from_data(
            TensorData::new(input.to_vec(), [1, self.input_dim]),
            &device,
        );

        for layer in &self.layers {
            x = match layer {
                Layer::Linear { weight, bias, in_dim, out_dim } => {
                    let w = Tensor::<InferBackend, 2>::from_data(
                        TensorData::new(weight.clone(), [*in_dim, *out_dim]),
                        &device,
                    );
                    let b = Tensor::<InferBackend, 1>::from_data(
                        TensorData::new(bias.clone(), [*out_dim]),
                        &device,
                    );
                    x.matmul(w) + b.unsqueeze::<2>()
                }
                Layer::Affine { scale, shift } => {
                    let n = scale.len();
                    let s = Tensor::<InferBackend, 1>::from_data(TensorData::new(scale.clone(), [n]), &device);
                    let t = Tensor::<InferBackend, 1>::from_data(TensorData::new(shift.clone(), [n]), &device);
                    x * s.unsqueeze::<2>() + t.unsqueeze::<2>()
                }
                Layer::Relu => activation::relu(x),
                Layer::Sigmoid => activation::sigmoid(x),
                Layer::Tanh => x.tanh(),
            };
        }

        let out: Vec<f32> = x
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| ServiceError::backend(Stage::Predictor, format!("{e:?}")))?;
        out.first()
            .copied()
            .ok_or_else(|| ServiceError::backend(Stage::Predictor, "predictor returned no output"))
    }
}

// ─── Predictor ────────────────────────────────────────────────────────────────
pub enum Predictor {
    Dense(DenseGraph),
    #[cfg(feature = "onnx")]
    Onnx(super::onnx::OnnxPredictor),
}

impl Predictor {
    pub fn load(path: &Path, format: GraphFormat) -> ServiceResult<Self> {
        match format {
            GraphFormat::Json => {
                let raw = fs::read(path).map_err(|e| {
                    ServiceError::backend(Stage::Predictor, format!("{}: {e}", path.display()))
                })?;
                Ok(Predictor::Dense(DenseGraph::from_json(&raw)?))
            }
            #[cfg(feature = "onnx")]
            GraphFormat::Onnx => Ok(Predictor::Onnx(super::onnx::OnnxPredictor::load(path)?)),
            #[cfg(not(feature = "onnx"))]
            GraphFormat::Onnx => Err(ServiceError::backend(
                Stage::Predictor,
                "predictor.onnx requires the `onnx` feature",
            )),
        }
    }

    pub fn input_dim(&self) -> Option<usize> {
        match self {
            Predictor::Dense(g) => Some(g.input_dim()),
            #[cfg(feature = "onnx")]
            Predictor::Onnx(p) => p.input_dim(),
        }
    }

    pub fn predict(&self, input: &[f32]) -> ServiceResult<f32> {
        match self {
            Predictor::Dense(g) => g.predict(input),
            #[cfg(feature = "onnx")]
            Predictor::Onnx(p) => p.predict(input),
        }
    }
}

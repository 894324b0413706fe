// ============================================================
// Layer 5 — Text Encoder
// ============================================================
// Maps raw text to a fixed-width vector.
//
// text_encoder.json holds a fitted TF-IDF vectorizer:
//
//   {
//     "kind": "tfidf",
//     "vocabulary": { "rust": 0, "ownership": 1, ... },
//     "idf": [1.69, 2.10, ...],
//     "token_pattern": "(?u)\\b[a-zа-яёA-ZА-ЯЁ]{3,}\\b",   (optional)
//     "lowercase": true,                                   (optional)
//     "sublinear_tf": false,                               (optional)
//     "norm": "l2"                                         (optional)
//   }
//
// Transform:
//   text → lowercase → regex tokens → counts of in-vocabulary
//   tokens → (1 + ln tf if sublinear) × idf → normalise
//
// text_encoder.onnx is handed to onnxruntime instead (feature "onnx").

use std::{collections::HashMap, fs, path::Path};

use regex::Regex;
use serde::Deserialize;

use crate::error::{ServiceError, ServiceResult, Stage};
use crate::infra::bundle::GraphFormat;

pub const DEFAULT_TOKEN_PATTERN: &str = r"(?u)\b[a-zа-яёA-ZА-ЯЁ]{3,}\b";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Norm {
    #[default]
    L2,
    L1,
    None,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum EncoderFile {
    Tfidf(TfidfParams),
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct TfidfParams {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f32>,
    #[serde(default)]
    token_pattern: Option<String>,
    #[serde(default = "default_true")]
    lowercase: bool,
    #[serde(default)]
    sublinear_tf: bool,
    #[serde(default)]
    norm: Norm,
}

// ─── TfidfEncoder ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct TfidfEncoder {
    vocabulary:   HashMap<String, usize>,
    idf:          Vec<f32>,
    token_re:     Regex,
    lowercase:    bool,
    sublinear_tf: bool,
    norm:         Norm,
}

impl TfidfEncoder {
    fn from_params(p: TfidfParams) -> ServiceResult<Self> {
        let width = p.idf.len();
        if let Some((token, idx)) = p.vocabulary.iter().find(|(_, &i)| i >= width) {
            return Err(ServiceError::backend(
                Stage::TextEncoder,
                format!("token '{token}' maps to column {idx}, but idf has {width} entries"),
            ));
        }
        let pattern = p.token_pattern.as_deref().unwrap_or(DEFAULT_TOKEN_PATTERN);
        let token_re = Regex::new(pattern)
            .map_err(|e| ServiceError::backend(Stage::TextEncoder, format!("token_pattern: {e}")))?;

        Ok(Self {
            vocabulary: p.vocabulary,
            idf: p.idf,
            token_re,
            lowercase: p.lowercase,
            sublinear_tf: p.sublinear_tf,
            norm: p.norm,
        })
    }

    pub fn dim(&self) -> usize {
        self.idf.len()
    }

    pub fn encode(&self, text: &str) -> Vec<f32> {
        let text = if self.lowercase {
            std::borrow::Cow::Owned(text.to_lowercase())
        } else {
            std::borrow::Cow::Borrowed(text)
        };

        let mut counts: HashMap<usize, f32> = HashMap::new();
        for token in self.token_re.find_iter(&text) {
            if let Some(&idx) = self.vocabulary.get(token.as_str()) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut out = vec![0.0f32; self.idf.len()];
        for (idx, tf) in counts {
            let tf = if self.sublinear_tf { 1.0 + tf.ln() } else { tf };
            out[idx] = tf * self.idf[idx];
        }

        let denom = match self.norm {
            Norm::L2 => out.iter().map(|v| v * v).sum::<f32>().sqrt(),
            Norm::L1 => out.iter().map(|v| v.abs()).sum::<f32>(),
            Norm::None => 1.0,
        };
        if denom > 0.0 && denom != 1.0 {
            out.iter_mut().for_each(|v| *v /= denom);
        }
        out
    }
}

// ─── TextEncoder ──────────────────────────────────────────────────────────────
pub enum TextEncoder {
    Tfidf(TfidfEncoder),
    #[cfg(feature = "onnx")]
    Onnx(super::onnx::OnnxTextEncoder),
}

impl TextEncoder {
    pub fn load(path: &Path, format: GraphFormat) -> ServiceResult<Self> {
        match format {
            GraphFormat::Json => {
                let raw = fs::read(path).map_err(|e| {
                    ServiceError::backend(Stage::TextEncoder, format!("{}: {e}", path.display()))
                })?;
                Self::from_json(&raw)
            }
            #[cfg(feature = "onnx")]
            GraphFormat::Onnx => Ok(TextEncoder::Onnx(super::onnx::OnnxTextEncoder::load(path)?)),
            #[cfg(not(feature = "onnx"))]
            GraphFormat::Onnx => Err(ServiceError::backend(
                Stage::TextEncoder,
                "text_encoder.onnx requires the `onnx` feature",
            )),
        }
    }

    pub fn from_json(raw: &[u8]) -> ServiceResult<Self> {
        let file: EncoderFile = serde_json::from_slice(raw)
            .map_err(|e| ServiceError::backend(Stage::TextEncoder, e))?;
        match file {
            EncoderFile::Tfidf(params) => Ok(TextEncoder::Tfidf(TfidfEncoder::from_params(params)?)),
        }
    }

    /// Output width, when it is known before running the graph.
    pub fn dim(&self) -> Option<usize> {
        match self {
            TextEncoder::Tfidf(enc) => Some(enc.dim()),
            #[cfg(feature = "onnx")]
            TextEncoder::Onnx(enc) => enc.dim(),
        }
    }

    pub fn encode(&self, text: &str) -> ServiceResult<Vec<f32>> {
        match self {
            TextEncoder::Tfidf(enc) => Ok(enc.encode(text)),
            #[cfg(feature = "onnx")]
            TextEncoder::Onnx(enc) => enc.encode(text),
        }
    }
}

// ============================================================
// Error Taxonomy
// ============================================================
// Every failure that can cross the service boundary is one of
// the variants below. Components deeper in the stack return
// these directly; the HTTP layer only maps them to a status
// code and a public message.
//
//   Unauthorized          → 403, caller must fix credentials
//   NotFound              → 404, model unknown locally and remotely
//   InvalidArgument       → 400, malformed request
//   TransientUnavailable  → 503, remote store unreachable / timed out
//   Backend               → 500, load / parse / run failure

use std::fmt;

use thiserror::Error;

/// Which part of the serving path produced a backend error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Extract,
    HubEncoder,
    TextEncoder,
    Predictor,
    Metadata,
    Score,
    /// Call to a peer inference service.
    Peer,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch       => "fetch",
            Stage::Extract     => "extract",
            Stage::HubEncoder  => "hub_encoder",
            Stage::TextEncoder => "text_encoder",
            Stage::Predictor   => "predictor",
            Stage::Metadata    => "metadata",
            Stage::Score       => "score",
            Stage::Peer        => "peer",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("Invalid internal API key")]
    Unauthorized,

    #[error("{what} is not found")]
    NotFound { what: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Remote unavailable ({context})")]
    TransientUnavailable { context: String },

    #[error("Inference backend error at {stage}{}: {message}", key_suffix(.key))]
    Backend {
        stage:   Stage,
        key:     Option<String>,
        message: String,
    },
}

fn key_suffix(key: &Option<String>) -> String {
    key.as_ref().map(|k| format!(" [{k}]")).unwrap_or_default()
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn model_not_found(model: impl fmt::Display) -> Self {
        Self::NotFound { what: format!("Model '{model}'") }
    }

    pub fn transient(context: impl Into<String>) -> Self {
        Self::TransientUnavailable { context: context.into() }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn backend(stage: Stage, message: impl fmt::Display) -> Self {
        Self::Backend { stage, key: None, message: message.to_string() }
    }

    /// Attach the model key to a backend error that was raised
    /// before the key was known (e.g. deep inside a loader).
    pub fn with_key(self, model_key: &str) -> Self {
        match self {
            Self::Backend { stage, key: None, message } => Self::Backend {
                stage,
                key: Some(model_key.to_string()),
                message,
            },
            other => other,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized              => 403,
            Self::NotFound { .. }           => 404,
            Self::InvalidArgument(_)        => 400,
            Self::TransientUnavailable { .. } => 503,
            Self::Backend { .. }            => 500,
        }
    }

    /// True when an outer layer may retry the same call later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientUnavailable { .. })
    }

    /// Message placed in the `error` field of a response body.
    /// Server-class errors are reduced to a fixed string; the detail
    /// goes to the log.
    pub fn public_message(&self) -> String {
        match self {
            Self::Unauthorized | Self::NotFound { .. } | Self::InvalidArgument(_) => {
                self.to_string()
            }
            Self::TransientUnavailable { .. } => {
                "Error during model inference: model store unavailable".to_string()
            }
            Self::Backend { .. } => "Error during model inference".to_string(),
        }
    }
}

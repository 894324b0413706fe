// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain structs and traits that name the concepts of the
// service: model keys, scoring requests and results, history
// records, and the capability traits other layers implement.
//
// Rules for this layer:
//   - NO burn / onnx types
//   - NO file I/O or network calls

/// `"{model_name}.{extension}"` artifact / cache key
pub mod model_key;

/// Request, response and ranking types
pub mod scoring;

/// Status-bearing record of a served request
pub mod history;

/// Scorer, ModelProvider, HistorySink
pub mod traits;

pub use history::HistoryRecord;
pub use model_key::ModelKey;
pub use scoring::{HubScore, ModelItem, ModelListResponse, ScoreRequest, ScoreResponse};
pub use traits::{HistorySink, ModelProvider, Scorer};

// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: no graph math, no HTTP, no
// direct file or bucket access.
//
//   auth.rs             — internal-key gate shared by all use cases
//   score_use_case.rs   — authorize → resolve model → score → rank
//   models_use_case.rs  — authorize → list artifacts
//   service.rs          — assembles the above from ServiceConfig

pub mod auth;
pub mod models_use_case;
pub mod score_use_case;
pub mod service;

pub use service::InferenceService;

//! Hub-relevance inference service.
//!
//! Scores how well a text fits each of a set of topical hubs using a
//! model artifact fetched from an object store:
//!
//! ```text
//!   api (warp routes, peer client)
//!     └─ application (auth gate, score / models use cases)
//!          ├─ ml (model cache → LoadedModel: hub table, text encoder, predictor)
//!          └─ infra (artifact store, S3 / directory remotes, bundles, config, history)
//!   domain (keys, requests, responses, Scorer / ModelProvider / HistorySink)
//! ```

pub mod api;
pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod ml;

pub use error::{ServiceError, ServiceResult, Stage};

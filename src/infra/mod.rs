// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches disks, buckets and config files:
//
//   config.rs          — ServiceConfig: defaults, TOML, validation
//   remote.rs          — RemoteStore trait + directory-backed store
//   s3.rs              — RemoteStore over AWS S3 (feature "s3")
//   artifact_store.rs  — local cache mirror of the remote store
//   bundle.rs          — zip bundle extraction and writing
//   history_log.rs     — CSV request-history sink

pub mod artifact_store;
pub mod bundle;
pub mod config;
pub mod history_log;
pub mod remote;

#[cfg(feature = "s3")]
pub mod s3;

pub use artifact_store::ArtifactStore;
pub use config::{ServiceConfig, StoreConfig};

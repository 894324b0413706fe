// ============================================================
// Layer 6 — Service Configuration
// ============================================================
// One explicit struct holding everything the serving path
// needs. Built once at start-up:
//
//   defaults  →  optional TOML file  →  CLI flags / env vars
//
// then validated and shared behind an Arc. Nothing re-reads
// the environment mid-request.
//
// Example config.toml:
//
//   internal_api_key = "change-me"
//   model_extension  = "zip"
//   cache_capacity   = 10
//
//   [store]
//   bucket    = "habr-models"
//   region    = "eu-central-1"
//   cache_dir = "models_cache"

use std::{
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_HUBS: [&str; 10] = [
    "closet",
    "itcompanies",
    "infosecurity",
    "programming",
    "webdev",
    "popular_science",
    "javascript",
    "gadgets",
    "finance",
    "business-laws",
];

/// Where artifacts come from and where they are mirrored locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Local mirror of downloaded artifacts.
    pub cache_dir:    PathBuf,
    /// S3 bucket holding the artifacts.
    pub bucket:       Option<String>,
    pub region:       Option<String>,
    /// Key prefix inside the bucket, without trailing slash.
    pub prefix:       Option<String>,
    /// Custom S3 endpoint (MinIO, localstack).
    pub endpoint_url: Option<String>,
    /// A directory used as the remote store instead of S3.
    pub remote_dir:   Option<PathBuf>,
    /// Upper bound for any single remote call.
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_dir:    PathBuf::from("models_cache"),
            bucket:       None,
            region:       None,
            prefix:       None,
            endpoint_url: None,
            remote_dir:   None,
            timeout_secs: 30,
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind_addr:           SocketAddr,
    /// Shared secret expected in the `x-internal-key` header.
    pub internal_api_key:    String,
    /// Artifact file extension, without the leading dot.
    pub model_extension:     String,
    /// Maximum number of resident models.
    pub cache_capacity:      usize,
    /// Hubs scored when a request names none.
    pub default_hubs:        Vec<String>,
    /// CSV file receiving request history; disabled when unset.
    pub history_path:        Option<PathBuf>,
    /// Total timeout for calls made by the peer client.
    pub client_timeout_secs: u64,
    pub store:               StoreConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr:           SocketAddr::from(([0, 0, 0, 0], 8001)),
            internal_api_key:    String::new(),
            model_extension:     "zip".to_string(),
            cache_capacity:      10,
            default_hubs:        DEFAULT_HUBS.iter().map(|h| h.to_string()).collect(),
            history_path:        None,
            client_timeout_secs: 10,
            store:               StoreConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load a TOML file; missing keys fall back to defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("Invalid config file '{}'", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Reject configurations the service cannot run with and
    /// normalise the ones it can.
    pub fn validate(mut self) -> Result<Self> {
        self.model_extension = self.model_extension.trim_start_matches('.').to_string();
        if self.model_extension.is_empty() {
            bail!("model_extension must not be empty");
        }
        if self.internal_api_key.is_empty() {
            bail!("internal_api_key must be set (INTERNAL_API_KEY)");
        }
        if self.cache_capacity == 0 {
            bail!("cache_capacity must be at least 1");
        }
        if self.default_hubs.is_empty() {
            bail!("default_hubs must not be empty");
        }
        if self.store.timeout_secs == 0 || self.client_timeout_secs == 0 {
            bail!("timeouts must be at least one second");
        }
        if self.store.bucket.is_some() && self.store.remote_dir.is_some() {
            bail!("store.bucket and store.remote_dir are mutually exclusive");
        }
        if let Some(prefix) = &self.store.prefix {
            self.store.prefix = Some(prefix.trim_matches('/').to_string())
                .filter(|p| !p.is_empty());
        }
        Ok(self)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ServiceConfig::default();
        assert_eq!(cfg.cache_capacity, 10);
        assert_eq!(cfg.model_extension, "zip");
        assert_eq!(cfg.default_hubs.len(), 10);
        assert_eq!(cfg.default_hubs[0], "closet");
        assert_eq!(cfg.default_hubs[9], "business-laws");
        assert_eq!(cfg.store.cache_dir, PathBuf::from("models_cache"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg = ServiceConfig::from_toml_str(
            r#"
            internal_api_key = "secret"
            cache_capacity = 3

            [store]
            bucket = "models"
            region = "eu-central-1"
            prefix = "/exports/"
            "#,
        )
        .unwrap()
        .validate()
        .unwrap();

        assert_eq!(cfg.cache_capacity, 3);
        assert_eq!(cfg.model_extension, "zip");
        assert_eq!(cfg.store.bucket.as_deref(), Some("models"));
        assert_eq!(cfg.store.prefix.as_deref(), Some("exports"));
        assert_eq!(cfg.store.timeout_secs, 30);
    }

    #[test]
    fn test_validate_rejects_missing_key() {
        assert!(ServiceConfig::default().validate().is_err());
    }

    #[test]
    fn test_validate_normalises_extension() {
        let cfg = ServiceConfig {
            internal_api_key: "k".into(),
            model_extension: ".zip".into(),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(cfg.model_extension, "zip");
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let cfg = ServiceConfig {
            internal_api_key: "k".into(),
            cache_capacity: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_two_remotes() {
        let mut cfg = ServiceConfig {
            internal_api_key: "k".into(),
            ..Default::default()
        };
        cfg.store.bucket = Some("b".into());
        cfg.store.remote_dir = Some(PathBuf::from("/srv/models"));
        assert!(cfg.validate().is_err());
    }
}

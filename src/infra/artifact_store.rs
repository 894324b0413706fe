// ============================================================
// Layer 6 — Artifact Store Client
// ============================================================
// Resolves a ModelKey to a local file, mirroring it from the
// remote store on first use.
//
//   models_cache/
//     BoWDSSM.zip              ← complete artifact, served as-is
//     .tmpXXXXXX.part          ← download in progress, never listed
//
// Downloads land in a temp file inside the cache directory and
// are renamed to the final name only when complete, so a
// half-written artifact is never visible under its real name.
// Every remote call is bounded by the configured timeout.

use std::{
    collections::BTreeSet,
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Result;

use super::config::StoreConfig;
use super::remote::{DirRemote, RemoteError, RemoteStore};
use crate::domain::ModelKey;
use crate::error::{ServiceError, ServiceResult, Stage};

const PARTIAL_SUFFIX: &str = ".part";

pub struct ArtifactStore {
    cache_dir: PathBuf,
    extension: String,
    remote:    Option<Arc<dyn RemoteStore>>,
    timeout:   Duration,
}

impl ArtifactStore {
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        extension: impl Into<String>,
        remote:    Option<Arc<dyn RemoteStore>>,
        timeout:   Duration,
    ) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            extension: extension.into().trim_start_matches('.').to_string(),
            remote,
            timeout,
        }
    }

    /// Build the store and its remote from configuration.
    pub async fn from_config(store: &StoreConfig, extension: &str) -> Result<Self> {
        let remote: Option<Arc<dyn RemoteStore>> = if let Some(dir) = &store.remote_dir {
            Some(Arc::new(DirRemote::new(dir)))
        } else if store.bucket.is_some() {
            Some(connect_s3(store).await?)
        } else {
            tracing::warn!("No remote artifact store configured; serving local cache only");
            None
        };

        Ok(Self::new(&store.cache_dir, extension, remote, store.timeout()))
    }

    pub fn local_path(&self, key: &ModelKey) -> PathBuf {
        self.cache_dir.join(key.as_str())
    }

    /// Models in the local cache plus those in the remote store.
    /// A failing remote is logged and skipped.
    pub async fn list_available_models(&self) -> ServiceResult<BTreeSet<ModelKey>> {
        let mut models = self.list_local().await?;

        if let Some(remote) = &self.remote {
            match tokio::time::timeout(self.timeout, remote.list_keys()).await {
                Ok(Ok(keys)) => {
                    models.extend(
                        keys.iter()
                            .filter_map(|k| ModelKey::from_file_name(k, &self.extension)),
                    );
                }
                Ok(Err(err)) => {
                    tracing::warn!("Listing {} failed, using local models only: {err}", remote.location());
                }
                Err(_) => {
                    tracing::warn!(
                        "Listing {} timed out after {:?}, using local models only",
                        remote.location(),
                        self.timeout
                    );
                }
            }
        }
        Ok(models)
    }

    async fn list_local(&self) -> ServiceResult<BTreeSet<ModelKey>> {
        let mut models = BTreeSet::new();
        let mut entries = match tokio::fs::read_dir(&self.cache_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(models),
            Err(e) => return Err(ServiceError::backend(Stage::Fetch, e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ServiceError::backend(Stage::Fetch, e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') || name.ends_with(PARTIAL_SUFFIX) {
                continue;
            }
            if let Some(key) = ModelKey::from_file_name(name, &self.extension) {
                models.insert(key);
            }
        }
        Ok(models)
    }

    /// Local path of the artifact, downloading it first if needed.
    pub async fn fetch(&self, key: &ModelKey) -> ServiceResult<PathBuf> {
        let path = self.local_path(key);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::debug!(model = %key, "Artifact found in local cache");
            return Ok(path);
        }

        let Some(remote) = &self.remote else {
            return Err(ServiceError::model_not_found(key.model_name()));
        };

        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|e| ServiceError::backend(Stage::Fetch, e).with_key(key.as_str()))?;

        // Removed on drop unless persisted below.
        let partial = tempfile::Builder::new()
            .prefix(".")
            .suffix(PARTIAL_SUFFIX)
            .tempfile_in(&self.cache_dir)
            .map_err(|e| ServiceError::backend(Stage::Fetch, e).with_key(key.as_str()))?
            .into_temp_path();

        let started = Instant::now();
        match tokio::time::timeout(self.timeout, remote.download_to(key.as_str(), &partial)).await {
            Ok(Ok(())) => {}
            Ok(Err(RemoteError::NotFound(_))) => {
                return Err(ServiceError::model_not_found(key.model_name()));
            }
            Ok(Err(RemoteError::Unavailable(reason))) => {
                tracing::warn!(model = %key, "Download from {} failed: {reason}", remote.location());
                return Err(ServiceError::transient(format!("downloading {key}: {reason}")));
            }
            Ok(Err(RemoteError::Other(reason))) => {
                return Err(ServiceError::backend(Stage::Fetch, reason).with_key(key.as_str()));
            }
            Err(_) => {
                tracing::warn!(model = %key, "Download from {} timed out", remote.location());
                return Err(ServiceError::transient(format!(
                    "downloading {key} timed out after {:?}",
                    self.timeout
                )));
            }
        }

        partial
            .persist(&path)
            .map_err(|e| ServiceError::backend(Stage::Fetch, e.error).with_key(key.as_str()))?;

        tracing::info!(
            model = %key,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Downloaded artifact from {} to '{}'",
            remote.location(),
            path.display()
        );
        Ok(path)
    }
}

#[cfg(feature = "s3")]
async fn connect_s3(store: &StoreConfig) -> Result<Arc<dyn RemoteStore>> {
    Ok(Arc::new(super::s3::S3Remote::connect(store).await?))
}

#[cfg(not(feature = "s3"))]
async fn connect_s3(_store: &StoreConfig) -> Result<Arc<dyn RemoteStore>> {
    anyhow::bail!("store.bucket is set but this build lacks the 's3' feature")
}

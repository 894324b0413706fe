// ============================================================
// Layer 2 — Service Assembly
// ============================================================
// Wires the long-lived pieces together once at startup:
//
//   ServiceConfig ─┬─ ArtifactStore ── ArtifactModelProvider ── ModelCache
//                  ├─ ScoreUseCase  (auth, cache, extension, default hubs)
//                  ├─ ModelsUseCase (auth, store)
//                  └─ HistorySink   (CSV, optional)
//
// The cache is owned here and released in `shutdown`.

use std::sync::Arc;

use anyhow::Result;

use crate::application::{auth::InternalKey, models_use_case::ModelsUseCase, score_use_case::ScoreUseCase};
use crate::domain::{HistoryRecord, HistorySink, ModelProvider};
use crate::infra::{history_log::CsvHistoryLog, ArtifactStore, ServiceConfig};
use crate::ml::{ArtifactModelProvider, ModelCache};

pub struct InferenceService {
    pub score:  ScoreUseCase,
    pub models: ModelsUseCase,
    cache:      Arc<ModelCache>,
    history:    Option<Arc<dyn HistorySink>>,
}

impl InferenceService {
    /// Build from validated configuration.
    pub async fn from_config(cfg: &ServiceConfig) -> Result<Self> {
        let store = Arc::new(ArtifactStore::from_config(&cfg.store, &cfg.model_extension).await?);

        let history: Option<Arc<dyn HistorySink>> = match &cfg.history_path {
            Some(path) => Some(Arc::new(CsvHistoryLog::open(path)?)),
            None => None,
        };

        let provider: Arc<dyn ModelProvider> = Arc::new(ArtifactModelProvider::new(Arc::clone(&store)));
        let service = Self::assemble(cfg, store, provider, history);

        tracing::info!(
            cache_dir = %cfg.store.cache_dir.display(),
            extension = %cfg.model_extension,
            capacity = cfg.cache_capacity,
            "inference service ready"
        );
        Ok(service)
    }

    /// Build around an explicit provider and sink.
    pub fn assemble(
        cfg:      &ServiceConfig,
        store:    Arc<ArtifactStore>,
        provider: Arc<dyn ModelProvider>,
        history:  Option<Arc<dyn HistorySink>>,
    ) -> Self {
        let auth = InternalKey::new(cfg.internal_api_key.clone());
        let cache = Arc::new(ModelCache::new(provider, cfg.cache_capacity));
        Self {
            score: ScoreUseCase::new(
                auth.clone(),
                Arc::clone(&cache),
                cfg.model_extension.clone(),
                cfg.default_hubs.clone(),
            ),
            models: ModelsUseCase::new(auth, store),
            cache,
            history,
        }
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    /// Best-effort: a failing sink is logged and otherwise ignored.
    pub fn record(&self, record: &HistoryRecord) {
        if let Some(sink) = &self.history {
            if let Err(e) = sink.record(record) {
                tracing::warn!(endpoint = %record.endpoint, "failed to record history: {e:#}");
            }
        }
    }

    /// Release every loaded model.
    pub fn shutdown(&self) {
        self.cache.clear();
    }
}

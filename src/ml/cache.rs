// ============================================================
// Layer 5 — Model Cache
// ============================================================
// Bounded LRU of loaded models with single-flight loading.
//
//   get_or_load(key)
//     │
//     ├─ resident?  → promote, return            (lock held briefly)
//     │
//     └─ otherwise  → join the key's in-flight OnceCell
//                     ├─ first caller runs provider.load(key)
//                     └─ everyone else awaits the same result,
//                        success or error
//                        → insert into LRU, evict the oldest
//
// The index lock is a parking_lot::Mutex and is never held
// across an `.await`, so a slow download for one key does not
// block hits or loads for other keys. A resolved slot leaves the
// in-flight map at once: a failure is shared by the callers that
// were already waiting, and only later calls start a new load.

use std::{collections::HashMap, num::NonZeroUsize, sync::Arc};

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use tokio::sync::OnceCell;

use crate::domain::{ModelKey, ModelProvider, Scorer};
use crate::error::{ServiceError, ServiceResult, Stage};
use crate::infra::ArtifactStore;
use crate::ml::runtime::LoadedModel;

type Slot = Arc<OnceCell<ServiceResult<Arc<dyn Scorer>>>>;

struct Index {
    resident: LruCache<ModelKey, Arc<dyn Scorer>>,
    loading:  HashMap<ModelKey, Slot>,
}

pub struct ModelCache {
    provider: Arc<dyn ModelProvider>,
    index:    Mutex<Index>,
}

impl ModelCache {
    pub fn new(provider: Arc<dyn ModelProvider>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            provider,
            index: Mutex::new(Index {
                resident: LruCache::new(capacity),
                loading:  HashMap::new(),
            }),
        }
    }

    pub async fn get_or_load(&self, key: &ModelKey) -> ServiceResult<Arc<dyn Scorer>> {
        let slot = {
            let mut index = self.index.lock();
            if let Some(model) = index.resident.get(key) {
                tracing::debug!(model = %key, "cache hit");
                return Ok(Arc::clone(model));
            }
            Arc::clone(
                index
                    .loading
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(OnceCell::new())),
            )
        };

        let result = slot
            .get_or_init(|| async {
                tracing::info!(model = %key, "cache miss, loading");
                self.provider.load(key).await
            })
            .await
            .clone();

        let evicted = {
            let mut index = self.index.lock();
            if index.loading.get(key).is_some_and(|s| Arc::ptr_eq(s, &slot)) {
                index.loading.remove(key);
            }
            match &result {
                Ok(_) if index.resident.contains(key) => {
                    index.resident.promote(key);
                    None
                }
                Ok(model) => index.resident.push(key.clone(), Arc::clone(model)),
                Err(_) => None,
            }
        };

        // Dropped outside the lock: releasing a model removes its scratch dir.
        if let Some((old_key, old_model)) = evicted {
            tracing::info!(model = %old_key, "evicted least recently used model");
            drop(old_model);
        }
        result
    }

    pub fn len(&self) -> usize {
        self.index.lock().resident.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.index.lock().resident.cap().get()
    }

    /// Residency check that does not touch recency.
    pub fn contains(&self, key: &ModelKey) -> bool {
        self.index.lock().resident.contains(key)
    }

    /// Resident keys, most recently used first.
    pub fn keys(&self) -> Vec<ModelKey> {
        self.index.lock().resident.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Drop every resident model.
    pub fn clear(&self) {
        let drained: Vec<_> = {
            let mut index = self.index.lock();
            let mut drained = Vec::with_capacity(index.resident.len());
            while let Some(entry) = index.resident.pop_lru() {
                drained.push(entry);
            }
            drained
        };
        if !drained.is_empty() {
            tracing::info!(count = drained.len(), "released all cached models");
        }
    }
}

// ─── ArtifactModelProvider ────────────────────────────────────────────────────
/// Fetches the artifact through the store, then builds the runtime on
/// the blocking pool.
pub struct ArtifactModelProvider {
    store: Arc<ArtifactStore>,
}

impl ArtifactModelProvider {
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ModelProvider for ArtifactModelProvider {
    async fn load(&self, key: &ModelKey) -> ServiceResult<Arc<dyn Scorer>> {
        let path = self.store.fetch(key).await?;
        let owned = key.clone();
        let model = tokio::task::spawn_blocking(move || LoadedModel::from_artifact(&path, &owned))
            .await
            .map_err(|e| {
                ServiceError::backend(Stage::Extract, format!("load task failed: {e}")).with_key(key.as_str())
            })??;
        Ok(Arc::new(model))
    }
}

// ============================================================
// Layer 2 — Models Use Case
// ============================================================
// Lists every model the service could serve: artifacts in the
// local cache directory plus those in the remote store. Names
// are returned without the artifact extension.

use std::sync::Arc;

use crate::application::auth::InternalKey;
use crate::domain::{ModelItem, ModelListResponse};
use crate::error::ServiceResult;
use crate::infra::ArtifactStore;

pub struct ModelsUseCase {
    auth:  InternalKey,
    store: Arc<ArtifactStore>,
}

impl ModelsUseCase {
    pub fn new(auth: InternalKey, store: Arc<ArtifactStore>) -> Self {
        Self { auth, store }
    }

    pub async fn execute(&self, internal_key: Option<&str>) -> ServiceResult<ModelListResponse> {
        self.auth.check(internal_key)?;

        let keys = self.store.list_available_models().await?;
        let mut models: Vec<ModelItem> = keys
            .iter()
            .map(|k| ModelItem { name: k.model_name().to_string() })
            .collect();
        models.sort_by(|a, b| a.name.cmp(&b.name));

        tracing::debug!(count = models.len(), "listed models");
        Ok(ModelListResponse { models })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::infra::remote::{DirRemote, RemoteStore};
    use std::{fs, time::Duration};

    #[tokio::test]
    async fn test_lists_local_and_remote_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache");
        let remote = dir.path().join("remote");
        fs::create_dir_all(&cache).unwrap();
        fs::create_dir_all(&remote).unwrap();
        fs::write(cache.join("local_only.zip"), b"x").unwrap();
        fs::write(remote.join("BoWDSSM.zip"), b"x").unwrap();
        fs::write(remote.join("notes.txt"), b"x").unwrap();

        let remote: Arc<dyn RemoteStore> = Arc::new(DirRemote::new(&remote));
        let store = ArtifactStore::new(&cache, "zip", Some(remote), Duration::from_secs(1));
        let uc = ModelsUseCase::new(InternalKey::new("k"), Arc::new(store));

        let listing = uc.execute(Some("k")).await.unwrap();
        let names: Vec<_> = listing.models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["BoWDSSM", "local_only"]);

        assert!(matches!(uc.execute(Some("nope")).await, Err(ServiceError::Unauthorized)));
    }
}

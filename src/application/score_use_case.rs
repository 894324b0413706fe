// ============================================================
// Layer 2 — Score Use Case
// ============================================================
// One scoring request, step by step:
//
//   Received
//     → Authorized      internal key matches, else Unauthorized
//     → ModelResolved   ModelKey from name + extension, cache.get_or_load
//     → Scored          requested hubs (or the defaults), one score each
//     → Responded       sorted by score, descending, ties keep input order
//
// Every failure leaves as a typed ServiceError; the HTTP layer
// only maps it to a status and a public message.

use std::sync::Arc;

use crate::application::auth::InternalKey;
use crate::domain::{scoring::rank, HubScore, ModelKey, ScoreRequest, Scorer};
use crate::error::{ServiceError, ServiceResult, Stage};
use crate::ml::ModelCache;

pub struct ScoreUseCase {
    auth:         InternalKey,
    cache:        Arc<ModelCache>,
    extension:    String,
    default_hubs: Vec<String>,
}

impl ScoreUseCase {
    pub fn new(
        auth:         InternalKey,
        cache:        Arc<ModelCache>,
        extension:    impl Into<String>,
        default_hubs: Vec<String>,
    ) -> Self {
        Self { auth, cache, extension: extension.into(), default_hubs }
    }

    #[tracing::instrument(skip_all, fields(model = %request.model_name))]
    pub async fn execute(
        &self,
        internal_key: Option<&str>,
        request:      &ScoreRequest,
    ) -> ServiceResult<Vec<HubScore>> {
        self.auth.check(internal_key)?;

        let key = ModelKey::new(&request.model_name, &self.extension)?;
        let model = self.cache.get_or_load(&key).await.map_err(|e| {
            log_failure(&key, &e);
            e
        })?;

        let hubs = request.candidate_hubs(&self.default_hubs).to_vec();
        let text = request.text.clone();
        let scores = tokio::task::spawn_blocking(move || score_all(model.as_ref(), &text, hubs))
            .await
            .map_err(|e| ServiceError::backend(Stage::Score, format!("scoring task failed: {e}")))
            .and_then(|r| r)
            .map_err(|e| {
                let e = as_backend(e).with_key(key.as_str());
                log_failure(&key, &e);
                e
            })?;

        tracing::info!(hubs = scores.len(), "scored");
        Ok(rank(scores))
    }
}

fn score_all(model: &dyn Scorer, text: &str, hubs: Vec<String>) -> ServiceResult<Vec<HubScore>> {
    hubs.into_iter()
        .map(|hub| {
            let score = model.score(text, &hub)?;
            Ok(HubScore { hub, score })
        })
        .collect()
}

/// Errors raised while scoring are never the caller's fault.
fn as_backend(err: ServiceError) -> ServiceError {
    match err {
        ServiceError::Backend { .. } => err,
        other => ServiceError::backend(Stage::Score, other),
    }
}

fn log_failure(key: &ModelKey, err: &ServiceError) {
    match err {
        ServiceError::Backend { stage, message, .. } => {
            tracing::error!(model = %key, stage = %stage, "inference failed: {message}");
        }
        ServiceError::TransientUnavailable { context } => {
            tracing::warn!(model = %key, "model store unavailable: {context}");
        }
        other => tracing::info!(model = %key, "request failed: {other}"),
    }
}

// ============================================================
// Layer 1 — HTTP Routes (warp)
// ============================================================
//   POST /v0/forward   x-internal-key   ScoreRequest → ScoreResponse
//   GET  /v0/models    x-internal-key   → ModelListResponse
//   GET  /health                        → {"status":"ok"}
//
// Failures keep the response shape: `{result: null, error}` on
// /v0/forward and `{error}` elsewhere, with the status taken
// from ServiceError::status_code. Every handled request is
// offered to the history sink after the reply is built.

use std::{convert::Infallible, sync::Arc, time::Instant};

use serde::Serialize;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::application::InferenceService;
use crate::domain::{HistoryRecord, ScoreRequest, ScoreResponse};
use crate::error::ServiceError;

pub const INTERNAL_KEY_HEADER: &str = "x-internal-key";
pub const FORWARD_PATH: &str = "/v0/forward";
pub const MODELS_PATH: &str = "/v0/models";

const MAX_BODY_BYTES: u64 = 4 * 1024 * 1024;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub fn routes(
    service: Arc<InferenceService>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let forward = warp::path!("v0" / "forward")
        .and(warp::post())
        .and(with_internal_key())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_service(Arc::clone(&service)))
        .and_then(handle_forward);

    let models = warp::path!("v0" / "models")
        .and(warp::get())
        .and(with_internal_key())
        .and(with_service(Arc::clone(&service)))
        .and_then(handle_models);

    let health = warp::path!("health")
        .and(warp::get())
        .map(|| warp::reply::json(&serde_json::json!({ "status": "ok" })));

    forward.or(models).or(health).recover(handle_rejection)
}

// ─── Filters ──────────────────────────────────────────────────────────────────
fn with_service(
    service: Arc<InferenceService>,
) -> impl Filter<Extract = (Arc<InferenceService>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&service))
}

/// A missing header is passed on as `None` and rejected by the use case.
fn with_internal_key() -> impl Filter<Extract = (Option<String>,), Error = Rejection> + Clone {
    warp::header::optional::<String>(INTERNAL_KEY_HEADER)
}

fn status_of(err: &ServiceError) -> StatusCode {
    StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// ─── Handlers ─────────────────────────────────────────────────────────────────
async fn handle_forward(
    internal_key: Option<String>,
    body:         ScoreRequest,
    service:      Arc<InferenceService>,
) -> Result<warp::reply::Response, Infallible> {
    let started = Instant::now();
    let text_length = body.text.chars().count();

    let (status, payload) = match service.score.execute(internal_key.as_deref(), &body).await {
        Ok(result) => (StatusCode::OK, ScoreResponse::ok(result)),
        Err(e) => (status_of(&e), ScoreResponse::failed(&e)),
    };

    let latency_ms = elapsed_ms(started);
    tracing::info!(model = %body.model_name, status = status.as_u16(), latency_ms, "POST {FORWARD_PATH}");
    service.record(&HistoryRecord::new(FORWARD_PATH, status.as_u16(), latency_ms).with_text_length(text_length));

    Ok(warp::reply::with_status(warp::reply::json(&payload), status).into_response())
}

async fn handle_models(
    internal_key: Option<String>,
    service:      Arc<InferenceService>,
) -> Result<warp::reply::Response, Infallible> {
    let started = Instant::now();

    let reply = match service.models.execute(internal_key.as_deref()).await {
        Ok(listing) => warp::reply::with_status(warp::reply::json(&listing), StatusCode::OK).into_response(),
        Err(e) => warp::reply::with_status(
            warp::reply::json(&ErrorBody { error: e.public_message() }),
            status_of(&e),
        )
        .into_response(),
    };

    let latency_ms = elapsed_ms(started);
    let status = reply.status().as_u16();
    tracing::info!(status, latency_ms, "GET {MODELS_PATH}");
    service.record(&HistoryRecord::new(MODELS_PATH, status, latency_ms));

    Ok(reply)
}

async fn handle_rejection(err: Rejection) -> Result<warp::reply::Response, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid request body: {e}"))
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request payload too large".to_string())
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Content-Length required".to_string())
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Expected application/json".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        tracing::error!("unhandled rejection: {err:?}");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
    };

    Ok(warp::reply::with_status(warp::reply::json(&ErrorBody { error: message }), status).into_response())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HistorySink, ModelKey, ModelProvider, Scorer};
    use crate::error::ServiceResult;
    use crate::infra::{ArtifactStore, ServiceConfig};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    struct Constant;

    impl Scorer for Constant {
        fn score(&self, _text: &str, hub: &str) -> ServiceResult<f32> {
            Ok(if hub == "finance" { 0.9 } else { 0.1 })
        }
    }

    struct Provider;

    #[async_trait]
    impl ModelProvider for Provider {
        async fn load(&self, key: &ModelKey) -> ServiceResult<Arc<dyn Scorer>> {
            match key.model_name() {
                "ok" => Ok(Arc::new(Constant)),
                "down" => Err(ServiceError::transient("bucket timed out")),
                name => Err(ServiceError::model_not_found(name)),
            }
        }
    }

    #[derive(Default)]
    struct Recorded(Mutex<Vec<(String, u16)>>);

    impl HistorySink for Recorded {
        fn record(&self, r: &HistoryRecord) -> anyhow::Result<()> {
            self.0.lock().push((r.endpoint.clone(), r.status_code));
            Ok(())
        }
    }

    struct Failing;

    impl HistorySink for Failing {
        fn record(&self, _r: &HistoryRecord) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    fn service(history: Arc<dyn HistorySink>) -> (Arc<InferenceService>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ServiceConfig { internal_api_key: "k".into(), ..Default::default() };
        let store = Arc::new(ArtifactStore::new(dir.path(), "zip", None, Duration::from_secs(1)));
        let svc = InferenceService::assemble(&cfg, store, Arc::new(Provider), Some(history));
        (Arc::new(svc), dir)
    }

    async fn forward(svc: &Arc<InferenceService>, key: Option<&str>, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let mut req = warp::test::request().method("POST").path(FORWARD_PATH).json(&body);
        if let Some(key) = key {
            req = req.header(INTERNAL_KEY_HEADER, key);
        }
        let resp = req.reply(&routes(Arc::clone(svc))).await;
        (resp.status(), serde_json::from_slice(resp.body()).unwrap())
    }

    #[tokio::test]
    async fn test_forward_ok_and_history() {
        let history = Arc::new(Recorded::default());
        let (svc, _dir) = service(history.clone());

        let (status, body) = forward(
            &svc,
            Some("k"),
            serde_json::json!({"model_name": "ok", "text": "t", "hubs": ["cpp", "finance"]}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"], serde_json::Value::Null);
        assert_eq!(body["result"][0]["hub"], "finance");
        assert_eq!(body["result"][1]["hub"], "cpp");
        assert_eq!(history.0.lock().as_slice(), [(FORWARD_PATH.to_string(), 200)]);
    }

    #[tokio::test]
    async fn test_forward_status_mapping() {
        let (svc, _dir) = service(Arc::new(Recorded::default()));
        let body = |name: &str| serde_json::json!({"model_name": name, "text": "t", "hubs": null});

        let (status, resp) = forward(&svc, Some("bad"), body("ok")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(resp["error"], "Invalid internal API key");
        assert_eq!(resp["result"], serde_json::Value::Null);

        let (status, _) = forward(&svc, None, body("ok")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, resp) = forward(&svc, Some("k"), body("nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(resp["error"], "Model 'nope' is not found");

        let (status, resp) = forward(&svc, Some("k"), body("down")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!resp["error"].as_str().unwrap().contains("bucket"));

        let (status, _) = forward(&svc, Some("k"), body("a/b")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_history_failure_does_not_change_response() {
        let (svc, _dir) = service(Arc::new(Failing));
        let (status, body) = forward(
            &svc,
            Some("k"),
            serde_json::json!({"model_name": "ok", "text": "t"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"].as_array().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let (svc, _dir) = service(Arc::new(Recorded::default()));
        let resp = warp::test::request()
            .method("POST")
            .path(FORWARD_PATH)
            .header(INTERNAL_KEY_HEADER, "k")
            .header("content-type", "application/json")
            .body(r#"{"text": "no model"}"#)
            .reply(&routes(svc))
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_models_requires_key() {
        let history = Arc::new(Recorded::default());
        let (svc, _dir) = service(history.clone());

        let resp = warp::test::request().path(MODELS_PATH).reply(&routes(Arc::clone(&svc))).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = warp::test::request()
            .path(MODELS_PATH)
            .header(INTERNAL_KEY_HEADER, "k")
            .reply(&routes(svc))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["models"], serde_json::json!([]));
        assert_eq!(
            history.0.lock().as_slice(),
            [(MODELS_PATH.to_string(), 403), (MODELS_PATH.to_string(), 200)]
        );
    }

    #[tokio::test]
    async fn test_health_and_unknown_path() {
        let (svc, _dir) = service(Arc::new(Recorded::default()));
        let resp = warp::test::request().path("/health").reply(&routes(Arc::clone(&svc))).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = warp::test::request().path("/v1/forward").reply(&routes(svc)).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}

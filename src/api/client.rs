// ============================================================
// Layer 1 — Peer Client (reqwest)
// ============================================================
// Calls another inference service over HTTP: the path a
// backend takes when scoring is hosted elsewhere.
//
// Status mapping:
//   403                         → Unauthorized
//   404                         → NotFound
//   400                         → InvalidArgument
//   503, connect error, timeout → TransientUnavailable
//   any other non-2xx           → Backend (stage "peer")

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::Deserialize;

use super::routes::{FORWARD_PATH, INTERNAL_KEY_HEADER, MODELS_PATH};
use crate::domain::{scoring::rank, HubScore, ModelListResponse, ScoreRequest, ScoreResponse};
use crate::error::{ServiceError, ServiceResult, Stage};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Either response shape the service uses for failures.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

pub struct InferenceClient {
    client:       reqwest::Client,
    base_url:     String,
    internal_key: String,
}

impl InferenceClient {
    pub fn new(base_url: &str, internal_key: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .context("Cannot build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            internal_key: internal_key.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Score `request` remotely. Results come back sorted by score,
    /// descending, whatever order the peer used.
    pub async fn forward(&self, request: &ScoreRequest) -> ServiceResult<Vec<HubScore>> {
        let url = format!("{}{FORWARD_PATH}", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header(INTERNAL_KEY_HEADER, &self.internal_key)
            .json(request)
            .send()
            .await
            .map_err(|e| send_error(&url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body: ErrorBody = resp.json().await.unwrap_or_default();
            return Err(status_error(status, body.error, || {
                ServiceError::model_not_found(&request.model_name)
            }));
        }

        let body: ScoreResponse = resp.json().await.map_err(|e| decode_error(&url, e))?;
        match body.result {
            Some(result) => Ok(rank(result)),
            None => Err(ServiceError::backend(
                Stage::Peer,
                format!("{url}: success status without result ({:?})", body.error),
            )),
        }
    }

    pub async fn models(&self) -> ServiceResult<ModelListResponse> {
        let url = format!("{}{MODELS_PATH}", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header(INTERNAL_KEY_HEADER, &self.internal_key)
            .send()
            .await
            .map_err(|e| send_error(&url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body: ErrorBody = resp.json().await.unwrap_or_default();
            return Err(status_error(status, body.error, || ServiceError::NotFound {
                what: url.clone(),
            }));
        }

        resp.json().await.map_err(|e| decode_error(&url, e))
    }
}

fn send_error(url: &str, err: reqwest::Error) -> ServiceError {
    if err.is_timeout() || err.is_connect() {
        ServiceError::transient(format!("{url}: {err}"))
    } else {
        ServiceError::backend(Stage::Peer, format!("{url}: {err}"))
    }
}

fn decode_error(url: &str, err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        ServiceError::transient(format!("{url}: {err}"))
    } else {
        ServiceError::backend(Stage::Peer, format!("{url}: invalid response body: {err}"))
    }
}

fn status_error(
    status:    StatusCode,
    message:   Option<String>,
    not_found: impl FnOnce() -> ServiceError,
) -> ServiceError {
    let message = message.unwrap_or_else(|| status.to_string());
    match status {
        StatusCode::FORBIDDEN => ServiceError::Unauthorized,
        StatusCode::NOT_FOUND => not_found(),
        StatusCode::BAD_REQUEST => ServiceError::invalid(message),
        StatusCode::SERVICE_UNAVAILABLE => ServiceError::transient(message),
        _ => ServiceError::backend(Stage::Peer, format!("status {}: {message}", status.as_u16())),
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::routes;
    use crate::application::InferenceService;
    use crate::domain::{ModelKey, ModelProvider, Scorer};
    use crate::infra::{ArtifactStore, ServiceConfig};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct ByHub;

    impl Scorer for ByHub {
        fn score(&self, _text: &str, hub: &str) -> ServiceResult<f32> {
            Ok(match hub {
                "a" | "b" => 0.9,
                _ => 0.3,
            })
        }
    }

    struct Provider;

    #[async_trait]
    impl ModelProvider for Provider {
        async fn load(&self, key: &ModelKey) -> ServiceResult<Arc<dyn Scorer>> {
            match key.model_name() {
                "m" => Ok(Arc::new(ByHub)),
                name => Err(ServiceError::model_not_found(name)),
            }
        }
    }

    async fn start_server(dir: &std::path::Path) -> String {
        std::fs::write(dir.join("m.zip"), b"x").unwrap();
        let cfg = ServiceConfig { internal_api_key: "k".into(), ..Default::default() };
        let store = Arc::new(ArtifactStore::new(dir, "zip", None, Duration::from_secs(1)));
        let svc = Arc::new(InferenceService::assemble(&cfg, store, Arc::new(Provider), None));

        let (addr, server) = warp::serve(routes(svc)).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_forward_and_models() {
        let dir = tempfile::tempdir().unwrap();
        let base = start_server(dir.path()).await;
        let client = InferenceClient::new(&base, "k", Duration::from_secs(5)).unwrap();

        let req = ScoreRequest::new("m", "text").with_hubs(["c", "a", "b"]);
        let result = client.forward(&req).await.unwrap();
        let hubs: Vec<_> = result.iter().map(|s| s.hub.as_str()).collect();
        assert_eq!(hubs, ["a", "b", "c"]);

        let listing = client.models().await.unwrap();
        assert_eq!(listing.models.len(), 1);
        assert_eq!(listing.models[0].name, "m");
    }

    #[tokio::test]
    async fn test_error_statuses_are_typed() {
        let dir = tempfile::tempdir().unwrap();
        let base = start_server(dir.path()).await;

        let bad_key = InferenceClient::new(&base, "nope", Duration::from_secs(5)).unwrap();
        let err = bad_key.forward(&ScoreRequest::new("m", "t")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized));
        assert!(matches!(bad_key.models().await, Err(ServiceError::Unauthorized)));

        let client = InferenceClient::new(&base, "k", Duration::from_secs(5)).unwrap();
        let err = client.forward(&ScoreRequest::new("ghost", "t")).await.unwrap_err();
        assert_eq!(err.to_string(), "Model 'ghost' is not found");
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_transient() {
        // Bind then drop to get a port nobody listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let client =
            InferenceClient::new(&format!("http://127.0.0.1:{port}/"), "k", Duration::from_secs(2)).unwrap();
        let err = client.forward(&ScoreRequest::new("m", "t")).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(client.base_url(), format!("http://127.0.0.1:{port}"));
    }

    #[test]
    fn test_status_error_mapping() {
        let nf = || ServiceError::model_not_found("x");
        assert!(matches!(status_error(StatusCode::BAD_REQUEST, Some("bad".into()), nf), ServiceError::InvalidArgument(m) if m == "bad"));
        assert!(status_error(StatusCode::SERVICE_UNAVAILABLE, None, nf).is_retryable());
        assert_eq!(status_error(StatusCode::INTERNAL_SERVER_ERROR, None, nf).status_code(), 500);
        assert_eq!(status_error(StatusCode::NOT_FOUND, None, nf).status_code(), 404);
    }
}

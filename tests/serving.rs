// End-to-end tests: a directory-backed artifact store, real bundles,
// the full warp route set.

use std::{path::Path, sync::Arc};

use serde_json::{json, Value};
use warp::http::StatusCode;

use hub_inference::{
    api::routes::{routes, FORWARD_PATH, INTERNAL_KEY_HEADER, MODELS_PATH},
    application::InferenceService,
    infra::{
        bundle::{BundleMetadata, BundleWriter, GraphFormat},
        ServiceConfig, StoreConfig,
    },
};

const KEY: &str = "internal-secret";

/// text "sample" → [1.0]; cpp → [1, 0]; finance → [0, 1];
/// predictor = 0.7 * cpp + 0.2 * finance.
fn write_bundle(path: &Path) {
    BundleWriter::new()
        .hub_encoder(br#"{"cpp":[1.0,0.0],"finance":[0.0,1.0]}"#.to_vec())
        .text_encoder(
            GraphFormat::Json,
            r#"{"kind":"tfidf","vocabulary":{"sample":0},"idf":[1.0],"norm":"none"}"#,
        )
        .predictor(
            GraphFormat::Json,
            r#"{"input_dim":3,"nodes":[{"op":"linear","weight":[[0.0],[0.7],[0.2]],"bias":[0.0]}]}"#,
        )
        .metadata(&BundleMetadata {
            text_encoder_dim: 1,
            hub_encoder_dim: 2,
            predictor_input_dim: 3,
            version: "1.0".into(),
        })
        .unwrap()
        .write_to(path)
        .unwrap();
}

struct Fixture {
    _dir:    tempfile::TempDir,
    cache:   std::path::PathBuf,
    service: Arc<InferenceService>,
}

async fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let remote = dir.path().join("remote");
    let cache = dir.path().join("models_cache");
    std::fs::create_dir_all(&remote).unwrap();
    write_bundle(&remote.join("BoWDSSM.zip"));

    let cfg = ServiceConfig {
        internal_api_key: KEY.into(),
        store: StoreConfig {
            cache_dir: cache.clone(),
            remote_dir: Some(remote),
            ..Default::default()
        },
        ..Default::default()
    }
    .validate()
    .unwrap();

    let service = Arc::new(InferenceService::from_config(&cfg).await.unwrap());
    Fixture { _dir: dir, cache, service }
}

async fn post(service: &Arc<InferenceService>, key: &str, body: Value) -> (StatusCode, Value) {
    let resp = warp::test::request()
        .method("POST")
        .path(FORWARD_PATH)
        .header(INTERNAL_KEY_HEADER, key)
        .json(&body)
        .reply(&routes(Arc::clone(service)))
        .await;
    (resp.status(), serde_json::from_slice(resp.body()).unwrap())
}

#[tokio::test]
async fn test_uncached_model_is_fetched_scored_and_ranked() {
    let fx = fixture().await;
    assert!(!fx.cache.join("BoWDSSM.zip").exists());

    let (status, body) = post(
        &fx.service,
        KEY,
        json!({"model_name": "BoWDSSM", "text": "sample", "hubs": ["finance", "cpp"]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"result": [{"hub": "cpp", "score": 0.7}, {"hub": "finance", "score": 0.2}], "error": null})
    );
    assert!(fx.cache.join("BoWDSSM.zip").is_file());
    assert_eq!(fx.service.cache().len(), 1);
}

#[tokio::test]
async fn test_unknown_hub_scores_without_error() {
    let fx = fixture().await;
    let (status, body) = post(
        &fx.service,
        KEY,
        json!({"model_name": "BoWDSSM", "text": "sample", "hubs": ["no-such-hub", "cpp"]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"][0]["hub"], "cpp");
    assert_eq!(body["result"][1], json!({"hub": "no-such-hub", "score": 0.0}));
}

#[tokio::test]
async fn test_wrong_key_leaves_no_trace() {
    let fx = fixture().await;
    let (status, body) = post(
        &fx.service,
        "wrong",
        json!({"model_name": "BoWDSSM", "text": "sample", "hubs": null}),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({"result": null, "error": "Invalid internal API key"}));
    assert!(!fx.cache.join("BoWDSSM.zip").exists());
    assert!(fx.service.cache().is_empty());
}

#[tokio::test]
async fn test_missing_model_is_404_and_not_cached() {
    let fx = fixture().await;
    let (status, body) = post(
        &fx.service,
        KEY,
        json!({"model_name": "Nope", "text": "sample"}),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["result"], Value::Null);
    assert_eq!(body["error"], "Model 'Nope' is not found");
    assert!(fx.service.cache().is_empty());
}

#[tokio::test]
async fn test_corrupt_artifact_is_500_without_detail() {
    let fx = fixture().await;
    std::fs::create_dir_all(&fx.cache).unwrap();
    std::fs::write(fx.cache.join("Broken.zip"), b"definitely not a zip").unwrap();

    let (status, body) = post(
        &fx.service,
        KEY,
        json!({"model_name": "Broken", "text": "sample"}),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Error during model inference");
    assert!(fx.service.cache().is_empty());
}

#[tokio::test]
async fn test_models_lists_remote_and_local() {
    let fx = fixture().await;
    std::fs::create_dir_all(&fx.cache).unwrap();
    write_bundle(&fx.cache.join("LocalOnly.zip"));

    let resp = warp::test::request()
        .path(MODELS_PATH)
        .header(INTERNAL_KEY_HEADER, KEY)
        .reply(&routes(Arc::clone(&fx.service)))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(resp.body()).unwrap();
    assert_eq!(body, json!({"models": [{"name": "BoWDSSM"}, {"name": "LocalOnly"}]}));
}

#[tokio::test]
async fn test_shutdown_releases_models() {
    let fx = fixture().await;
    post(&fx.service, KEY, json!({"model_name": "BoWDSSM", "text": "sample"})).await;
    assert_eq!(fx.service.cache().len(), 1);

    fx.service.shutdown();
    assert!(fx.service.cache().is_empty());
}

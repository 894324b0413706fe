// ============================================================
// Layer 6 — S3 Remote Store
// ============================================================
// RemoteStore backed by an S3 bucket (or any S3-compatible
// endpoint such as MinIO). Credentials come from the usual AWS
// provider chain (env vars, profile, instance role).
//
// Error mapping:
//   NoSuchKey / NotFound                → RemoteError::NotFound
//   timeout / dispatch / 5xx / throttle → RemoteError::Unavailable
//   anything else                       → RemoteError::Other

use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::{timeout::TimeoutConfig, BehaviorVersion, Region};
use aws_sdk_s3::{
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    Client,
};
use tokio::io::AsyncWriteExt;

use super::config::StoreConfig;
use super::remote::{RemoteError, RemoteStore};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Error codes S3 uses for conditions worth retrying.
const RETRYABLE_CODES: [&str; 4] = ["SlowDown", "ServiceUnavailable", "InternalError", "RequestTimeout"];

pub struct S3Remote {
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

impl S3Remote {
    pub async fn connect(cfg: &StoreConfig) -> Result<Self> {
        let bucket = cfg.bucket.clone().context("store.bucket is not set")?;

        let timeouts = TimeoutConfig::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .operation_timeout(cfg.timeout())
            .build();

        let mut loader = aws_config::defaults(BehaviorVersion::latest()).timeout_config(timeouts);
        if let Some(region) = &cfg.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &cfg.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(cfg.endpoint_url.is_some())
            .build();

        tracing::info!(bucket = %bucket, region = ?cfg.region, "S3 artifact store configured");

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket,
            prefix: cfg.prefix.clone(),
        })
    }

    fn object_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}/{key}"),
            None => key.to_string(),
        }
    }

    fn strip_prefix<'a>(&self, object_key: &'a str) -> Option<&'a str> {
        match &self.prefix {
            Some(prefix) => object_key.strip_prefix(prefix.as_str())?.strip_prefix('/'),
            None => Some(object_key),
        }
    }
}

fn classify<E, R>(err: SdkError<E, R>) -> RemoteError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let detail = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            RemoteError::Unavailable(detail)
        }
        SdkError::ServiceError(_) if err.code().is_some_and(|c| RETRYABLE_CODES.contains(&c)) => {
            RemoteError::Unavailable(detail)
        }
        _ => RemoteError::Other(detail),
    }
}

#[async_trait]
impl RemoteStore for S3Remote {
    fn location(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("s3://{}/{}", self.bucket, prefix),
            None => format!("s3://{}", self.bucket),
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>, RemoteError> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .set_prefix(self.prefix.as_ref().map(|p| format!("{p}/")))
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(classify)?;
            for object in page.contents() {
                if let Some(key) = object.key().and_then(|k| self.strip_prefix(k)) {
                    // Only direct children of the prefix.
                    if !key.is_empty() && !key.contains('/') {
                        keys.push(key.to_string());
                    }
                }
            }
        }
        Ok(keys)
    }

    async fn download_to(&self, key: &str, dest: &Path) -> Result<(), RemoteError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .send()
            .await
            .map_err(|err| {
                let missing = err.as_service_error().is_some_and(|s| s.is_no_such_key())
                    || err.code() == Some("NotFound");
                if missing {
                    RemoteError::NotFound(key.to_string())
                } else {
                    classify(err)
                }
            })?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| RemoteError::Other(format!("{}: {e}", dest.display())))?;

        let mut body = output.body;
        let mut written = 0usize;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?
        {
            written += chunk.len();
            file.write_all(&chunk)
                .await
                .map_err(|e| RemoteError::Other(e.to_string()))?;
        }
        file.sync_all()
            .await
            .map_err(|e| RemoteError::Other(e.to_string()))?;

        tracing::debug!(key, bytes = written, "downloaded object from {}", self.location());
        Ok(())
    }
}

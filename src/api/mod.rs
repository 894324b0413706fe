// ============================================================
// Layer 1 — HTTP Surface
// ============================================================
//   routes.rs  — warp filters and handlers for /v0/*
//   client.rs  — reqwest client for a peer inference service
//
// `serve` owns the process lifetime of the service: it builds
// the InferenceService, runs warp until Ctrl-C, then releases
// every cached model.

pub mod client;
pub mod routes;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::application::InferenceService;
use crate::infra::ServiceConfig;

pub use client::InferenceClient;

pub async fn serve(cfg: &ServiceConfig) -> Result<()> {
    let service = Arc::new(InferenceService::from_config(cfg).await?);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Cannot listen for shutdown signal: {e}");
        }
        tracing::info!("Shutdown signal received");
    };

    let (addr, server) = warp::serve(routes::routes(Arc::clone(&service)))
        .try_bind_with_graceful_shutdown(cfg.bind_addr, shutdown)
        .with_context(|| format!("Cannot bind {}", cfg.bind_addr))?;

    tracing::info!("Listening on http://{addr}");
    server.await;

    service.shutdown();
    tracing::info!("Server stopped");
    Ok(())
}

// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Four subcommands: `serve`, `score`, `models` and `pack`.
//
// Configuration is layered:
//   ServiceConfig::default()
//     → --config file.toml (if given)
//     → flags / environment variables (if given)
//     → validate()
// so a deployment can run from env vars alone, a file alone,
// or a file with a few overrides.

use std::{net::SocketAddr, path::PathBuf};

use anyhow::Result;
use clap::{Args, Subcommand};

use hub_inference::infra::ServiceConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP inference service
    Serve(ServeArgs),

    /// Score a text against hubs with one model
    Score(ScoreArgs),

    /// List the models that can be served
    Models(ModelsArgs),

    /// Assemble a model artifact bundle from its parts
    Pack(PackArgs),
}

/// Settings shared by every command that touches the service.
/// Unset flags leave the file/default value in place.
#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// TOML configuration file
    #[arg(long, env = "HUB_INFERENCE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Shared secret expected in `x-internal-key`
    #[arg(long, env = "INTERNAL_API_KEY", hide_env_values = true)]
    pub internal_api_key: Option<String>,

    /// S3 bucket holding model artifacts
    #[arg(long, env = "S3_BUCKET_NAME")]
    pub bucket: Option<String>,

    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Directory used as the artifact store instead of S3
    #[arg(long, env = "MODELS_REMOTE_DIR")]
    pub remote_dir: Option<PathBuf>,

    /// Local artifact cache directory
    #[arg(long, env = "MODELS_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Artifact file extension
    #[arg(long, env = "MODEL_EXTENSION")]
    pub model_extension: Option<String>,

    /// Maximum number of models kept loaded
    #[arg(long)]
    pub cache_capacity: Option<usize>,
}

impl ConfigArgs {
    /// Merge file, defaults and overrides into a validated config.
    pub fn resolve(self) -> Result<ServiceConfig> {
        let mut cfg = match &self.config {
            Some(path) => ServiceConfig::from_toml_file(path)?,
            None => ServiceConfig::default(),
        };

        if let Some(v) = self.internal_api_key { cfg.internal_api_key = v; }
        if let Some(v) = self.bucket           { cfg.store.bucket = Some(v); }
        if let Some(v) = self.region           { cfg.store.region = Some(v); }
        if let Some(v) = self.remote_dir       { cfg.store.remote_dir = Some(v); }
        if let Some(v) = self.cache_dir        { cfg.store.cache_dir = v; }
        if let Some(v) = self.model_extension  { cfg.model_extension = v; }
        if let Some(v) = self.cache_capacity   { cfg.cache_capacity = v; }

        cfg.validate()
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Address to listen on
    #[arg(long, env = "BIND_ADDR")]
    pub bind: Option<SocketAddr>,

    /// Append request history to this CSV file
    #[arg(long, env = "HISTORY_PATH")]
    pub history: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ScoreArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Model name, without extension
    #[arg(long)]
    pub model: String,

    /// Text to score
    #[arg(long)]
    pub text: String,

    /// Hub to score against; repeatable. Defaults to the configured list.
    #[arg(long = "hub")]
    pub hubs: Vec<String>,

    /// Score through a running service instead of in-process
    #[arg(long, env = "ML_SERVICE_URL")]
    pub service_url: Option<String>,
}

#[derive(Args, Debug)]
pub struct ModelsArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Ask a running service instead of reading the store directly
    #[arg(long, env = "ML_SERVICE_URL")]
    pub service_url: Option<String>,
}

#[derive(Args, Debug)]
pub struct PackArgs {
    /// JSON table of hub vectors
    #[arg(long)]
    pub hub_encoder: PathBuf,

    /// Text encoder graph (.json or .onnx)
    #[arg(long)]
    pub text_encoder: PathBuf,

    /// Predictor graph (.json or .onnx)
    #[arg(long)]
    pub predictor: PathBuf,

    /// Optional metadata.json
    #[arg(long)]
    pub metadata: Option<PathBuf>,

    /// Output archive path
    #[arg(long)]
    pub out: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_beat_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("svc.toml");
        std::fs::write(
            &path,
            "internal_api_key = \"from-file\"\ncache_capacity = 3\n[store]\ncache_dir = \"file_cache\"\n",
        )
        .unwrap();

        let cfg = ConfigArgs {
            config: Some(path),
            cache_dir: Some("flag_cache".into()),
            model_extension: Some(".onnxzip".into()),
            ..Default::default()
        }
        .resolve()
        .unwrap();

        assert_eq!(cfg.internal_api_key, "from-file");
        assert_eq!(cfg.cache_capacity, 3);
        assert_eq!(cfg.store.cache_dir, PathBuf::from("flag_cache"));
        assert_eq!(cfg.model_extension, "onnxzip");
    }

    #[test]
    fn test_missing_key_is_rejected() {
        assert!(ConfigArgs::default().resolve().is_err());
    }
}

// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parsing is done by
// clap; every command is delegated to the library layers.
//
//   serve   — run the HTTP service until Ctrl-C
//   score   — score one text in-process, or via --service-url
//   models  — list servable models, in-process or via --service-url
//   pack    — build an artifact bundle from its four parts

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, ModelsArgs, PackArgs, ScoreArgs, ServeArgs};

use hub_inference::{
    api::{self, InferenceClient},
    application::InferenceService,
    domain::{ModelListResponse, ScoreRequest, ScoreResponse},
    infra::bundle::{BundleWriter, HUB_ENCODER_FILE, METADATA_FILE, PREDICTOR_STEM, TEXT_ENCODER_STEM},
};

#[derive(Parser, Debug)]
#[command(
    name = "hub-inference",
    version,
    about = "Serve hub-relevance models: score a text against topical hubs."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Serve(args)  => run_serve(args).await,
            Commands::Score(args)  => run_score(args).await,
            Commands::Models(args) => run_models(args).await,
            Commands::Pack(args)   => run_pack(args),
        }
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let mut cfg = args.config.resolve()?;
    if let Some(bind) = args.bind {
        cfg.bind_addr = bind;
    }
    if let Some(history) = args.history {
        cfg.history_path = Some(history);
    }
    api::serve(&cfg).await
}

async fn run_score(args: ScoreArgs) -> Result<()> {
    let cfg = args.config.resolve()?;
    let request = if args.hubs.is_empty() {
        ScoreRequest::new(args.model, args.text)
    } else {
        ScoreRequest::new(args.model, args.text).with_hubs(args.hubs)
    };

    let result = match &args.service_url {
        Some(url) => {
            let client = InferenceClient::new(url, &cfg.internal_api_key, cfg.client_timeout())?;
            client.forward(&request).await
        }
        None => {
            let service = InferenceService::from_config(&cfg).await?;
            let result = service.score.execute(Some(&cfg.internal_api_key), &request).await;
            service.shutdown();
            result
        }
    };

    match result {
        Ok(scores) => {
            println!("{}", serde_json::to_string_pretty(&ScoreResponse::ok(scores))?);
            Ok(())
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&ScoreResponse::failed(&e))?);
            Err(e.into())
        }
    }
}

async fn run_models(args: ModelsArgs) -> Result<()> {
    let cfg = args.config.resolve()?;

    let listing: ModelListResponse = match &args.service_url {
        Some(url) => {
            InferenceClient::new(url, &cfg.internal_api_key, cfg.client_timeout())?
                .models()
                .await?
        }
        None => {
            let service = InferenceService::from_config(&cfg).await?;
            service.models.execute(Some(&cfg.internal_api_key)).await?
        }
    };

    if listing.models.is_empty() {
        println!("No models found.");
    }
    for model in &listing.models {
        println!("{}", model.name);
    }
    Ok(())
}

fn run_pack(args: PackArgs) -> Result<()> {
    let mut writer = BundleWriter::new()
        .file(HUB_ENCODER_FILE, &args.hub_encoder)?
        .graph_file(TEXT_ENCODER_STEM, &args.text_encoder)?
        .graph_file(PREDICTOR_STEM, &args.predictor)?;
    if let Some(metadata) = &args.metadata {
        writer = writer.file(METADATA_FILE, metadata)?;
    }
    writer.write_to(&args.out)?;

    println!("Bundle written to {}", args.out.display());
    Ok(())
}

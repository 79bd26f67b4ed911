use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use e5_embed_server::api::{self, AppState};
use e5_embed_server::config::Config;
use e5_embed_server::embedder::download::download_model_files;
use e5_embed_server::embedder::onnx::OnnxEmbedder;
use e5_embed_server::embedder::Embedder;

/// Serve multilingual-e5 sentence embeddings over HTTP.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Address to bind (overrides server.host)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides server.port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory holding model.onnx and tokenizer.json (overrides model.dir)
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Never fetch missing model files from HuggingFace
    #[arg(long)]
    no_download: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    // 1. Load config
    let mut config = Config::load(&cli.config)?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(dir) = cli.model_dir {
        config.model.dir = dir;
    }
    if cli.no_download {
        config.model.auto_download = false;
    }
    config.validate().context("invalid configuration")?;

    // 2. Fetch and load the model; any failure here stops startup
    info!("Loading {} model...", config.model.name);
    let model_config = config.model.clone();
    let embedder = tokio::task::spawn_blocking(move || -> Result<OnnxEmbedder> {
        if model_config.auto_download {
            download_model_files(&model_config.name, &model_config.dir)?;
        }
        Ok(OnnxEmbedder::new(&model_config)?)
    })
    .await
    .context("model loading task panicked")?
    .context("failed to load embedding model")?;
    info!(
        "Model loaded successfully ({} dimensions)",
        embedder.dimensions()
    );

    // 3. Serve
    let state = AppState::new(Arc::new(embedder), &config.api);
    let app = api::create_router(state);
    api::serve(&config.bind_addr(), app).await
}

mod cli;
mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Commands};
use config::PrismConfig;
use prism_client::{ApiClient, DevBackend, FileSessionStore, MemorySessionStore, SessionContext};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env.prism
    dotenvy::from_filename(".env.prism").ok();

    let cli = Cli::parse();
    let config = PrismConfig::load()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Commands::ConfigPath = cli.command {
        let path = PrismConfig::config_path()?;
        if PrismConfig::ensure_exists(&path)? {
            tracing::info!(path = %path.display(), "wrote default config");
        }
        println!("{}", path.display());
        return Ok(());
    }

    if cli.dev {
        tracing::info!("running against in-memory dev backend");
        let session = SessionContext::new(MemorySessionStore::new());
        return commands::run(cli.command, Arc::new(DevBackend::new()), &session).await;
    }

    let api_url = cli.api_url.unwrap_or(config.api_url);
    let session = Arc::new(SessionContext::restore(FileSessionStore::in_config_dir()?)?);
    let client = ApiClient::new(&api_url, session.clone())?;
    tracing::debug!(%api_url, "using api server");

    commands::run(cli.command, Arc::new(client), &session).await
}

mod commands;

use cart::{CartEngine, HydrationState, StoreFactory};
use clap::Parser;
use commands::Cli;
use shared::config::Config;
use std::process::ExitCode;
use storage_engine::DefaultStoreFactory;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays parseable with --json
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match dotenvy::dotenv() {
        Ok(_) => info!("Loaded environment variables from .env file"),
        Err(_) => info!("No .env file found, using system environment variables"),
    }

    let config = Config::from_env();

    let store = match DefaultStoreFactory.open(&config.store) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to open {} store: {}", config.store.backend.name(), e);
            return ExitCode::FAILURE;
        }
    };

    let engine = CartEngine::start(store, commands::with_store_timeout(config.engine));
    if let HydrationState::Failed { reason } = engine.wait_hydrated().await {
        warn!("Continuing with an empty cart: {}", reason);
    }

    let outcome = commands::run(cli.command, &engine).await;
    let items = engine.items();
    engine.shutdown().await;

    if let Err(e) = outcome {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match commands::render(&items, cli.json) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Failed to render cart: {}", e);
            ExitCode::FAILURE
        }
    }
}

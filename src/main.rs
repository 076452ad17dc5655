use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use marketplace_harvester::{
    AppConfig, MarketplaceSource, app,
    utils::{logging, metrics},
    web::{self, AppState},
};

#[derive(Parser, Debug)]
#[command(
    name = "harvester",
    about = "On-demand marketplace catalog ingestion with browser-driven extraction"
)]
struct Cli {
    /// Explicit configuration file instead of the config/ directory.
    #[arg(long, short)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default).
    Serve,
    /// Run one ingestion pass for a query and print the report as JSON.
    Scrape {
        query: String,
        /// Limit the pass to these marketplaces; repeatable.
        #[arg(long = "source", short)]
        sources: Vec<MarketplaceSource>,
    },
    /// Print the effective extraction rules as TOML.
    Sources,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::from_env(),
    }
    .context("Failed to load configuration")?;

    let _guard = logging::init_tracing(&config.logging)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Scrape { query, sources } => scrape(config, &query, &sources).await,
        Command::Sources => {
            let book = app::load_rule_book(&config)?;
            print!("{}", book.to_toml_string()?);
            Ok(())
        }
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    logging::log_startup(&config);

    let metrics_handle = if config.metrics.enabled {
        Some(metrics::install_recorder()?)
    } else {
        None
    };

    let search = Arc::new(app::initialize(&config).await?);
    let state = AppState::new(search, metrics_handle, config.clone());

    if config.metrics.enabled && config.metrics.port != config.server.port {
        let metrics_addr = format!("{}:{}", config.server.host, config.metrics.port);
        let listener = TcpListener::bind(&metrics_addr)
            .await
            .with_context(|| format!("Failed to bind metrics listener on {}", metrics_addr))?;
        info!("Serving metrics on http://{}{}", metrics_addr, config.metrics.endpoint);
        let router = web::metrics_router(state.clone());
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    let router = web::create_router(state);
    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Server running on http://{}", address);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down...");
    Ok(())
}

async fn scrape(config: AppConfig, query: &str, sources: &[MarketplaceSource]) -> Result<()> {
    let manager = app::initialize(&config).await?;
    let report = if sources.is_empty() {
        manager.scrape(query).await?
    } else {
        let normalized = manager.normalize_query(query).await?;
        manager.orchestrator().restricted_to(sources).run(&normalized).await
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.failed_sources().is_empty() {
        error!(failed = ?report.failed_sources(), "Some marketplaces failed");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{AppConfig, LoggingConfig};

/// Installs the global subscriber: stdout always, plus a daily rolling file
/// when `logging.directory` is set. `RUST_LOG` overrides `logging.level`.
///
/// Keep the returned guard alive for the life of the process, or buffered file
/// output is lost.
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true));

    match &config.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory)?;
            let appender = tracing_appender::rolling::daily(directory, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .try_init()?;
            Ok(Some(guard))
        }
        None => {
            registry.try_init()?;
            Ok(None)
        }
    }
}

pub fn log_startup(config: &AppConfig) {
    info!("{}", "=".repeat(60));
    info!("Starting Marketplace Harvester on {}", config.bind_address());
    let enabled: Vec<&str> = config.sources.enabled.iter().map(|s| s.as_str()).collect();
    info!("Enabled marketplaces: {}", enabled.join(", "));
    match &config.analyzer.endpoint {
        Some(endpoint) => info!("Text analyzer: {}", endpoint),
        None => info!("Text analyzer: local keyword ranking"),
    }
    info!("{}", "=".repeat(60));
}

/// Shortens long text for log lines.
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

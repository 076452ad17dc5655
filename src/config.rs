use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use url::Url;

use crate::models::MarketplaceSource;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub browser: BrowserConfig,
    pub sources: SourcesConfig,
    pub analyzer: AnalyzerConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Seconds. A cold search runs a full scrape, so this is generous.
    pub request_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    pub chrome_path: Option<String>,
    pub user_agent: Option<String>,
    pub headless: bool,
    pub sandbox: bool,
    /// Seconds without CDP traffic before Chrome is considered hung.
    pub idle_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    pub enabled: Vec<MarketplaceSource>,
    /// TOML file whose `[[source]]` tables replace or extend the built-in rule sets.
    pub rules_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Base URL of a remote text analyzer. The local keyword analyzer is used when unset.
    pub endpoint: Option<String>,
    pub top_n: usize,
    pub request_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Served on the API listener when equal to `server.port`.
    pub port: u16,
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// Enables a daily rolling log file in this directory.
    pub directory: Option<String>,
    pub file_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            request_timeout: 1800,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/catalog.db".to_string(),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: 30,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            user_agent: None,
            headless: true,
            sandbox: true,
            idle_timeout: 300,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            enabled: vec![
                MarketplaceSource::Olx,
                MarketplaceSource::Kaspi,
                MarketplaceSource::Alfa,
                MarketplaceSource::Wildberries,
            ],
            rules_file: None,
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            top_n: 30,
            request_timeout: 30,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 5000,
            endpoint: "/metrics".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "marketplace_harvester=info,tower_http=info".to_string(),
            directory: None,
            file_prefix: "harvester.log".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Built-in defaults
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local config (ignored by git)
            .add_source(File::with_name("config/local").required(false));

        Self::finish(builder)
    }

    /// Defaults, then one explicit file, then the environment.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::from(path.as_ref()));

        Self::finish(builder)
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let s = builder
            // Environment variables prefixed "HARVEST__", e.g. HARVEST__SERVER__PORT
            .add_source(
                Environment::with_prefix("HARVEST")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("sources.enabled")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        if config.browser.chrome_path.is_none() {
            config.browser.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port must be greater than 0".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "Database max_connections must be greater than 0".into(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Message(
                "Database min_connections cannot exceed max_connections".into(),
            ));
        }

        if self.sources.enabled.is_empty() {
            return Err(ConfigError::Message(
                "At least one marketplace must be enabled in sources.enabled".into(),
            ));
        }

        if let Some(endpoint) = &self.analyzer.endpoint {
            if Url::parse(endpoint).is_err() {
                return Err(ConfigError::Message("Invalid analyzer endpoint URL".into()));
            }
        }

        if self.analyzer.top_n == 0 {
            return Err(ConfigError::Message("Analyzer top_n must be greater than 0".into()));
        }

        if self.metrics.port == 0 {
            return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
        }

        if !self.metrics.endpoint.starts_with('/') {
            return Err(ConfigError::Message("Metrics endpoint must start with '/'".into()));
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

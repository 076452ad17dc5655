//! Wiring of the pipeline from configuration.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::adapter::SourceAdapter;
use crate::analysis::{HttpAnalyzer, KeywordAnalyzer, QueryPreprocessor, Ranker};
use crate::browser::{ChromeSessionFactory, SessionFactory};
use crate::config::AppConfig;
use crate::ingest::IngestGate;
use crate::orchestrator::ScrapeOrchestrator;
use crate::rules::RuleBook;
use crate::search_manager::SearchManager;
use crate::store::{CatalogStore, SqliteCatalogStore};
use crate::utils::error::Result;

/// Built-in rule sets plus the overrides named in `sources.rules_file`.
pub fn load_rule_book(config: &AppConfig) -> Result<RuleBook> {
    let mut book = RuleBook::builtin();
    if let Some(path) = &config.sources.rules_file {
        let replaced = book.load_overrides(path)?;
        info!("Loaded {} rule sets from {}", replaced, path);
    }
    Ok(book)
}

/// One adapter per enabled marketplace, sharing the store through the gate.
pub fn build_orchestrator(
    config: &AppConfig,
    book: &RuleBook,
    store: Arc<dyn CatalogStore>,
    factory: Arc<dyn SessionFactory>,
) -> Result<ScrapeOrchestrator> {
    let gate = IngestGate::new(store);
    let adapters = book
        .select(&config.sources.enabled)?
        .into_iter()
        .map(|rules| SourceAdapter::new(rules, &config.browser, gate.clone()))
        .collect();
    Ok(ScrapeOrchestrator::new(adapters, factory))
}

/// The remote analyzer when an endpoint is configured, the keyword analyzer otherwise.
pub fn build_analyzer(config: &AppConfig) -> Result<(Arc<dyn QueryPreprocessor>, Arc<dyn Ranker>)> {
    match &config.analyzer.endpoint {
        Some(endpoint) => {
            let analyzer = Arc::new(HttpAnalyzer::new(
                endpoint,
                Duration::from_secs(config.analyzer.request_timeout),
            )?);
            Ok((analyzer.clone(), analyzer))
        }
        None => {
            let analyzer = Arc::new(KeywordAnalyzer::new(config.analyzer.top_n));
            Ok((analyzer.clone(), analyzer))
        }
    }
}

pub fn build_search_manager(
    config: &AppConfig,
    store: Arc<dyn CatalogStore>,
    factory: Arc<dyn SessionFactory>,
) -> Result<SearchManager> {
    let book = load_rule_book(config)?;
    let orchestrator = build_orchestrator(config, &book, Arc::clone(&store), factory)?;
    let (preprocessor, ranker) = build_analyzer(config)?;
    Ok(SearchManager::new(preprocessor, ranker, store, orchestrator))
}

/// Production wiring: SQLite catalog and local Chrome sessions.
pub async fn initialize(config: &AppConfig) -> Result<SearchManager> {
    let store: Arc<dyn CatalogStore> = Arc::new(SqliteCatalogStore::connect(&config.database).await?);
    build_search_manager(config, store, Arc::new(ChromeSessionFactory))
}

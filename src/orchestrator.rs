//! Concurrent fan-out of one query to every configured marketplace.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::adapter::{SourceAdapter, SourceReport};
use crate::browser::SessionFactory;
use crate::models::MarketplaceSource;
use crate::utils::metrics;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    Completed(SourceReport),
    Failed {
        source: MarketplaceSource,
        error: String,
    },
}

impl SourceOutcome {
    pub fn source(&self) -> MarketplaceSource {
        match self {
            SourceOutcome::Completed(report) => report.source,
            SourceOutcome::Failed { source, .. } => *source,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrchestrationReport {
    pub query: String,
    pub outcomes: Vec<SourceOutcome>,
}

impl OrchestrationReport {
    fn completed(&self) -> impl Iterator<Item = &SourceReport> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            SourceOutcome::Completed(report) => Some(report),
            SourceOutcome::Failed { .. } => None,
        })
    }

    pub fn total_inserted(&self) -> usize {
        self.completed().map(|r| r.inserted).sum()
    }

    pub fn total_available(&self) -> usize {
        self.completed().map(|r| r.available()).sum()
    }

    pub fn failed_sources(&self) -> Vec<MarketplaceSource> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, SourceOutcome::Failed { .. }))
            .map(SourceOutcome::source)
            .collect()
    }

    /// True when the catalog may now hold records for the query.
    pub fn requires_requery(&self) -> bool {
        self.total_available() > 0
    }
}

#[derive(Clone)]
pub struct ScrapeOrchestrator {
    adapters: Vec<SourceAdapter>,
    factory: Arc<dyn SessionFactory>,
}

impl ScrapeOrchestrator {
    pub fn new(adapters: Vec<SourceAdapter>, factory: Arc<dyn SessionFactory>) -> Self {
        Self { adapters, factory }
    }

    pub fn sources(&self) -> Vec<MarketplaceSource> {
        self.adapters.iter().map(SourceAdapter::source).collect()
    }

    /// Same factory, only the adapters for `sources`.
    pub fn restricted_to(&self, sources: &[MarketplaceSource]) -> Self {
        Self {
            adapters: self
                .adapters
                .iter()
                .filter(|a| sources.contains(&a.source()))
                .cloned()
                .collect(),
            factory: Arc::clone(&self.factory),
        }
    }

    /// Runs every adapter as its own task and waits for all of them. A failing
    /// or panicking source is reported without affecting its siblings.
    pub async fn run(&self, query: &str) -> OrchestrationReport {
        info!(query, sources = self.adapters.len(), "Starting scrape");

        let (sources, tasks): (Vec<_>, Vec<_>) = self
            .adapters
            .iter()
            .map(|adapter| {
                let source = adapter.source();
                let adapter = adapter.clone();
                let factory = Arc::clone(&self.factory);
                let query = query.to_string();
                let task = tokio::spawn(async move { adapter.run(factory.as_ref(), &query).await });
                (source, task)
            })
            .unzip();

        let outcomes = sources
            .into_iter()
            .zip(join_all(tasks).await)
            .map(|(source, joined)| match joined {
                Ok(Ok(report)) => SourceOutcome::Completed(report),
                Ok(Err(e)) => {
                    warn!(source = %source, query, "Marketplace scrape failed: {}", e);
                    metrics::record_source_failure(source);
                    SourceOutcome::Failed {
                        source,
                        error: e.to_string(),
                    }
                }
                Err(e) => {
                    error!(source = %source, query, "Marketplace scrape task aborted: {}", e);
                    metrics::record_source_failure(source);
                    SourceOutcome::Failed {
                        source,
                        error: format!("scrape task aborted: {}", e),
                    }
                }
            })
            .collect();

        let report = OrchestrationReport {
            query: query.to_string(),
            outcomes,
        };
        info!(
            query,
            inserted = report.total_inserted(),
            failed = report.failed_sources().len(),
            "Scrape finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeBrowser, Page};
    use crate::browser::{BrowserSession, SessionOptions};
    use crate::config::BrowserConfig;
    use crate::ingest::IngestGate;
    use crate::rules::sources;
    use crate::store::{CatalogStore, SqliteCatalogStore};
    use crate::utils::error::Result;
    use async_trait::async_trait;

    fn pages() -> Vec<(String, Page)> {
        vec![
            (
                "https://alfa.kz/q/case".to_string(),
                Page::Html(
                    r#"<div class="product-item"><div class="title"><a href="/p/1">Case</a></div></div>"#
                        .to_string(),
                ),
            ),
            (
                "https://alfa.kz/p/1".to_string(),
                Page::Html(
                    r#"<h1 class="single-product-title">Case</h1>
                       <div class="price"><span class="num">990 ₸</span></div>
                       <div class="gallery-holder"><img src="https://alfa.kz/1.jpg"></div>"#
                        .to_string(),
                ),
            ),
        ]
    }

    async fn orchestrator(factory: Arc<dyn SessionFactory>) -> (ScrapeOrchestrator, Arc<SqliteCatalogStore>) {
        let store = Arc::new(SqliteCatalogStore::in_memory().await.unwrap());
        let gate = IngestGate::new(store.clone());
        let adapters = vec![
            SourceAdapter::new(sources::kaspi(), &BrowserConfig::default(), gate.clone()),
            SourceAdapter::new(sources::alfa(), &BrowserConfig::default(), gate),
        ];
        (ScrapeOrchestrator::new(adapters, factory), store)
    }

    #[tokio::test]
    async fn test_failed_source_does_not_affect_siblings() {
        let browser = FakeBrowser::new(pages()).refusing(&["Kaspi"]);
        let (orchestrator, store) = orchestrator(Arc::new(browser)).await;

        let report = orchestrator.run("case").await;

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.failed_sources(), vec![MarketplaceSource::Kaspi]);
        assert_eq!(report.total_inserted(), 1);
        assert!(report.requires_requery());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_nothing_found_does_not_require_requery() {
        let browser = FakeBrowser::new(Vec::new());
        let (orchestrator, _store) = orchestrator(Arc::new(browser)).await;

        let report = orchestrator.run("case").await;
        assert_eq!(report.failed_sources().len(), 2);
        assert!(!report.requires_requery());
    }

    struct PanickingFactory;

    #[async_trait]
    impl SessionFactory for PanickingFactory {
        async fn open(&self, options: &SessionOptions) -> Result<Box<dyn BrowserSession>> {
            panic!("browser crashed for {}", options.label);
        }
    }

    #[tokio::test]
    async fn test_panicking_source_is_reported_as_failed() {
        let (orchestrator, _store) = orchestrator(Arc::new(PanickingFactory)).await;

        let report = orchestrator.run("case").await;
        match &report.outcomes[0] {
            SourceOutcome::Failed { source, error } => {
                assert_eq!(*source, MarketplaceSource::Kaspi);
                assert!(error.contains("aborted"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_restricted_to_keeps_only_requested_sources() {
        let (orchestrator, _store) = orchestrator(Arc::new(FakeBrowser::new(pages()))).await;
        let only_alfa = orchestrator.restricted_to(&[MarketplaceSource::Alfa]);

        assert_eq!(only_alfa.sources(), vec![MarketplaceSource::Alfa]);
        let report = only_alfa.run("case").await;
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].source(), MarketplaceSource::Alfa);
    }

    #[test]
    fn test_report_serializes_tagged_outcomes() {
        let report = OrchestrationReport {
            query: "case".to_string(),
            outcomes: vec![SourceOutcome::Failed {
                source: MarketplaceSource::Olx,
                error: "timed out".to_string(),
            }],
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["outcomes"][0]["status"], "failed");
        assert_eq!(value["outcomes"][0]["source"], "OLX");
    }
}

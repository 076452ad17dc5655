// Shared fixtures for the integration tests: a scripted browser serving static
// HTML, simple per-marketplace rule sets and an in-memory catalog.

pub mod api_tests;
pub mod pipeline_tests;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

use marketplace_harvester::{
    AppConfig, AppError, MarketplaceSource, SearchManager,
    adapter::SourceAdapter,
    analysis::KeywordAnalyzer,
    browser::{BrowserSession, SessionFactory, SessionOptions},
    config::BrowserConfig,
    ingest::IngestGate,
    models::RecordField,
    orchestrator::ScrapeOrchestrator,
    rules::{DetailRules, ExtractionRuleSet, FieldRule, LinkRule, NavigationRule, PriceRule},
    store::{CatalogStore, SqliteCatalogStore},
    web::{AppState, create_router},
};

pub const QUERY: &str = "phone case";

#[derive(Debug, Clone)]
pub enum Page {
    Html(String),
    Timeout,
}

#[derive(Debug, Default)]
pub struct SessionLog {
    pub opened: Vec<String>,
    pub closed: Vec<String>,
    pub visits: Vec<String>,
}

/// Serves pages from a fixed URL map instead of launching Chrome.
#[derive(Clone, Default)]
pub struct ScriptedBrowser {
    pages: Arc<HashMap<String, Page>>,
    refused: Arc<Vec<String>>,
    log: Arc<Mutex<SessionLog>>,
}

impl ScriptedBrowser {
    pub fn new(pages: Vec<(String, Page)>) -> Self {
        Self {
            pages: Arc::new(pages.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Sessions for these marketplaces fail to launch.
    pub fn refusing(mut self, sources: &[MarketplaceSource]) -> Self {
        self.refused = Arc::new(sources.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn opened(&self, source: MarketplaceSource) -> usize {
        let label = source.to_string();
        self.log.lock().unwrap().opened.iter().filter(|l| **l == label).count()
    }

    pub fn closed(&self, source: MarketplaceSource) -> usize {
        let label = source.to_string();
        self.log.lock().unwrap().closed.iter().filter(|l| **l == label).count()
    }

    pub fn visits(&self) -> Vec<String> {
        self.log.lock().unwrap().visits.clone()
    }
}

#[async_trait]
impl SessionFactory for ScriptedBrowser {
    async fn open(&self, options: &SessionOptions) -> marketplace_harvester::Result<Box<dyn BrowserSession>> {
        if self.refused.contains(&options.label) {
            return Err(AppError::Internal(format!("Chrome failed to start for {}", options.label)));
        }
        self.log.lock().unwrap().opened.push(options.label.clone());
        Ok(Box::new(ScriptedSession {
            browser: self.clone(),
            label: options.label.clone(),
            current: None,
            closed: false,
        }))
    }
}

struct ScriptedSession {
    browser: ScriptedBrowser,
    label: String,
    current: Option<String>,
    closed: bool,
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> marketplace_harvester::Result<()> {
        self.browser.log.lock().unwrap().visits.push(url.to_string());
        self.current = None;
        match self.browser.pages.get(url) {
            Some(Page::Html(_)) => {
                self.current = Some(url.to_string());
                Ok(())
            }
            Some(Page::Timeout) => Err(AppError::Navigation {
                url: url.to_string(),
                message: format!("timed out after {}s", timeout.as_secs()),
            }),
            None => Err(AppError::Navigation {
                url: url.to_string(),
                message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            }),
        }
    }

    async fn content(&mut self) -> marketplace_harvester::Result<String> {
        match self.current.as_ref().and_then(|url| self.browser.pages.get(url)) {
            Some(Page::Html(html)) => Ok(html.clone()),
            _ => Err(AppError::Internal("No page loaded".to_string())),
        }
    }

    fn current_url(&self) -> Option<String> {
        self.current.clone()
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.browser.log.lock().unwrap().closed.push(self.label.clone());
        }
    }
}

pub fn host(source: MarketplaceSource) -> String {
    format!("https://{}.test", source.as_str().to_lowercase())
}

/// Minimal markup shared by every test marketplace.
pub fn rules_for(source: MarketplaceSource, max_links: usize) -> ExtractionRuleSet {
    ExtractionRuleSet {
        source,
        list_url_template: format!("{}/search?q={{query}}", host(source)),
        required_fields: RecordField::MANDATORY.to_vec(),
        links: LinkRule {
            selector: "a.item".to_string(),
            exclude: vec!["/wishlist".to_string()],
            require: Vec::new(),
            max_links,
        },
        detail: DetailRules {
            title: FieldRule::text("h1"),
            price: FieldRule::text(".price"),
            image: FieldRule::attr("img.main", "src"),
            description: Some(FieldRule::text(".desc")),
            specifications: None,
            reviews: None,
        },
        price: PriceRule::native("KZT", "₸", &["₸"]),
        navigation: NavigationRule {
            timeout_secs: 5,
            user_agent: None,
            sandbox: Some(false),
        },
    }
}

pub fn list_url(source: MarketplaceSource) -> String {
    format!("{}/search?q={}", host(source), urlencoding::encode(QUERY))
}

pub fn item_url(source: MarketplaceSource, n: usize) -> String {
    format!("{}/p/{}", host(source), n)
}

pub fn list_page(hrefs: &[String]) -> Page {
    let cards: String = hrefs
        .iter()
        .map(|href| format!(r#"<div class="card"><a class="item" href="{}">item</a></div>"#, href))
        .collect();
    Page::Html(format!("<html><body>{}</body></html>", cards))
}

pub fn item_page(title: &str, price: Option<&str>) -> Page {
    let price = price
        .map(|p| format!(r#"<span class="price">{}</span>"#, p))
        .unwrap_or_default();
    Page::Html(format!(
        r#"<html><body><h1> {} </h1>{}<img class="main" src="/img/{}.jpg"><p class="desc">Silicone</p></body></html>"#,
        title,
        price,
        title.len()
    ))
}

/// List page plus `count` complete item pages for one marketplace.
pub fn catalog_pages(source: MarketplaceSource, count: usize) -> Vec<(String, Page)> {
    let hrefs: Vec<String> = (1..=count).map(|n| format!("/p/{}", n)).collect();
    let mut pages = vec![(list_url(source), list_page(&hrefs))];
    for n in 1..=count {
        pages.push((
            item_url(source, n),
            item_page(&format!("{} phone case {}", source, n), Some("4 990 ₸")),
        ));
    }
    pages
}

pub async fn create_test_store() -> anyhow::Result<Arc<SqliteCatalogStore>> {
    Ok(Arc::new(SqliteCatalogStore::in_memory().await?))
}

pub fn create_orchestrator(
    rule_sets: Vec<ExtractionRuleSet>,
    store: Arc<dyn CatalogStore>,
    browser: ScriptedBrowser,
) -> ScrapeOrchestrator {
    let gate = IngestGate::new(store);
    let browser_config = BrowserConfig::default();
    let adapters = rule_sets
        .into_iter()
        .map(|rules| SourceAdapter::new(rules, &browser_config, gate.clone()))
        .collect();
    ScrapeOrchestrator::new(adapters, Arc::new(browser))
}

pub fn create_search_manager(
    rule_sets: Vec<ExtractionRuleSet>,
    store: Arc<dyn CatalogStore>,
    browser: ScriptedBrowser,
) -> SearchManager {
    let analyzer = Arc::new(KeywordAnalyzer::new(30));
    let orchestrator = create_orchestrator(rule_sets, Arc::clone(&store), browser);
    SearchManager::new(analyzer.clone(), analyzer, store, orchestrator)
}

pub fn get_test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.server.host = "127.0.0.1".to_string();
    config.database.url = "sqlite::memory:".to_string();
    config.metrics.enabled = false;
    config
}

pub async fn create_test_app_state(browser: ScriptedBrowser) -> anyhow::Result<AppState> {
    let store = create_test_store().await?;
    let manager = create_search_manager(
        vec![rules_for(MarketplaceSource::Kaspi, 12)],
        store,
        browser,
    );
    Ok(AppState::new(Arc::new(manager), None, get_test_config()))
}

/// Sends one request through a fresh router.
pub async fn make_request(
    state: AppState,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> anyhow::Result<(axum::http::StatusCode, serde_json::Value)> {
    let mut request = Request::builder().method(method).uri(uri);
    if body.is_some() {
        request = request.header("content-type", "application/json");
    }
    let request = request.body(Body::from(
        body.map(|b| b.to_string()).unwrap_or_default(),
    ))?;

    let response = create_router(state).oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let json = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).to_string()));
    Ok((status, json))
}

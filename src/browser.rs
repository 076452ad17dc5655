//! Headless browser sessions.
//!
//! A session is one browser process with at most one open page. The source
//! adapter opens a session per run, navigates it through the list page and every
//! detail page, and closes it on every exit path. `headless_chrome` is a
//! blocking client, so all calls into it go through `spawn_blocking`.

use anyhow::anyhow;
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::BrowserConfig;
use crate::extract::{self, RawExtraction};
use crate::rules::{DetailRules, ExtractionRuleSet, LinkRule};
use crate::utils::error::{AppError, Result};

/// Slack on top of the page timeout before the blocking navigation is abandoned.
const NAVIGATION_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    /// Used in logs and by test factories to tell sessions apart.
    pub label: String,
    pub chrome_path: Option<String>,
    pub user_agent: Option<String>,
    pub headless: bool,
    pub sandbox: bool,
    pub idle_timeout: Duration,
}

impl SessionOptions {
    /// Launch settings for one marketplace: rule-level overrides win over the browser config.
    pub fn for_rules(config: &BrowserConfig, rules: &ExtractionRuleSet) -> Self {
        Self {
            label: rules.source.to_string(),
            chrome_path: config.chrome_path.clone(),
            user_agent: rules
                .navigation
                .user_agent
                .clone()
                .or_else(|| config.user_agent.clone()),
            headless: config.headless,
            sandbox: rules.navigation.sandbox.unwrap_or(config.sandbox),
            idle_timeout: Duration::from_secs(config.idle_timeout),
        }
    }
}

#[async_trait]
pub trait BrowserSession: Send {
    /// Loads `url` in a fresh page, failing with `AppError::Navigation` after `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;

    /// Rendered HTML of the current page.
    async fn content(&mut self) -> Result<String>;

    /// Final URL of the current page after redirects.
    fn current_url(&self) -> Option<String>;

    /// Releases the page and the browser. Safe to call more than once.
    async fn close(&mut self);
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, options: &SessionOptions) -> Result<Box<dyn BrowserSession>>;
}

/// Item links on the current page.
pub async fn extract_links(session: &mut dyn BrowserSession, rule: &LinkRule) -> Result<Vec<String>> {
    let html = session.content().await?;
    let page_url = session.current_url().unwrap_or_default();
    Ok(extract::extract_links(&html, &page_url, rule))
}

/// Record fields on the current page.
pub async fn extract_detail(
    session: &mut dyn BrowserSession,
    rules: &DetailRules,
) -> Result<RawExtraction> {
    let html = session.content().await?;
    let page_url = session.current_url().unwrap_or_default();
    Ok(extract::extract_fields(&html, &page_url, rules))
}

fn launch_options(options: &SessionOptions) -> anyhow::Result<LaunchOptions<'static>> {
    let mut launch_options = LaunchOptions::default_builder()
        .headless(options.headless)
        .sandbox(options.sandbox)
        .idle_browser_timeout(options.idle_timeout)
        .args(vec![
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--disable-gpu"),
            OsStr::new("--disable-extensions"),
            OsStr::new("--disable-background-timer-throttling"),
            OsStr::new("--disable-renderer-backgrounding"),
        ])
        .build()
        .map_err(|e| anyhow!("Failed to create launch options: {}", e))?;

    if let Some(chrome_path) = &options.chrome_path {
        launch_options.path = Some(PathBuf::from(chrome_path));
    }

    Ok(launch_options)
}

/// Pages a session has created and not yet closed, including pages whose
/// navigation was abandoned by the outer timeout while still loading.
struct OpenTabs<T> {
    tabs: Arc<Mutex<Vec<Arc<T>>>>,
}

impl<T> Clone for OpenTabs<T> {
    fn clone(&self) -> Self {
        Self {
            tabs: Arc::clone(&self.tabs),
        }
    }
}

impl<T> Default for OpenTabs<T> {
    fn default() -> Self {
        Self {
            tabs: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T> OpenTabs<T> {
    fn track(&self, tab: &Arc<T>) {
        self.tabs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(tab));
    }

    fn forget(&self, tab: &Arc<T>) {
        self.tabs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|t| !Arc::ptr_eq(t, tab));
    }

    fn drain(&self) -> Vec<Arc<T>> {
        std::mem::take(&mut *self.tabs.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Creates a page, registers it, then loads it. A page that fails to load is
/// closed before the error is returned.
fn open_page<T>(
    tabs: &OpenTabs<T>,
    create: impl FnOnce() -> anyhow::Result<Arc<T>>,
    load: impl FnOnce(&Arc<T>) -> anyhow::Result<()>,
    close: impl Fn(&Arc<T>),
) -> anyhow::Result<Arc<T>> {
    let tab = create()?;
    tabs.track(&tab);
    match load(&tab) {
        Ok(()) => Ok(tab),
        Err(e) => {
            close(&tab);
            tabs.forget(&tab);
            Err(e)
        }
    }
}

fn close_tab(tab: &Arc<Tab>) {
    if let Err(e) = tab.close(true) {
        debug!("Failed to close tab: {}", e);
    }
}

/// Launches a local Chrome/Chromium per session.
#[derive(Debug, Default, Clone)]
pub struct ChromeSessionFactory;

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    async fn open(&self, options: &SessionOptions) -> Result<Box<dyn BrowserSession>> {
        let launch = launch_options(options).map_err(|e| AppError::Internal(e.to_string()))?;

        let browser = tokio::task::spawn_blocking(move || Browser::new(launch))
            .await
            .map_err(|e| AppError::Internal(format!("Browser launch task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Failed to launch browser: {}", e)))?;

        debug!("Launched browser for {}", options.label);

        Ok(Box::new(ChromeSession {
            label: options.label.clone(),
            user_agent: options.user_agent.clone(),
            browser: Some(Arc::new(browser)),
            tab: None,
            open_tabs: OpenTabs::default(),
        }))
    }
}

pub struct ChromeSession {
    label: String,
    user_agent: Option<String>,
    browser: Option<Arc<Browser>>,
    tab: Option<Arc<Tab>>,
    open_tabs: OpenTabs<Tab>,
}

impl ChromeSession {
    /// Closes the current page and any page left behind by an abandoned navigation.
    async fn release_tab(&mut self) {
        self.tab = None;
        let tabs = self.open_tabs.drain();
        if tabs.is_empty() {
            return;
        }
        debug!("Closing {} tabs for {}", tabs.len(), self.label);
        let _ = tokio::task::spawn_blocking(move || tabs.iter().for_each(close_tab)).await;
    }

    fn navigation_error(url: &str, message: impl Into<String>) -> AppError {
        AppError::Navigation {
            url: url.to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        let browser = self
            .browser
            .clone()
            .ok_or_else(|| Self::navigation_error(url, "session is closed"))?;

        self.release_tab().await;

        let user_agent = self.user_agent.clone();
        let target = url.to_string();
        let tabs = self.open_tabs.clone();
        let navigation = tokio::task::spawn_blocking(move || {
            open_page(
                &tabs,
                || browser.new_tab(),
                |tab| {
                    tab.set_default_timeout(timeout);
                    if let Some(agent) = user_agent.as_deref() {
                        tab.set_user_agent(agent, None, None)?;
                    }
                    tab.navigate_to(&target)?.wait_until_navigated()?;
                    Ok(())
                },
                close_tab,
            )
        });

        match tokio::time::timeout(timeout + NAVIGATION_GRACE, navigation).await {
            Ok(Ok(Ok(tab))) => {
                self.tab = Some(tab);
                Ok(())
            }
            Ok(Ok(Err(e))) => Err(Self::navigation_error(url, e.to_string())),
            Ok(Err(e)) => Err(Self::navigation_error(url, format!("navigation task failed: {}", e))),
            Err(_) => Err(Self::navigation_error(
                url,
                format!("timed out after {}s", timeout.as_secs()),
            )),
        }
    }

    async fn content(&mut self) -> Result<String> {
        let tab = self
            .tab
            .clone()
            .ok_or_else(|| AppError::Internal("No page loaded".to_string()))?;
        let url = tab.get_url();

        tokio::task::spawn_blocking(move || tab.get_content())
            .await
            .map_err(|e| Self::navigation_error(&url, format!("content task failed: {}", e)))?
            .map_err(|e| Self::navigation_error(&url, format!("failed to read page: {}", e)))
    }

    fn current_url(&self) -> Option<String> {
        self.tab.as_ref().map(|tab| tab.get_url())
    }

    async fn close(&mut self) {
        self.release_tab().await;
        if let Some(browser) = self.browser.take() {
            // Dropping the last handle terminates the Chrome process.
            let _ = tokio::task::spawn_blocking(move || drop(browser)).await;
            debug!("Closed browser for {}", self.label);
        }
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if self.browser.is_some() {
            warn!("Browser session for {} dropped without close", self.label);
        }
    }
}

//! Declarative per-marketplace extraction rules.
//!
//! A rule set says where a marketplace's search results live, which anchors on
//! that page lead to item pages, and how each product record field is read off
//! an item page. Rule sets carry no behavior; the generic source adapter
//! interprets them.

use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::models::{MarketplaceSource, RecordField};
use crate::utils::error::{AppError, Result};

pub mod price;
pub mod sources;

pub use price::PriceRule;

pub const QUERY_PLACEHOLDER: &str = "{query}";
pub const DEFAULT_MAX_LINKS: usize = 12;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionRuleSet {
    pub source: MarketplaceSource,
    /// Search results URL with a `{query}` placeholder.
    pub list_url_template: String,
    #[serde(default = "default_required_fields")]
    pub required_fields: Vec<RecordField>,
    pub links: LinkRule,
    pub detail: DetailRules,
    pub price: PriceRule,
    #[serde(default)]
    pub navigation: NavigationRule,
}

/// How candidate item links are gathered from a rendered list page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkRule {
    pub selector: String,
    /// Links containing any of these substrings are dropped (wishlist actions and such).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    /// When non-empty, a link must contain one of these substrings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub require: Vec<String>,
    #[serde(default = "default_max_links")]
    pub max_links: usize,
}

/// Single-element extraction: element text, or an attribute when `attribute` is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldRule {
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

/// Inner selectors producing a `name: value` entry from one matched element.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PairRule {
    pub name: String,
    pub value: String,
}

/// Multi-element extraction joined with a fixed separator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MultiFieldRule {
    pub selector: String,
    pub separator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair: Option<PairRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetailRules {
    pub title: FieldRule,
    pub price: FieldRule,
    pub image: FieldRule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<FieldRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specifications: Option<MultiFieldRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews: Option<MultiFieldRule>,
}

/// Browser options a marketplace needs on top of the global browser settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NavigationRule {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Overrides `browser.sandbox` for this marketplace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<bool>,
}

impl Default for NavigationRule {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: None,
            sandbox: None,
        }
    }
}

/// Percent-encodes like a browser's `encodeURIComponent`: `!'()*` stay literal.
fn encode_query(query: &str) -> String {
    const UNRESERVED: [(&str, &str); 5] = [
        ("%21", "!"),
        ("%27", "'"),
        ("%28", "("),
        ("%29", ")"),
        ("%2A", "*"),
    ];
    UNRESERVED
        .iter()
        .fold(urlencoding::encode(query).into_owned(), |encoded, (escaped, literal)| {
            encoded.replace(escaped, literal)
        })
}

fn default_required_fields() -> Vec<RecordField> {
    RecordField::MANDATORY.to_vec()
}

fn default_max_links() -> usize {
    DEFAULT_MAX_LINKS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl MultiFieldRule {
    pub fn text(selector: &str, separator: &str) -> Self {
        Self {
            selector: selector.to_string(),
            separator: separator.to_string(),
            pair: None,
        }
    }

    pub fn pairs(selector: &str, name: &str, value: &str, separator: &str) -> Self {
        Self {
            selector: selector.to_string(),
            separator: separator.to_string(),
            pair: Some(PairRule {
                name: name.to_string(),
                value: value.to_string(),
            }),
        }
    }
}

impl FieldRule {
    pub fn text(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            attribute: None,
        }
    }

    pub fn attr(selector: &str, attribute: &str) -> Self {
        Self {
            selector: selector.to_string(),
            attribute: Some(attribute.to_string()),
        }
    }
}

impl ExtractionRuleSet {
    /// Search results URL for an already-normalized query.
    pub fn list_url(&self, query: &str) -> String {
        self.list_url_template
            .replace(QUERY_PLACEHOLDER, &encode_query(query))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.navigation.timeout_secs)
    }

    pub fn is_required(&self, field: RecordField) -> bool {
        self.required_fields.contains(&field)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |message: String| AppError::RuleSet {
            marketplace: self.source,
            message,
        };

        if !self.list_url_template.contains(QUERY_PLACEHOLDER) {
            return Err(fail(format!(
                "list_url_template must contain {}",
                QUERY_PLACEHOLDER
            )));
        }
        url::Url::parse(&self.list_url(""))
            .map_err(|e| fail(format!("list_url_template is not a valid URL: {}", e)))?;

        if self.links.max_links == 0 {
            return Err(fail("links.max_links must be greater than 0".into()));
        }

        if self.navigation.timeout_secs == 0 {
            return Err(fail("navigation.timeout_secs must be greater than 0".into()));
        }

        for field in RecordField::MANDATORY {
            if !self.is_required(field) {
                return Err(fail(format!(
                    "required_fields must include {}",
                    field.as_str()
                )));
            }
        }

        for selector in self.selectors() {
            Selector::parse(selector)
                .map_err(|e| fail(format!("invalid selector '{}': {:?}", selector, e)))?;
        }

        self.price.validate().map_err(fail)?;
        Ok(())
    }

    fn selectors(&self) -> Vec<&str> {
        let detail = &self.detail;
        let mut selectors = vec![
            self.links.selector.as_str(),
            detail.title.selector.as_str(),
            detail.price.selector.as_str(),
            detail.image.selector.as_str(),
        ];
        if let Some(description) = &detail.description {
            selectors.push(&description.selector);
        }
        for multi in [&detail.specifications, &detail.reviews].into_iter().flatten() {
            selectors.push(&multi.selector);
            if let Some(pair) = &multi.pair {
                selectors.push(&pair.name);
                selectors.push(&pair.value);
            }
        }
        selectors
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RuleFile {
    #[serde(default, rename = "source")]
    sources: Vec<ExtractionRuleSet>,
}

/// The effective set of rule sets, keyed by marketplace.
#[derive(Debug, Clone)]
pub struct RuleBook {
    rule_sets: HashMap<MarketplaceSource, ExtractionRuleSet>,
}

impl RuleBook {
    pub fn builtin() -> Self {
        let mut rule_sets = HashMap::new();
        for rules in sources::all() {
            rule_sets.insert(rules.source, rules);
        }
        Self { rule_sets }
    }

    /// Parses `[[source]]` tables from a TOML document.
    pub fn parse_toml(contents: &str) -> Result<Vec<ExtractionRuleSet>> {
        let file: RuleFile = toml::from_str(contents)?;
        Ok(file.sources)
    }

    /// Replaces or adds rule sets from a TOML file.
    pub fn load_overrides(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let overrides = Self::parse_toml(&contents)?;
        let count = overrides.len();
        for rules in overrides {
            tracing::debug!(source = %rules.source, "Overriding extraction rules");
            self.rule_sets.insert(rules.source, rules);
        }
        Ok(count)
    }

    pub fn get(&self, source: MarketplaceSource) -> Option<&ExtractionRuleSet> {
        self.rule_sets.get(&source)
    }

    /// Validated rule sets for the requested marketplaces, in request order.
    pub fn select(&self, enabled: &[MarketplaceSource]) -> Result<Vec<ExtractionRuleSet>> {
        let mut selected = Vec::with_capacity(enabled.len());
        for source in enabled {
            let rules = self.get(*source).ok_or_else(|| AppError::RuleSet {
                marketplace: *source,
                message: "no extraction rules configured".into(),
            })?;
            rules.validate()?;
            if !selected.iter().any(|r: &ExtractionRuleSet| r.source == *source) {
                selected.push(rules.clone());
            }
        }
        Ok(selected)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        let mut sources: Vec<ExtractionRuleSet> = self.rule_sets.values().cloned().collect();
        sources.sort_by_key(|rules| {
            MarketplaceSource::ALL
                .iter()
                .position(|s| *s == rules.source)
                .unwrap_or(usize::MAX)
        });
        toml::to_string_pretty(&RuleFile { sources })
            .map_err(|e| AppError::Internal(format!("Failed to render rule sets: {}", e)))
    }
}

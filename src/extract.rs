use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

use crate::rules::{DetailRules, FieldRule, LinkRule, MultiFieldRule};

/// Field values read off a detail page before normalization. Absent elements are `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawExtraction {
    pub title: Option<String>,
    pub price: Option<String>,
    pub description: Option<String>,
    pub image_src: Option<String>,
    pub specifications: Option<String>,
    pub reviews: Option<String>,
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() { None } else { Some(text) }
}

fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!("Skipping invalid CSS selector '{}': {:?}", selector, e);
            None
        }
    }
}

/// Resolves an href/src against the page URL. Only http(s) targets are kept.
pub fn resolve_url(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let resolved = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };

    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

/// Candidate item links in document order, filtered, de-duplicated and capped.
pub fn extract_links(html: &str, page_url: &str, rule: &LinkRule) -> Vec<String> {
    let Some(selector) = parse_selector(&rule.selector) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        if links.len() >= rule.max_links {
            break;
        }
        let Some(link) = element
            .value()
            .attr("href")
            .and_then(|href| resolve_url(base.as_ref(), href))
        else {
            continue;
        };

        if rule.exclude.iter().any(|pattern| link.contains(pattern.as_str())) {
            continue;
        }
        if !rule.require.is_empty()
            && !rule.require.iter().any(|pattern| link.contains(pattern.as_str()))
        {
            continue;
        }
        if seen.insert(link.clone()) {
            links.push(link);
        }
    }

    links
}

fn extract_single(document: &Html, base: Option<&Url>, rule: &FieldRule) -> Option<String> {
    let selector = parse_selector(&rule.selector)?;
    let element = document.select(&selector).next()?;

    match rule.attribute.as_deref() {
        Some(attribute) => {
            let value = element.value().attr(attribute)?.trim();
            if attribute == "href" || attribute.ends_with("src") {
                resolve_url(base, value)
            } else {
                non_empty(collapse_whitespace(value))
            }
        }
        None => non_empty(element_text(element)),
    }
}

fn extract_multi(document: &Html, rule: &MultiFieldRule) -> Option<String> {
    let selector = parse_selector(&rule.selector)?;
    let pair_selectors = match &rule.pair {
        Some(pair) => Some((parse_selector(&pair.name)?, parse_selector(&pair.value)?)),
        None => None,
    };

    let entries: Vec<String> = document
        .select(&selector)
        .filter_map(|element| match &pair_selectors {
            Some((name, value)) => {
                let name = element.select(name).next().map(element_text)?;
                let value = element.select(value).next().map(element_text)?;
                if name.is_empty() || value.is_empty() {
                    None
                } else {
                    Some(format!("{}: {}", name, value))
                }
            }
            None => non_empty(element_text(element)),
        })
        .collect();

    non_empty(entries.join(&rule.separator))
}

/// Applies the detail rules to a rendered page. Never fails; unmatched rules yield `None`.
pub fn extract_fields(html: &str, page_url: &str, rules: &DetailRules) -> RawExtraction {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();
    let base = base.as_ref();

    RawExtraction {
        title: extract_single(&document, base, &rules.title),
        price: extract_single(&document, base, &rules.price),
        description: rules
            .description
            .as_ref()
            .and_then(|rule| extract_single(&document, base, rule)),
        image_src: extract_single(&document, base, &rules.image),
        specifications: rules
            .specifications
            .as_ref()
            .and_then(|rule| extract_multi(&document, rule)),
        reviews: rules
            .reviews
            .as_ref()
            .and_then(|rule| extract_multi(&document, rule)),
    }
}

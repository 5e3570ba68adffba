//! Result page parsing and candidate link extraction
//!
//! Extraction applies a primary CSS selector tuned to the provider's current
//! result markup. When it matches nothing, fallback selectors are tried in
//! order so markup drift degrades results instead of breaking the lookup.
//! Every extracted target must be an absolute http(s) URL; redirect wrappers
//! used by the engines (`/url?q=`, `/l/?uddg=`) are unwrapped first.

use scraper::{Html, Selector};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, warn};
use url::Url;

use crate::normalize::{is_http_url, lowercase_scheme};
use crate::query::SearchQuery;

/// Base used to resolve protocol-relative and root-relative redirect hrefs
const RESOLVE_BASE: &str = "https://search.invalid/";

/// A URL extracted from provider output, tied to the query that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateLink {
    pub url: String,
    pub query: SearchQuery,
}

impl CandidateLink {
    pub fn new(url: impl Into<String>, query: SearchQuery) -> Self {
        Self {
            url: url.into(),
            query,
        }
    }
}

/// A pre-parsed hit returned by a structured search service
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StructuredHit {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// What a provider hands back for one query
#[derive(Debug, Clone, PartialEq)]
pub enum RawResultSet {
    /// Result page HTML, to be parsed with the provider's selectors
    Markup(String),
    /// Link-bearing records already parsed by the provider
    Structured(Vec<StructuredHit>),
}

/// Per-provider selection rules
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorSet {
    /// Name used in logs
    pub name: String,
    pub primary: String,
    pub fallbacks: Vec<String>,
    /// Hosts of the engine's own pages (see [`host_matches`] for the pattern forms)
    pub excluded_hosts: Vec<String>,
}

impl SelectorSet {
    pub fn google() -> Self {
        Self {
            name: "google".to_string(),
            primary: "div.yuRUbf > a".to_string(),
            fallbacks: vec![
                "div.g a[href]".to_string(),
                "#search a[href]".to_string(),
                "a[href^='/url?']".to_string(),
            ],
            excluded_hosts: vec!["google.*".to_string()],
        }
    }

    pub fn duckduckgo() -> Self {
        Self {
            name: "duckduckgo".to_string(),
            primary: "a.result__a".to_string(),
            fallbacks: vec![
                ".result__title a".to_string(),
                "div.result a[href]".to_string(),
            ],
            excluded_hosts: vec!["duckduckgo.com".to_string()],
        }
    }

    /// All selectors in the order they are tried
    pub fn in_order(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.fallbacks.iter().map(String::as_str))
    }

    /// Check that every selector parses, returning the first bad one
    pub fn validate(&self) -> Result<(), (String, String)> {
        for selector in self.in_order() {
            Selector::parse(selector).map_err(|e| (selector.to_string(), e.to_string()))?;
        }
        Ok(())
    }

    fn is_excluded(&self, url: &str) -> bool {
        let host = match Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_ascii_lowercase)) {
            Some(host) => host,
            None => return true,
        };
        self.excluded_hosts.iter().any(|pattern| host_matches(&host, pattern))
    }
}

/// Match a host against an exclusion pattern.
///
/// A plain domain matches itself and its subdomains. `name.*` matches
/// `name.<country suffix>` with or without a leading `www.`, so
/// `google.*` covers `www.google.com.br` but not `google.org` or `bigoogle.com`.
fn host_matches(host: &str, pattern: &str) -> bool {
    let pattern = pattern.trim().to_ascii_lowercase();
    match pattern.strip_suffix(".*") {
        Some(name) => {
            let host = host.strip_prefix("www.").unwrap_or(host);
            host.strip_prefix(name)
                .and_then(|rest| rest.strip_prefix('.'))
                .is_some_and(is_country_suffix)
        }
        None => host == pattern || host.ends_with(&format!(".{}", pattern)),
    }
}

/// `com`, a two-letter country code, or `com.<cc>` / `co.<cc>`
fn is_country_suffix(suffix: &str) -> bool {
    let is_country_code = |label: &str| label.len() == 2 && label.bytes().all(|b| b.is_ascii_lowercase());
    match suffix.split_once('.') {
        None => suffix == "com" || is_country_code(suffix),
        Some((second, code)) => matches!(second, "com" | "co") && is_country_code(code),
    }
}

/// Which rule produced the links
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorTier {
    Primary,
    /// Index into `SelectorSet::fallbacks`
    Fallback(usize),
    /// No selector matched any element
    NoMatch,
    /// The provider returned structured hits
    Structured,
}

impl SelectorTier {
    /// Results came from a fallback rule: the primary selector needs maintenance
    pub fn is_degraded(&self) -> bool {
        matches!(self, SelectorTier::Fallback(_))
    }
}

enum LinkSource {
    Markup { document: Html, selector: Option<Selector> },
    Structured(Vec<StructuredHit>),
}

/// Finite, restartable sequence of candidate links for one query
///
/// Links are produced on demand by [`CandidateLinks::iter`]; every call walks
/// the parsed page again from the start.
pub struct CandidateLinks {
    source: LinkSource,
    selectors: SelectorSet,
    query: SearchQuery,
    max_results: usize,
    tier: SelectorTier,
}

impl CandidateLinks {
    pub fn tier(&self) -> SelectorTier {
        self.tier
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = CandidateLink> + '_> {
        let hrefs: Box<dyn Iterator<Item = &str> + '_> = match &self.source {
            LinkSource::Markup { selector: None, .. } => Box::new(std::iter::empty()),
            LinkSource::Markup { document, selector: Some(selector) } => {
                Box::new(document.select(selector).filter_map(|el| el.value().attr("href")))
            }
            LinkSource::Structured(hits) => Box::new(hits.iter().map(|hit| hit.url.as_str())),
        };

        let links = hrefs
            .filter_map(resolve_href)
            .filter(|url| !self.selectors.is_excluded(url))
            .scan(HashSet::new(), |seen, url| Some(seen.insert(url.clone()).then_some(url)))
            .flatten()
            .take(self.max_results)
            .map(|url| CandidateLink::new(url, self.query.clone()));

        Box::new(links)
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// Extract at most `max_results` candidate links from a provider response.
///
/// Never fails: markup with no usable links yields an empty sequence.
pub fn extract_links(
    raw: RawResultSet,
    selectors: &SelectorSet,
    query: &SearchQuery,
    max_results: usize,
) -> CandidateLinks {
    let (source, tier) = match raw {
        RawResultSet::Structured(hits) => (LinkSource::Structured(hits), SelectorTier::Structured),
        RawResultSet::Markup(html) => {
            let document = Html::parse_document(&html);
            let (selector, tier) = choose_selector(&document, selectors);
            (LinkSource::Markup { document, selector }, tier)
        }
    };

    match tier {
        SelectorTier::Fallback(idx) => warn!(
            provider = %selectors.name,
            primary = %selectors.primary,
            fallback = %selectors.fallbacks[idx],
            "Primary result selector matched nothing; parsing degraded to fallback"
        ),
        SelectorTier::NoMatch => debug!(provider = %selectors.name, query = %query, "No result elements matched any selector"),
        _ => {}
    }

    CandidateLinks {
        source,
        selectors: selectors.clone(),
        query: query.clone(),
        max_results,
        tier,
    }
}

/// First selector (primary, then fallbacks) that matches at least one element
fn choose_selector(document: &Html, selectors: &SelectorSet) -> (Option<Selector>, SelectorTier) {
    for (position, raw_selector) in selectors.in_order().enumerate() {
        let selector = match Selector::parse(raw_selector) {
            Ok(selector) => selector,
            Err(e) => {
                warn!(provider = %selectors.name, selector = raw_selector, "Skipping invalid selector: {}", e);
                continue;
            }
        };

        if document.select(&selector).next().is_some() {
            let tier = if position == 0 {
                SelectorTier::Primary
            } else {
                SelectorTier::Fallback(position - 1)
            };
            return (Some(selector), tier);
        }
    }

    (None, SelectorTier::NoMatch)
}

/// Turn an element's link target into an absolute http(s) URL, if it is one
pub fn resolve_href(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if let Some(target) = unwrap_redirect(href) {
        return is_http_url(&target).then(|| lowercase_scheme(&target));
    }

    is_http_url(href).then(|| lowercase_scheme(href))
}

/// Target of a search-engine redirect link (`/url?q=` or `/l/?uddg=`)
fn unwrap_redirect(href: &str) -> Option<String> {
    let is_google_redirect = href.starts_with("/url?") || (href.contains("google.") && href.contains("/url?"));
    let is_ddg_redirect = href.contains("duckduckgo.com/l/?");
    if !is_google_redirect && !is_ddg_redirect {
        return None;
    }

    let resolved = Url::parse(RESOLVE_BASE).ok()?.join(href).ok()?;
    let wanted: &[&str] = if is_ddg_redirect { &["uddg"] } else { &["q", "url"] };

    resolved
        .query_pairs()
        .find(|(key, _)| wanted.contains(&key.as_ref()))
        .map(|(_, value)| value.into_owned())
}

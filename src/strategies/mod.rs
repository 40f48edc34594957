//! Pluggable extraction strategies.
//!
//! A strategy turns one fetched document into zero or more
//! [`ExtractedArticle`]s. Many strategies coexist; the
//! [`StrategyRegistry`](crate::registry::StrategyRegistry) decides which ones
//! run for a given host and in which order.
//!
//! # Built-in Strategies
//!
//! | Id | Module | Priority | Hosts | Applies when |
//! |----|--------|----------|-------|--------------|
//! | `cnn-lite` | [`sites`] | 100 | `lite.cnn.com` | always |
//! | `npr-text` | [`sites`] | 100 | `text.npr.org` | always |
//! | `hacker-news` | [`hacker_news`] | 100 | `news.ycombinator.com` | always |
//! | `feed` | [`feed`] | 60 | all | payload head has `<rss`, `<feed` or `<rdf:RDF` |
//! | `wordpress` | [`platform`] | 50 | all | generator meta says WordPress |
//! | `ghost` | [`platform`] | 50 | all | generator meta says Ghost |
//! | `general` | [`general`] | -100 | all | always |
//!
//! # Outcomes
//!
//! [`ExtractionStrategy::extract`] distinguishes three results:
//!
//! - `Ok(Outcome::NotApplicable)`: the document is not for this strategy
//! - `Ok(Outcome::Extracted(..))`: articles plus per-element [`PartialFailure`]s
//!   for candidates that were skipped
//! - `Err(StrategyError)`: the strategy itself broke on this document; only its
//!   own contribution is lost

pub mod dom;
pub mod feed;
pub mod general;
pub mod hacker_news;
pub mod platform;
pub mod sites;

use crate::dates::DateNormalizer;
use crate::error::{PartialFailure, StrategyError};
use crate::models::{ExtractedArticle, StrategyDescriptor};
use once_cell::unsync::OnceCell;
use scraper::Html;
use std::sync::Arc;
use url::Url;

/// One document as seen by the strategies.
///
/// The markup is parsed into a DOM at most once, on first use, and shared by
/// every strategy that runs against the page. Feed parsing works on the raw
/// text and never triggers the DOM parse.
pub struct Page<'a> {
    markup: &'a str,
    base_url: &'a Url,
    dates: &'a DateNormalizer,
    html: OnceCell<Html>,
}

impl<'a> Page<'a> {
    pub fn new(markup: &'a str, base_url: &'a Url, dates: &'a DateNormalizer) -> Self {
        Self {
            markup,
            base_url,
            dates,
            html: OnceCell::new(),
        }
    }

    pub fn markup(&self) -> &'a str {
        self.markup
    }

    pub fn base_url(&self) -> &'a Url {
        self.base_url
    }

    pub fn dates(&self) -> &'a DateNormalizer {
        self.dates
    }

    /// Parsed DOM, built on first call.
    pub fn html(&self) -> &Html {
        self.html.get_or_init(|| Html::parse_document(self.markup))
    }
}

/// Articles found by one strategy plus the candidates it had to skip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub articles: Vec<ExtractedArticle>,
    pub partial_failures: Vec<PartialFailure>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    /// Record one candidate's result.
    pub fn push(&mut self, candidate: Result<ExtractedArticle, PartialFailure>) {
        match candidate {
            Ok(article) => self.articles.push(article),
            Err(failure) => self.partial_failures.push(failure),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    NotApplicable,
    Extracted(Extraction),
}

impl Outcome {
    pub fn into_extraction(self) -> Extraction {
        match self {
            Outcome::NotApplicable => Extraction::default(),
            Outcome::Extracted(extraction) => extraction,
        }
    }
}

/// An algorithm that converts one document into articles.
///
/// Implementations hold no mutable state; the same instance is shared by
/// every source and every run.
pub trait ExtractionStrategy: Send + Sync {
    fn id(&self) -> &str;

    /// Higher runs first. Defaults to 0.
    fn priority(&self) -> i32 {
        0
    }

    /// Host patterns this strategy is meant for; empty means every host.
    fn domains(&self) -> &[String] {
        &[]
    }

    fn extract(&self, page: &Page<'_>) -> Result<Outcome, StrategyError>;

    fn descriptor(&self) -> StrategyDescriptor {
        StrategyDescriptor {
            id: self.id().to_string(),
            priority: self.priority(),
            domains: self.domains().to_vec(),
        }
    }

    fn matches_host(&self, host: &str) -> bool {
        let domains = self.domains();
        domains.is_empty() || domains.iter().any(|pattern| domain_matches(pattern, host))
    }
}

/// Match a host against a domain pattern.
///
/// A plain pattern must equal the host (ASCII case-insensitive). A `*.`
/// pattern matches its suffix host itself and any host ending in `.suffix`,
/// so `*.example.com` matches `a.example.com` and `example.com` but not
/// `notexample.com`.
pub fn domain_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.trim().trim_end_matches('.').to_ascii_lowercase();
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    if pattern.is_empty() || host.is_empty() {
        return false;
    }

    match pattern.strip_prefix("*.") {
        Some(suffix) => {
            host == suffix
                || host
                    .strip_suffix(suffix)
                    .is_some_and(|head| head.ends_with('.'))
        }
        None => host == pattern,
    }
}

/// Every built-in strategy, in registration order.
pub fn builtin_strategies() -> Vec<Arc<dyn ExtractionStrategy>> {
    let mut strategies: Vec<Arc<dyn ExtractionStrategy>> = sites::builtin_profiles()
        .into_iter()
        .map(|profile| Arc::new(sites::SiteStrategy::new(profile)) as Arc<dyn ExtractionStrategy>)
        .collect();
    strategies.push(Arc::new(hacker_news::HackerNewsStrategy::new()));
    strategies.push(Arc::new(feed::FeedStrategy::new()));
    strategies.push(Arc::new(platform::PlatformStrategy::wordpress()));
    strategies.push(Arc::new(platform::PlatformStrategy::ghost()));
    strategies.push(Arc::new(general::GeneralStrategy::new()));
    strategies
}

//! Strategy registry and selector.
//!
//! The registry owns:
//!
//! - the global strategy list, sorted by descending priority (ties keep
//!   registration order),
//! - per-source override lists, used verbatim when present,
//! - a per-host resolution cache,
//! - the [`DateNormalizer`] handed to every page.
//!
//! # Resolution
//!
//! For a source URL: override → host cache → global strategies whose domain
//! patterns match the host. If no strategy matches, the whole global list is
//! used. The result is cached per host; registering a strategy drops the
//! whole cache because patterns may now match differently.
//!
//! # Execution
//!
//! Every resolved strategy runs against the same [`Page`], in order. A
//! strategy that finds nothing never stops the next one; a strategy error is
//! recorded and the rest still run. Articles are merged and deduplicated by
//! URL, first occurrence winning.

use crate::dates::DateNormalizer;
use crate::error::StrategyFailure;
use crate::models::{ExtractedArticle, RawDocument, StrategyDescriptor};
use crate::strategies::{ExtractionStrategy, Page, builtin_strategies};
use itertools::Itertools;
use parking_lot::RwLock;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use url::Url;

type StrategyList = Vec<Arc<dyn ExtractionStrategy>>;

/// What one registry execution produced for one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionReport {
    /// Deduplicated by URL, in extraction order.
    pub articles: Vec<ExtractedArticle>,
    /// Ids of the strategies that ran, in order.
    pub strategies_run: Vec<String>,
    pub failures: Vec<StrategyFailure>,
    /// Candidate elements skipped across all strategies.
    pub partial_failures: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStatus {
    /// At least one article.
    Found,
    /// No articles and no strategy failed.
    Empty,
    /// No articles and at least one strategy failed.
    Exhausted,
}

impl ExtractionReport {
    pub fn status(&self) -> ReportStatus {
        if !self.articles.is_empty() {
            ReportStatus::Found
        } else if self.failures.is_empty() {
            ReportStatus::Empty
        } else {
            ReportStatus::Exhausted
        }
    }
}

pub struct StrategyRegistry {
    dates: DateNormalizer,
    strategies: RwLock<StrategyList>,
    overrides: RwLock<HashMap<String, StrategyList>>,
    host_cache: RwLock<HashMap<String, StrategyList>>,
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.descriptors())
            .field("overrides", &self.overrides.read().keys().collect::<Vec<_>>())
            .field("cached_hosts", &self.host_cache.read().len())
            .finish()
    }
}

impl StrategyRegistry {
    /// An empty registry.
    pub fn new(dates: DateNormalizer) -> Self {
        Self {
            dates,
            strategies: RwLock::new(Vec::new()),
            overrides: RwLock::new(HashMap::new()),
            host_cache: RwLock::new(HashMap::new()),
        }
    }

    /// A registry holding every built-in strategy.
    pub fn with_builtins(dates: DateNormalizer) -> Self {
        let registry = Self::new(dates);
        for strategy in builtin_strategies() {
            registry.register(strategy);
        }
        registry
    }

    pub fn dates(&self) -> &DateNormalizer {
        &self.dates
    }

    /// Add a global strategy, re-sort, and drop the host cache.
    ///
    /// Lock order is `strategies` then `host_cache`, here and in
    /// [`resolve`](Self::resolve), so no resolution computed from the old list
    /// can be cached after the clear.
    pub fn register(&self, strategy: Arc<dyn ExtractionStrategy>) {
        let id = strategy.id().to_string();
        let mut strategies = self.strategies.write();
        strategies.push(strategy);
        strategies.sort_by_key(|s| Reverse(s.priority()));
        self.host_cache.write().clear();
        drop(strategies);
        debug!(strategy = %id, "Registered strategy; host cache cleared");
    }

    /// Use exactly `strategies`, in the given order, for `source_id`.
    pub fn set_override(&self, source_id: impl Into<String>, strategies: Vec<Arc<dyn ExtractionStrategy>>) {
        self.overrides.write().insert(source_id.into(), strategies);
    }

    pub fn clear_override(&self, source_id: &str) {
        self.overrides.write().remove(source_id);
    }

    /// A registered global strategy by id.
    pub fn strategy(&self, id: &str) -> Option<Arc<dyn ExtractionStrategy>> {
        self.strategies
            .read()
            .iter()
            .find(|s| s.id() == id)
            .cloned()
    }

    /// Global strategies in execution order.
    pub fn descriptors(&self) -> Vec<StrategyDescriptor> {
        self.strategies.read().iter().map(|s| s.descriptor()).collect()
    }

    /// Descriptors of the strategies that would run for `url`.
    pub fn applicable(&self, source_id: Option<&str>, url: &Url) -> Vec<StrategyDescriptor> {
        self.resolve(source_id, url)
            .iter()
            .map(|s| s.descriptor())
            .collect()
    }

    /// Strategies to run for `url`, in order.
    ///
    /// # Arguments
    ///
    /// * `source_id` - Source whose override, if any, replaces host resolution
    /// * `url` - Page URL; its host selects and caches the domain-specific list
    ///
    /// # Returns
    ///
    /// The override list verbatim, otherwise the global strategies whose
    /// domains match the host (all global strategies when none match), in
    /// descending priority.
    pub fn resolve(&self, source_id: Option<&str>, url: &Url) -> StrategyList {
        if let Some(list) = source_id.and_then(|id| self.overrides.read().get(id).cloned()) {
            return list;
        }

        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        if let Some(list) = self.host_cache.read().get(&host) {
            return list.clone();
        }

        let global = self.strategies.read();
        let matching: StrategyList = global
            .iter()
            .filter(|s| s.matches_host(&host))
            .cloned()
            .collect();
        let resolved = if matching.is_empty() { global.clone() } else { matching };

        debug!(%host, count = resolved.len(), "Resolved strategies for host");
        self.host_cache.write().insert(host, resolved.clone());
        drop(global);
        resolved
    }

    /// Run every resolved strategy against `document` and merge the results.
    #[instrument(level = "info", skip_all, fields(url = %document.url, source_id = source_id.unwrap_or("-")))]
    pub fn extract(&self, source_id: Option<&str>, document: &RawDocument) -> ExtractionReport {
        let strategies = self.resolve(source_id, &document.url);
        let page = Page::new(&document.markup, &document.url, &self.dates);
        let mut report = ExtractionReport::default();
        let mut merged = Vec::new();

        for strategy in &strategies {
            report.strategies_run.push(strategy.id().to_string());
            match strategy.extract(&page) {
                Ok(outcome) => {
                    let extraction = outcome.into_extraction();
                    debug!(
                        strategy = strategy.id(),
                        count = extraction.articles.len(),
                        skipped = extraction.partial_failures.len(),
                        "Strategy finished"
                    );
                    report.partial_failures += extraction.partial_failures.len();
                    merged.extend(extraction.articles);
                }
                Err(e) => {
                    warn!(strategy = strategy.id(), error = %e, "Strategy failed");
                    report.failures.push(StrategyFailure {
                        strategy: strategy.id().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let total = merged.len();
        report.articles = merged.into_iter().unique_by(|a| a.url.clone()).collect();
        debug!(
            count = report.articles.len(),
            duplicates = total - report.articles.len(),
            failures = report.failures.len(),
            "Merged strategy results"
        );
        report
    }
}

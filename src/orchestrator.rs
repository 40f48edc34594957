//! Ingestion orchestrator.
//!
//! [`Ingestor`] drives one run over a list of sources:
//!
//! 1. **Resolve**: turn the source's URL string into an absolute URL
//!    (failure is structural and scoped to that source)
//! 2. **Fetch**: retrieve and decode the markup through [`FetchMarkup`]
//! 3. **Extract**: run the registry's strategies over the document
//! 4. **Canonicalize**: map articles to [`CanonicalItem`]s, falling back to
//!    the run's "now" for unknown publish times
//!
//! Sources are processed concurrently with `buffer_unordered`; results are
//! put back in input order before the global URL dedup and the stable
//! newest-first sort, so output never depends on completion order.
//!
//! The ingest entry points never fail. Every per-source error lands in the
//! [`RunSummary`]. Only [`Ingestor::refresh_source`] surfaces a
//! [`SourceError`] directly.

use crate::error::SourceError;
use crate::fetcher::FetchMarkup;
use crate::models::{
    CanonicalItem, IngestReport, RawDocument, RunSummary, Source, SourceFailure, SourceGroup,
};
use crate::registry::{ReportStatus, StrategyRegistry};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::sync::Arc;
use std::time::Instant as StdInstant;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, instrument, warn};

pub struct Ingestor<F> {
    fetcher: F,
    registry: Arc<StrategyRegistry>,
    max_concurrency: usize,
}

impl<F: FetchMarkup> Ingestor<F> {
    /// Concurrency defaults to the fetcher's own limit.
    pub fn new(fetcher: F, registry: Arc<StrategyRegistry>) -> Self {
        let max_concurrency = fetcher.max_concurrency().max(1);
        Self {
            fetcher,
            registry,
            max_concurrency,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn registry(&self) -> &Arc<StrategyRegistry> {
        &self.registry
    }

    /// Fetch, extract and merge every source concurrently.
    ///
    /// # Arguments
    ///
    /// * `sources` - Sources to ingest; failures are isolated per source
    ///
    /// # Returns
    ///
    /// An [`IngestReport`] with items deduplicated by URL and sorted newest
    /// first, plus a [`RunSummary`] counting successes and failures in
    /// source order.
    pub async fn ingest(&self, sources: &[Source]) -> IngestReport {
        self.run(sources, None).await
    }

    /// Flatten groups in order, then ingest.
    pub async fn ingest_groups(&self, groups: &[SourceGroup]) -> IngestReport {
        let sources: Vec<Source> = groups
            .iter()
            .flat_map(|g| g.sources.iter().cloned())
            .collect();
        self.run(&sources, None).await
    }

    /// Like [`ingest`](Self::ingest), but any source still in progress at
    /// `deadline` fails with [`SourceError::DeadlineExceeded`].
    ///
    /// # Arguments
    ///
    /// * `sources` - Sources to ingest
    /// * `deadline` - Instant after which unfinished sources are abandoned
    ///
    /// # Returns
    ///
    /// The report for every source that finished in time; the rest appear as
    /// failures.
    pub async fn ingest_until(&self, sources: &[Source], deadline: Instant) -> IngestReport {
        self.run(sources, Some(deadline)).await
    }

    /// Ingest one source and surface its error.
    ///
    /// # Arguments
    ///
    /// * `source` - The source to fetch and extract
    ///
    /// # Returns
    ///
    /// The source's items deduplicated by URL, or the [`SourceError`] that
    /// [`ingest`](Self::ingest) would have recorded for it.
    #[instrument(level = "info", skip_all, fields(source_id = %source.id))]
    pub async fn refresh_source(&self, source: &Source) -> Result<Vec<CanonicalItem>, SourceError> {
        let now = self.registry.dates().clock().now();
        let items = self.process(source, now).await?;
        Ok(items.into_iter().unique_by(|i| i.url.clone()).collect())
    }

    #[instrument(level = "info", skip_all, fields(sources = sources.len()))]
    async fn run(&self, sources: &[Source], deadline: Option<Instant>) -> IngestReport {
        let t0 = StdInstant::now();
        let now = self.registry.dates().clock().now();

        let mut outcomes: Vec<(usize, Result<Vec<CanonicalItem>, SourceError>)> =
            stream::iter(sources.iter().enumerate())
                .map(|(index, source)| async move {
                    let work = self.process(source, now);
                    let result = match deadline {
                        Some(at) => timeout_at(at, work)
                            .await
                            .unwrap_or(Err(SourceError::DeadlineExceeded)),
                        None => work.await,
                    };
                    (index, result)
                })
                .buffer_unordered(self.max_concurrency)
                .collect()
                .await;
        outcomes.sort_by_key(|(index, _)| *index);

        let mut summary = RunSummary::default();
        let mut items = Vec::new();
        for (index, result) in outcomes {
            let source = &sources[index];
            match result {
                Ok(found) => {
                    summary.succeeded += 1;
                    items.extend(found);
                }
                Err(error) => {
                    warn!(
                        source_id = %source.id,
                        kind = error.kind(),
                        error = %error,
                        "Source failed"
                    );
                    summary.failed += 1;
                    summary.failures.push(SourceFailure {
                        source_id: source.id.clone(),
                        label: source.label.clone(),
                        error,
                    });
                }
            }
        }

        let mut items: Vec<CanonicalItem> = items.into_iter().unique_by(|i| i.url.clone()).collect();
        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        summary.total_items = items.len();

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            count = summary.total_items,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Ingestion run complete"
        );
        IngestReport { items, summary }
    }

    /// One source's unit of work.
    async fn process(&self, source: &Source, now: DateTime<Utc>) -> Result<Vec<CanonicalItem>, SourceError> {
        let url = source.resolve_url()?;
        let markup = self.fetcher.fetch(&url).await?;
        let document = RawDocument { url, markup };

        let report = self.registry.extract(Some(&source.id), &document);
        debug!(
            source_id = %source.id,
            count = report.articles.len(),
            strategies = ?report.strategies_run,
            partial_failures = report.partial_failures,
            "Extracted source"
        );

        match report.status() {
            ReportStatus::Found => Ok(report
                .articles
                .into_iter()
                .map(|article| CanonicalItem::from_article(article, source, now))
                .collect()),
            ReportStatus::Empty => Err(SourceError::NoArticles),
            ReportStatus::Exhausted => Err(SourceError::Exhausted {
                failures: report.failures,
            }),
        }
    }
}

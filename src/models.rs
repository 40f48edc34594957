//! Data models for sources, extracted articles and their canonical output form.
//!
//! This module defines the core data structures used throughout the crate:
//! - [`Source`] / [`SourceGroup`]: what the caller asks us to monitor
//! - [`RawDocument`]: decoded markup for one fetch, consumed once by the registry
//! - [`ExtractedArticle`]: one article as produced by one strategy
//! - [`CanonicalItem`]: the deduplicated, time-ordered output record
//! - [`StrategyDescriptor`]: strategy metadata used for selection and introspection
//! - [`Digest`]: the JSON document written by the CLI for one run

use crate::error::SourceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Title used when a strategy finds an article without any usable title text.
pub const UNTITLED: &str = "Untitled";

/// Maximum number of characters kept in an article summary.
pub const SUMMARY_MAX_CHARS: usize = 300;

/// A configured page the system monitors for articles.
///
/// Sources are immutable once dispatched into a fetch cycle; the orchestrator
/// only ever borrows them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Opaque identifier, used for per-source strategy overrides.
    pub id: String,
    /// Display label copied onto every item from this source.
    pub label: String,
    /// URL string as entered by the user.
    pub url: String,
}

impl Source {
    pub fn new(id: impl Into<String>, label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            url: url.into(),
        }
    }

    /// Resolve the source's URL string into an absolute HTTP(S) URL.
    ///
    /// A string with no scheme at all (`example.com/news`) is retried once with
    /// `https://` in front. Anything else that fails to parse, uses a
    /// non-HTTP scheme or lacks a host is a structural failure for this source.
    pub fn resolve_url(&self) -> Result<Url, SourceError> {
        let raw = self.url.trim();
        let invalid = |reason: String| SourceError::InvalidUrl {
            url: self.url.clone(),
            reason,
        };

        if raw.is_empty() {
            return Err(invalid("empty URL".to_string()));
        }

        let parsed = match Url::parse(raw) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Url::parse(&format!("https://{raw}")).map_err(|e| invalid(e.to_string()))?
            }
            Err(e) => return Err(invalid(e.to_string())),
        };

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme `{}`", parsed.scheme())));
        }
        match parsed.host_str() {
            Some(host) if !host.is_empty() => Ok(parsed),
            _ => Err(invalid("missing host".to_string())),
        }
    }
}

/// A labelled, ordered list of sources, flattened in order before ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceGroup {
    pub label: String,
    #[serde(default)]
    pub sources: Vec<Source>,
}

/// Decoded markup for one fetch of one source.
#[derive(Debug)]
pub struct RawDocument {
    pub url: Url,
    pub markup: String,
}

/// One article as produced by exactly one strategy invocation.
///
/// Construction goes through [`ExtractedArticle::new`] and the `with_*`
/// builders so the title and summary invariants always hold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedArticle {
    pub title: String,
    pub url: Url,
    pub published_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub image_url: Option<Url>,
    pub tags: Vec<String>,
}

impl ExtractedArticle {
    /// Create an article; a blank title becomes [`UNTITLED`].
    pub fn new(title: impl AsRef<str>, url: Url) -> Self {
        let title = collapse_whitespace(title.as_ref());
        Self {
            title: if title.is_empty() {
                UNTITLED.to_string()
            } else {
                title
            },
            url,
            published_at: None,
            summary: None,
            author: None,
            image_url: None,
            tags: Vec::new(),
        }
    }

    pub fn with_published_at(mut self, published_at: Option<DateTime<Utc>>) -> Self {
        self.published_at = published_at;
        self
    }

    /// Attach a summary, collapsing whitespace and capping it at
    /// [`SUMMARY_MAX_CHARS`] characters. Empty summaries are dropped.
    pub fn with_summary(mut self, summary: Option<String>) -> Self {
        self.summary = summary
            .map(|s| truncate_chars(&collapse_whitespace(&s), SUMMARY_MAX_CHARS))
            .filter(|s| !s.is_empty());
        self
    }

    pub fn with_author(mut self, author: Option<String>) -> Self {
        self.author = author
            .map(|a| collapse_whitespace(&a))
            .filter(|a| !a.is_empty());
        self
    }

    pub fn with_image(mut self, image_url: Option<Url>) -> Self {
        self.image_url = image_url;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags
            .into_iter()
            .map(|t| collapse_whitespace(&t))
            .filter(|t| !t.is_empty())
            .collect();
        self
    }
}

/// The final, deduplicated, time-ordered article record returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalItem {
    /// UUIDv5 of the article URL, stable across runs.
    pub id: Uuid,
    pub title: String,
    pub url: String,
    /// Publish time, or the run's "now" when no date could be resolved.
    pub published_at: DateTime<Utc>,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub image_url: Option<String>,
    pub source_label: String,
    pub source_url: String,
    pub tags: Vec<String>,
}

impl CanonicalItem {
    pub fn from_article(article: ExtractedArticle, source: &Source, now: DateTime<Utc>) -> Self {
        let url = article.url.to_string();
        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_URL, url.as_bytes()),
            title: article.title,
            url,
            published_at: article.published_at.unwrap_or(now),
            summary: article.summary,
            author: article.author,
            image_url: article.image_url.map(|u| u.to_string()),
            source_label: source.label.clone(),
            source_url: source.url.clone(),
            tags: article.tags,
        }
    }
}

/// Strategy metadata used for selection, ordering and introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyDescriptor {
    pub id: String,
    /// Higher runs first.
    pub priority: i32,
    /// Host patterns; empty matches every host.
    pub domains: Vec<String>,
}

/// Counts and reasons for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub total_items: usize,
    pub failures: Vec<SourceFailure>,
}

/// A source that contributed nothing, with the reason why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceFailure {
    pub source_id: String,
    pub label: String,
    pub error: SourceError,
}

/// Items plus the summary of the run that produced them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub items: Vec<CanonicalItem>,
    pub summary: RunSummary,
}

/// One run's output as written by the CLI.
///
/// # Edition Naming
///
/// The `time_of_day` field categorizes runs as:
/// - `"morning"`: 00:00 - 08:00
/// - `"afternoon"`: 08:00 - 16:00
/// - `"evening"`: 16:00 - 24:00
#[derive(Debug, Serialize)]
pub struct Digest {
    /// The local date of the run in `YYYY-MM-DD` format.
    pub local_date: String,
    /// "morning", "afternoon", or "evening".
    pub time_of_day: String,
    pub generated_at: DateTime<Utc>,
    pub summary: RunSummary,
    pub items: Vec<CanonicalItem>,
}

/// Collapse every run of whitespace into a single space and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep at most `max` characters (not bytes) of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_blank_title_defaults_to_untitled() {
        let article = ExtractedArticle::new("   \n ", url("https://example.com/a"));
        assert_eq!(article.title, UNTITLED);

        let article = ExtractedArticle::new("  Hello\n  World ", url("https://example.com/a"));
        assert_eq!(article.title, "Hello World");
    }

    #[test]
    fn test_summary_is_capped_at_300_chars() {
        let long = "é".repeat(500);
        let article =
            ExtractedArticle::new("t", url("https://example.com/a")).with_summary(Some(long));
        assert_eq!(article.summary.unwrap().chars().count(), SUMMARY_MAX_CHARS);

        let article = ExtractedArticle::new("t", url("https://example.com/a"))
            .with_summary(Some("   ".to_string()));
        assert!(article.summary.is_none());
    }

    #[test]
    fn test_tags_keep_order_and_duplicates() {
        let article = ExtractedArticle::new("t", url("https://example.com/a")).with_tags(vec![
            "rust".to_string(),
            " ".to_string(),
            "news".to_string(),
            "rust".to_string(),
        ]);
        assert_eq!(article.tags, vec!["rust", "news", "rust"]);
    }

    #[test]
    fn test_canonical_item_falls_back_to_now() {
        let now = Utc.with_ymd_and_hms(2025, 5, 6, 12, 0, 0).unwrap();
        let source = Source::new("s1", "Example", "https://example.com");
        let article = ExtractedArticle::new("Title", url("https://example.com/a"));
        let item = CanonicalItem::from_article(article, &source, now);

        assert_eq!(item.published_at, now);
        assert_eq!(item.url, "https://example.com/a");
        assert_eq!(item.source_label, "Example");
        assert_eq!(
            item.id,
            Uuid::new_v5(&Uuid::NAMESPACE_URL, b"https://example.com/a")
        );
    }

    #[test]
    fn test_resolve_url_accepts_schemeless_host() {
        let source = Source::new("s", "S", "example.com/news");
        assert_eq!(
            source.resolve_url().unwrap().as_str(),
            "https://example.com/news"
        );
    }

    #[test]
    fn test_resolve_url_rejects_malformed() {
        for bad in ["", "   ", "ftp://example.com/x", "http://", "https://exa mple.com"] {
            let source = Source::new("s", "S", bad);
            let err = source.resolve_url().unwrap_err();
            assert_eq!(err.kind(), "invalid_url", "expected failure for {bad:?}");
        }
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
        assert_eq!(truncate_chars("short", 10), "short");
    }
}

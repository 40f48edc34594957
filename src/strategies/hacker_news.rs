//! Hacker News front page and listing pages.
//!
//! Each story is a `tr.athing` row holding the title link; the row right
//! after it holds the subtext: score, `.hnuser` and a `.age` span whose
//! `title` attribute is an ISO stamp followed by the Unix epoch
//! (`2025-05-06T12:00:00 1746532800`).

use crate::error::{PartialFailure, StrategyError};
use crate::models::ExtractedArticle;
use crate::strategies::dom::{attr, resolve_link, text_of};
use crate::strategies::{Extraction, ExtractionStrategy, Outcome, Page};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};
use tracing::debug;

static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr.athing").expect("row selector"));
static TITLE_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".titleline > a").expect("title selector"));
static SITE: Lazy<Selector> = Lazy::new(|| Selector::parse(".sitestr").expect("site selector"));
static AGE: Lazy<Selector> = Lazy::new(|| Selector::parse(".age[title]").expect("age selector"));
static USER: Lazy<Selector> = Lazy::new(|| Selector::parse(".hnuser").expect("user selector"));

#[derive(Debug, Clone)]
pub struct HackerNewsStrategy {
    domains: Vec<String>,
}

impl HackerNewsStrategy {
    pub fn new() -> Self {
        Self {
            domains: vec!["news.ycombinator.com".to_string()],
        }
    }
}

impl Default for HackerNewsStrategy {
    fn default() -> Self {
        Self::new()
    }
}

/// The `tr` immediately following `row`, skipping text nodes.
fn subtext_row<'a>(row: ElementRef<'a>) -> Option<ElementRef<'a>> {
    row.next_siblings()
        .filter_map(ElementRef::wrap)
        .next()
        .filter(|el| el.value().name() == "tr")
}

impl ExtractionStrategy for HackerNewsStrategy {
    fn id(&self) -> &str {
        "hacker-news"
    }

    fn priority(&self) -> i32 {
        100
    }

    fn domains(&self) -> &[String] {
        &self.domains
    }

    fn extract(&self, page: &Page<'_>) -> Result<Outcome, StrategyError> {
        let mut extraction = Extraction::default();

        for (index, row) in page.html().select(&ROW).enumerate() {
            let Some(link) = row.select(&TITLE_LINK).next() else {
                extraction.push(Err(PartialFailure::new(format!("row {index}: no title link"))));
                continue;
            };
            let Some(url) = attr(link, "href").and_then(|href| resolve_link(page.base_url(), href))
            else {
                extraction.push(Err(PartialFailure::new(format!(
                    "row {index}: title link does not resolve"
                ))));
                continue;
            };
            let title = text_of(link);
            if title.is_empty() {
                extraction.push(Err(PartialFailure::new(format!("row {index}: empty title"))));
                continue;
            }

            let subtext = subtext_row(row);
            let published_at = subtext
                .and_then(|sub| sub.select(&AGE).next())
                .and_then(|age| attr(age, "title"))
                .and_then(|stamp| stamp.split_whitespace().next())
                .and_then(|iso| page.dates().parse(iso));
            let author = subtext
                .and_then(|sub| sub.select(&USER).next())
                .map(text_of);
            let tags = row
                .select(&SITE)
                .map(text_of)
                .filter(|site| !site.is_empty())
                .collect();

            extraction.push(Ok(ExtractedArticle::new(title, url)
                .with_published_at(published_at)
                .with_author(author)
                .with_tags(tags)));
        }

        debug!(
            count = extraction.articles.len(),
            skipped = extraction.partial_failures.len(),
            "Hacker News extraction"
        );
        Ok(Outcome::Extracted(extraction))
    }
}

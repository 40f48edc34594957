//! General-purpose fallback for pages no other strategy understands.
//!
//! Three stages, tried in order; the first one that yields at least one
//! article wins:
//!
//! 1. `article` containers
//! 2. common list/card containers: [`ALTERNATIVE_CONTAINERS`], one selector
//!    at a time
//! 3. a link scan over the whole document
//!
//! Containers whose `class` contains navigation or page-furniture vocabulary
//! ([`FURNITURE`]), or whose text is shorter than [`MIN_CONTAINER_CHARS`], are
//! skipped before any field is looked at.
//!
//! The link scan only accepts links whose text is at least
//! [`MIN_LINK_TEXT_CHARS`] characters long and whose path neither looks like
//! a listing page (pagination, tag, category, author, archive) nor ends in
//! `/`. This misses one-word titles and root-level article URLs; that is the
//! accepted precision/recall tradeoff.

use crate::dates::DateNormalizer;
use crate::error::{PartialFailure, StrategyError};
use crate::models::ExtractedArticle;
use crate::strategies::dom::{attr, first_date, image_of, resolve_link, strip_byline, text_of};
use crate::strategies::{Extraction, ExtractionStrategy, Outcome, Page};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};
use tracing::debug;
use url::Url;

pub const PRIMARY_CONTAINER: &str = "article";

pub const ALTERNATIVE_CONTAINERS: &[&str] = &[
    ".post",
    ".entry",
    ".article",
    ".news-item",
    ".story",
    ".card",
    ".item",
    "li.post",
    ".list-item",
    ".feed-item",
];

/// Class-name fragments that mark navigation and page furniture.
pub const FURNITURE: &[&str] = &[
    "nav",
    "menu",
    "footer",
    "sidebar",
    "widget",
    "breadcrumb",
    "pagination",
    "pager",
    "comment",
    "share",
    "social",
    "advert",
    "sponsor",
    "promo",
    "newsletter",
    "cookie",
];

pub const MIN_CONTAINER_CHARS: usize = 30;
pub const MIN_LINK_TEXT_CHARS: usize = 10;
pub const MIN_SUMMARY_CHARS: usize = 20;
pub const MAX_AUTHOR_CHARS: usize = 80;

const TITLE_SELECTORS: &[&str] = &[
    "h1",
    "h2",
    "h3",
    "h4",
    ".title",
    ".headline",
    ".entry-title",
    ".post-title",
    "[class*=title]",
    "[class*=headline]",
];

const LINK_SELECTORS: &[&str] = &[
    "h1 a[href]",
    "h2 a[href]",
    "h3 a[href]",
    "h4 a[href]",
    ".title a[href]",
    ".headline a[href]",
    "a[rel=bookmark]",
    "a[href]",
];

const DATE_SELECTORS: &[&str] = &[
    "time[datetime]",
    "time",
    "[datetime]",
    "meta[itemprop=datePublished]",
    ".date",
    ".time",
    ".published",
    ".pubdate",
    ".post-date",
    ".entry-date",
    ".timestamp",
    "[class*=date]",
    "[class*=time]",
];

const SUMMARY_SELECTORS: &[&str] = &[
    ".summary",
    ".excerpt",
    ".description",
    ".dek",
    ".entry-summary",
    ".teaser",
    ".intro",
    "p",
];

const AUTHOR_SELECTORS: &[&str] = &[
    "[rel=author]",
    "[itemprop=author]",
    ".author",
    ".byline",
    ".by",
    "[class*=author]",
];

const IMAGE_SELECTORS: &[&str] = &["img[src]", "img[data-src]", "img[srcset]"];

const TAG_SELECTORS: &[&str] = &["a[rel~=tag]", ".tags a", ".tag", ".categories a", ".category"];

/// Paths that look like listing pages rather than articles.
static LISTING_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)/(?:page|tag|tags|category|categories|author|authors|archive|archives)(?:/|$)")
        .expect("listing path pattern compiles")
});
static PAGE_QUERY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|&)(?:page|paged|p)=\d+").expect("page query pattern compiles"));

struct Compiled {
    primary: Selector,
    alternatives: Vec<Selector>,
    title: Vec<Selector>,
    link: Vec<Selector>,
    date: Vec<Selector>,
    summary: Vec<Selector>,
    author: Vec<Selector>,
    image: Vec<Selector>,
    tags: Vec<Selector>,
    any_link: Selector,
}

static COMPILED: Lazy<Compiled> = Lazy::new(|| {
    let all = |list: &[&str]| -> Vec<Selector> {
        list.iter()
            .map(|css| Selector::parse(css).expect("built-in selector"))
            .collect()
    };
    Compiled {
        primary: Selector::parse(PRIMARY_CONTAINER).expect("primary container selector"),
        alternatives: all(ALTERNATIVE_CONTAINERS),
        title: all(TITLE_SELECTORS),
        link: all(LINK_SELECTORS),
        date: all(DATE_SELECTORS),
        summary: all(SUMMARY_SELECTORS),
        author: all(AUTHOR_SELECTORS),
        image: all(IMAGE_SELECTORS),
        tags: all(TAG_SELECTORS),
        any_link: Selector::parse("a[href]").expect("link selector"),
    }
});

/// `true` when a class attribute carries navigation/furniture vocabulary.
fn is_furniture(class: Option<&str>) -> bool {
    class.is_some_and(|class| {
        let class = class.to_ascii_lowercase();
        FURNITURE.iter().any(|word| class.contains(word))
    })
}

/// `true` for URLs that point at listing pages (pagination, tag, category,
/// author, archive).
pub fn is_listing_url(url: &Url) -> bool {
    LISTING_PATH.is_match(url.path()) || url.query().is_some_and(|q| PAGE_QUERY.is_match(q))
}

/// A link that navigates rather than leads to an article.
fn is_navigation_link(link: ElementRef<'_>, url: &Url) -> bool {
    is_furniture(link.value().attr("class"))
        || link
            .value()
            .attr("rel")
            .is_some_and(|rel| rel.split_whitespace().any(|r| matches!(r, "prev" | "next")))
        || is_listing_url(url)
}

fn first_text(scope: ElementRef<'_>, selectors: &[Selector], accept: impl Fn(&str) -> bool) -> Option<String> {
    selectors
        .iter()
        .flat_map(|sel| scope.select(sel))
        .map(text_of)
        .find(|text| !text.is_empty() && accept(text))
}

#[derive(Debug, Clone, Default)]
pub struct GeneralStrategy;

impl GeneralStrategy {
    pub fn new() -> Self {
        Self
    }

    /// The container's article link, trying the element itself first when it
    /// is a link, then [`LINK_SELECTORS`] in order.
    fn article_link<'a>(&self, container: ElementRef<'a>, base: &Url) -> Option<(ElementRef<'a>, Url)> {
        let own = (container.value().name() == "a").then_some(container);
        own.into_iter()
            .chain(COMPILED.link.iter().flat_map(|sel| container.select(sel)))
            .find_map(|link| {
                let url = attr(link, "href").and_then(|href| resolve_link(base, href))?;
                (!is_navigation_link(link, &url)).then_some((link, url))
            })
    }

    fn container_article(
        &self,
        index: usize,
        container: ElementRef<'_>,
        base: &Url,
        dates: &DateNormalizer,
    ) -> Result<ExtractedArticle, PartialFailure> {
        let (link, url) = self
            .article_link(container, base)
            .ok_or_else(|| PartialFailure::new(format!("container {index}: no article link")))?;

        let title = first_text(container, &COMPILED.title, |_| true)
            .unwrap_or_else(|| text_of(link));
        let published_at = first_date(container, &COMPILED.date, dates);
        let summary = first_text(container, &COMPILED.summary, |text| {
            text.chars().count() >= MIN_SUMMARY_CHARS && text != title
        });
        let author = COMPILED
            .author
            .iter()
            .flat_map(|sel| container.select(sel))
            .map(|el| strip_byline(&text_of(el)))
            .find(|name| !name.is_empty() && name.chars().count() <= MAX_AUTHOR_CHARS);
        let image_url = COMPILED
            .image
            .iter()
            .flat_map(|sel| container.select(sel))
            .find_map(|img| image_of(img, base));
        let tags = COMPILED
            .tags
            .iter()
            .map(|sel| container.select(sel).map(text_of).collect::<Vec<_>>())
            .find(|tags| !tags.is_empty())
            .unwrap_or_default();

        Ok(ExtractedArticle::new(title, url)
            .with_published_at(published_at)
            .with_summary(summary)
            .with_author(author)
            .with_image(image_url)
            .with_tags(tags))
    }

    fn containers(&self, page: &Page<'_>, selector: &Selector) -> Extraction {
        let mut extraction = Extraction::default();
        let candidates = page
            .html()
            .select(selector)
            .filter(|el| !is_furniture(el.value().attr("class")))
            .filter(|el| text_of(*el).chars().count() >= MIN_CONTAINER_CHARS);
        for (index, container) in candidates.enumerate() {
            extraction.push(self.container_article(index, container, page.base_url(), page.dates()));
        }
        extraction
    }

    fn link_scan(&self, page: &Page<'_>) -> Extraction {
        let mut extraction = Extraction::default();
        for link in page.html().select(&COMPILED.any_link) {
            let text = text_of(link);
            if text.chars().count() < MIN_LINK_TEXT_CHARS {
                continue;
            }
            let Some(url) = attr(link, "href").and_then(|href| resolve_link(page.base_url(), href)) else {
                continue;
            };
            if url.path().ends_with('/') || is_navigation_link(link, &url) {
                continue;
            }
            extraction.articles.push(ExtractedArticle::new(text, url));
        }
        extraction
    }
}

impl ExtractionStrategy for GeneralStrategy {
    fn id(&self) -> &str {
        "general"
    }

    fn priority(&self) -> i32 {
        -100
    }

    fn extract(&self, page: &Page<'_>) -> Result<Outcome, StrategyError> {
        let mut skipped = Vec::new();

        let stages = std::iter::once((PRIMARY_CONTAINER, &COMPILED.primary))
            .chain(ALTERNATIVE_CONTAINERS.iter().copied().zip(COMPILED.alternatives.iter()));
        for (css, selector) in stages {
            let extraction = self.containers(page, selector);
            if !extraction.is_empty() {
                debug!(
                    container = css,
                    count = extraction.articles.len(),
                    skipped = extraction.partial_failures.len() + skipped.len(),
                    "General extraction from containers"
                );
                return Ok(Outcome::Extracted(Extraction {
                    articles: extraction.articles,
                    partial_failures: [skipped, extraction.partial_failures].concat(),
                }));
            }
            skipped.extend(extraction.partial_failures);
        }

        let mut extraction = self.link_scan(page);
        debug!(count = extraction.articles.len(), "General extraction from link scan");
        skipped.append(&mut extraction.partial_failures);
        extraction.partial_failures = skipped;
        Ok(Outcome::Extracted(extraction))
    }
}

//! DOM helpers shared by the HTML strategies.
//!
//! [`CardSelectors`] describes one "card" layout (an item container plus
//! selectors for each field inside it) and knows how to turn a matching
//! element into an [`ExtractedArticle`]. Site profiles and platform themes are
//! both expressed as `CardSelectors`.

use crate::dates::DateNormalizer;
use crate::error::{PartialFailure, StrategyError};
use crate::models::{ExtractedArticle, collapse_whitespace};
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Selector};
use url::Url;

use super::{Extraction, Page};

/// Compile a CSS selector, mapping failure to [`StrategyError::InvalidSelector`].
pub fn compile(css: &str) -> Result<Selector, StrategyError> {
    Selector::parse(css).map_err(|_| StrategyError::InvalidSelector(css.to_string()))
}

fn compile_opt(css: Option<&str>) -> Result<Option<Selector>, StrategyError> {
    css.map(compile).transpose()
}

/// All descendant text of `el`, whitespace collapsed.
pub fn text_of(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

/// A trimmed, non-empty attribute value.
pub fn attr<'a>(el: ElementRef<'a>, name: &str) -> Option<&'a str> {
    el.value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// First descendant of `scope` matching any selector, tried in order.
pub fn first_match<'a>(scope: ElementRef<'a>, selectors: &[Selector]) -> Option<ElementRef<'a>> {
    selectors.iter().find_map(|sel| scope.select(sel).next())
}

/// First non-empty text among descendants matching `selectors`, tried in order.
pub fn first_text(scope: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors
        .iter()
        .flat_map(|sel| scope.select(sel))
        .map(text_of)
        .find(|t| !t.is_empty())
}

/// Resolve an `href`/`src` against `base` into an absolute HTTP(S) URL.
///
/// Fragment-only, `javascript:`, `mailto:`, `tel:` and `data:` references are
/// rejected. The fragment of the result is dropped.
pub fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

/// Publish time carried by an element: `datetime`, `title` and `content`
/// attributes first, then the element text.
pub fn date_of(el: ElementRef<'_>, dates: &DateNormalizer) -> Option<DateTime<Utc>> {
    ["datetime", "title", "content"]
        .iter()
        .filter_map(|name| attr(el, name))
        .find_map(|value| dates.parse(value))
        .or_else(|| {
            let text = text_of(el);
            (!text.is_empty()).then(|| dates.parse(&text)).flatten()
        })
}

/// First parseable date among descendants matching `selectors`, tried in order.
pub fn first_date(
    scope: ElementRef<'_>,
    selectors: &[Selector],
    dates: &DateNormalizer,
) -> Option<DateTime<Utc>> {
    selectors
        .iter()
        .flat_map(|sel| scope.select(sel))
        .find_map(|el| date_of(el, dates))
}

/// Image URL of an `<img>` (or an element holding one): `src`, then the lazy
/// loading attributes, then the first `srcset` candidate.
pub fn image_of(el: ElementRef<'_>, base: &Url) -> Option<Url> {
    ["src", "data-src", "data-lazy-src", "data-original", "content"]
        .iter()
        .filter_map(|name| attr(el, name))
        .chain(
            attr(el, "srcset")
                .and_then(|set| set.split(',').next())
                .and_then(|candidate| candidate.split_whitespace().next()),
        )
        .find_map(|src| resolve_link(base, src))
}

/// Declarative selectors for one card layout.
#[derive(Debug)]
pub struct CardSelectors {
    pub item: Selector,
    pub link: Vec<Selector>,
    pub title: Vec<Selector>,
    pub date: Vec<Selector>,
    pub summary: Vec<Selector>,
    pub author: Vec<Selector>,
    pub image: Vec<Selector>,
    pub tags: Vec<Selector>,
    /// Skip items without title or link text instead of emitting "Untitled".
    pub require_text: bool,
}

/// Raw CSS for a [`CardSelectors`]; each field is a comma-separated list
/// tried as one selector group.
#[derive(Debug, Clone, Copy, Default)]
pub struct CardLayout<'a> {
    pub item: &'a str,
    pub link: &'a str,
    pub title: Option<&'a str>,
    pub date: Option<&'a str>,
    pub summary: Option<&'a str>,
    pub author: Option<&'a str>,
    pub image: Option<&'a str>,
    pub tags: Option<&'a str>,
    pub require_text: bool,
}

impl CardSelectors {
    pub fn compile(layout: CardLayout<'_>) -> Result<Self, StrategyError> {
        let list = |css: Option<&str>| -> Result<Vec<Selector>, StrategyError> {
            Ok(compile_opt(css)?.into_iter().collect())
        };
        Ok(Self {
            item: compile(layout.item)?,
            link: vec![compile(layout.link)?],
            title: list(layout.title)?,
            date: list(layout.date)?,
            summary: list(layout.summary)?,
            author: list(layout.author)?,
            image: list(layout.image)?,
            tags: list(layout.tags)?,
            require_text: layout.require_text,
        })
    }

    /// Run the layout over the whole page.
    pub fn extract(&self, page: &Page<'_>) -> Extraction {
        let mut extraction = Extraction::default();
        for (index, item) in page.html().select(&self.item).enumerate() {
            extraction.push(self.card(index, item, page));
        }
        extraction
    }

    fn card(
        &self,
        index: usize,
        item: ElementRef<'_>,
        page: &Page<'_>,
    ) -> Result<ExtractedArticle, PartialFailure> {
        let base = page.base_url();

        // The item may itself be the link.
        let link_el = if item.value().name() == "a" && attr(item, "href").is_some() {
            Some(item)
        } else {
            first_match(item, &self.link)
        };
        let link_el =
            link_el.ok_or_else(|| PartialFailure::new(format!("item {index}: no link element")))?;
        let url = attr(link_el, "href")
            .and_then(|href| resolve_link(base, href))
            .ok_or_else(|| PartialFailure::new(format!("item {index}: link does not resolve")))?;

        let title = first_text(item, &self.title).unwrap_or_else(|| text_of(link_el));
        if self.require_text && title.is_empty() {
            return Err(PartialFailure::new(format!("item {index}: no text")));
        }

        let published_at = first_date(item, &self.date, page.dates());
        let summary = first_text(item, &self.summary).filter(|s| *s != title);
        let author = first_text(item, &self.author).map(|a| strip_byline(&a));
        let image_url = first_match(item, &self.image).and_then(|img| image_of(img, base));
        let tags = self
            .tags
            .iter()
            .flat_map(|sel| item.select(sel))
            .map(text_of)
            .collect();

        Ok(ExtractedArticle::new(title, url)
            .with_published_at(published_at)
            .with_summary(summary)
            .with_author(author)
            .with_image(image_url)
            .with_tags(tags))
    }
}

/// Strip a leading "By" / "Author:" / "作者:" marker from a byline.
pub fn strip_byline(text: &str) -> String {
    let trimmed = text.trim();
    for prefix in ["by:", "by ", "author:", "author ", "作者:", "作者：", "作者"] {
        if trimmed
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        {
            return trimmed[prefix.len()..].trim().to_string();
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn base() -> Url {
        Url::parse("https://example.com/news/").unwrap()
    }

    #[test]
    fn test_resolve_link_rules() {
        let base = base();
        assert_eq!(
            resolve_link(&base, "story-1").unwrap().as_str(),
            "https://example.com/news/story-1"
        );
        assert_eq!(
            resolve_link(&base, "/a#comments").unwrap().as_str(),
            "https://example.com/a"
        );
        assert!(resolve_link(&base, "#top").is_none());
        assert!(resolve_link(&base, "javascript:void(0)").is_none());
        assert!(resolve_link(&base, "mailto:x@example.com").is_none());
        assert!(resolve_link(&base, "ftp://example.com/file").is_none());
        assert!(resolve_link(&base, "  ").is_none());
    }

    #[test]
    fn test_date_prefers_attribute_over_text() {
        let html = Html::parse_fragment(
            r#"<time datetime="2024-01-15T10:30:00Z">3 days ago</time>"#,
        );
        let el = html.select(&compile("time").unwrap()).next().unwrap();
        let parsed = date_of(el, &DateNormalizer::new()).unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-01-15T10:30:00+00:00");
    }

    #[test]
    fn test_image_of_falls_back_to_lazy_attributes() {
        let html = Html::parse_fragment(
            r#"<img data-src="/img/a.jpg"><img srcset="/img/b.jpg 1x, /img/b2.jpg 2x">"#,
        );
        let sel = compile("img").unwrap();
        let mut imgs = html.select(&sel);
        assert_eq!(
            image_of(imgs.next().unwrap(), &base()).unwrap().as_str(),
            "https://example.com/img/a.jpg"
        );
        assert_eq!(
            image_of(imgs.next().unwrap(), &base()).unwrap().as_str(),
            "https://example.com/img/b.jpg"
        );
    }

    #[test]
    fn test_strip_byline() {
        assert_eq!(strip_byline("By Jane Doe"), "Jane Doe");
        assert_eq!(strip_byline("AUTHOR: Sam"), "Sam");
        assert_eq!(strip_byline("作者：李雷"), "李雷");
        assert_eq!(strip_byline("Bylines Inc"), "Bylines Inc");
    }

    #[test]
    fn test_invalid_selector_is_reported() {
        assert_eq!(
            compile("div[[").unwrap_err(),
            StrategyError::InvalidSelector("div[[".to_string())
        );
    }

    #[test]
    fn test_card_layout_requires_link_and_text() {
        let markup = r#"
            <ul>
              <li class="c"><a href="/one">First story</a></li>
              <li class="c"><span>no link here</span></li>
              <li class="c"><a href="/empty"> </a></li>
            </ul>"#;
        let base = base();
        let dates = DateNormalizer::new();
        let page = Page::new(markup, &base, &dates);
        let cards = CardSelectors::compile(CardLayout {
            item: "li.c",
            link: "a[href]",
            require_text: true,
            ..CardLayout::default()
        })
        .unwrap();

        let extraction = cards.extract(&page);
        assert_eq!(extraction.articles.len(), 1);
        assert_eq!(extraction.articles[0].title, "First story");
        assert_eq!(extraction.articles[0].url.as_str(), "https://example.com/one");
        assert_eq!(extraction.partial_failures.len(), 2);
    }
}

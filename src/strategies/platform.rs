//! CMS platform detection.
//!
//! A platform strategy applies to every host but first inspects
//! `<meta name="generator">`. When the platform marker is missing the page
//! is left to lower-priority strategies; when it is present the platform's
//! stock theme selectors are used.

use crate::error::StrategyError;
use crate::strategies::dom::{CardLayout, CardSelectors, attr};
use crate::strategies::{ExtractionStrategy, Outcome, Page};
use once_cell::sync::Lazy;
use scraper::Selector;
use tracing::debug;

pub const PLATFORM_PRIORITY: i32 = 50;

static GENERATOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("meta[name=generator]").expect("generator selector"));

const WORDPRESS: CardLayout<'static> = CardLayout {
    item: "article.post, article.type-post, .post.hentry",
    link: ".entry-title a[href], a[rel=bookmark], h2 a[href], a[href]",
    title: Some(".entry-title, h2, h1"),
    date: Some("time.entry-date, time[datetime], .posted-on time, .entry-date"),
    summary: Some(".entry-summary, .entry-content p"),
    author: Some(".author .fn, .byline a, .author a, .author"),
    image: Some("img.wp-post-image, .post-thumbnail img"),
    tags: Some(".tags-links a, .cat-links a, a[rel~=tag]"),
    require_text: false,
};

const GHOST: CardLayout<'static> = CardLayout {
    item: "article.post-card, article.gh-card, .post-card",
    link: "a.post-card-content-link, a.gh-card-link, a.post-card-image-link, a[href]",
    title: Some(".post-card-title, .gh-card-title, h2, h3"),
    date: Some("time[datetime], .post-card-meta-date"),
    summary: Some(".post-card-excerpt, .gh-card-excerpt"),
    author: Some(".author-name, .post-card-byline-content a, .gh-card-author"),
    image: Some(".post-card-image img, .gh-card-image img"),
    tags: Some(".post-card-primary-tag, .gh-card-tag"),
    require_text: false,
};

/// A strategy for one CMS family, gated on its generator marker.
#[derive(Debug, Clone)]
pub struct PlatformStrategy {
    id: &'static str,
    marker: &'static str,
    layout: CardLayout<'static>,
}

impl PlatformStrategy {
    pub fn wordpress() -> Self {
        Self {
            id: "wordpress",
            marker: "wordpress",
            layout: WORDPRESS,
        }
    }

    pub fn ghost() -> Self {
        Self {
            id: "ghost",
            marker: "ghost",
            layout: GHOST,
        }
    }

    fn detected(&self, page: &Page<'_>) -> bool {
        page.html()
            .select(&GENERATOR)
            .filter_map(|meta| attr(meta, "content"))
            .any(|content| content.to_ascii_lowercase().contains(self.marker))
    }
}

impl ExtractionStrategy for PlatformStrategy {
    fn id(&self) -> &str {
        self.id
    }

    fn priority(&self) -> i32 {
        PLATFORM_PRIORITY
    }

    fn extract(&self, page: &Page<'_>) -> Result<Outcome, StrategyError> {
        if !self.detected(page) {
            return Ok(Outcome::NotApplicable);
        }
        let extraction = CardSelectors::compile(self.layout)?.extract(page);
        debug!(
            platform = self.id,
            count = extraction.articles.len(),
            skipped = extraction.partial_failures.len(),
            "Platform extraction"
        );
        Ok(Outcome::Extracted(extraction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::DateNormalizer;
    use url::Url;

    const WORDPRESS_HOME: &str = r#"
        <html><head><meta name="generator" content="WordPress 6.5.2"></head>
        <body>
          <article class="post type-post hentry">
            <h2 class="entry-title"><a href="https://wp.example.com/2024/04/hello-world/" rel="bookmark">Hello world!</a></h2>
            <div class="entry-meta"><span class="posted-on"><time class="entry-date published" datetime="2024-04-10T08:15:00+00:00">April 10, 2024</time></span>
              <span class="byline">by <span class="author vcard"><a class="url fn n" href="/author/admin/">admin</a></span></span></div>
            <div class="entry-summary"><p>Welcome to WordPress. This is your first post.</p></div>
            <footer><span class="cat-links"><a href="/category/news/" rel="category tag">News</a></span></footer>
          </article>
        </body></html>"#;

    fn page_for<'a>(markup: &'a str, base: &'a Url, dates: &'a DateNormalizer) -> Page<'a> {
        Page::new(markup, base, dates)
    }

    #[test]
    fn test_wordpress_theme_extraction() {
        let base = Url::parse("https://wp.example.com/").unwrap();
        let dates = DateNormalizer::new();
        let page = page_for(WORDPRESS_HOME, &base, &dates);

        let extraction = PlatformStrategy::wordpress()
            .extract(&page)
            .unwrap()
            .into_extraction();
        assert_eq!(extraction.articles.len(), 1);
        let post = &extraction.articles[0];
        assert_eq!(post.title, "Hello world!");
        assert_eq!(post.url.as_str(), "https://wp.example.com/2024/04/hello-world/");
        assert_eq!(
            post.published_at.unwrap().to_rfc3339(),
            "2024-04-10T08:15:00+00:00"
        );
        assert_eq!(post.author.as_deref(), Some("admin"));
        assert_eq!(
            post.summary.as_deref(),
            Some("Welcome to WordPress. This is your first post.")
        );
        assert_eq!(post.tags, vec!["News"]);
    }

    #[test]
    fn test_marker_absent_is_not_applicable() {
        let base = Url::parse("https://wp.example.com/").unwrap();
        let dates = DateNormalizer::new();
        let page = page_for(WORDPRESS_HOME, &base, &dates);
        assert_eq!(
            PlatformStrategy::ghost().extract(&page).unwrap(),
            Outcome::NotApplicable
        );

        let plain = page_for("<html><body><article>x</article></body></html>", &base, &dates);
        assert_eq!(
            PlatformStrategy::wordpress().extract(&plain).unwrap(),
            Outcome::NotApplicable
        );
    }

    #[test]
    fn test_ghost_theme_extraction() {
        let markup = r#"
            <html><head><meta name="generator" content="Ghost 5.80"></head><body>
              <article class="post-card">
                <a class="post-card-content-link" href="/why-we-moved/">
                  <h2 class="post-card-title">Why we moved</h2>
                  <p class="post-card-excerpt">A long story about infrastructure and cost.</p>
                </a>
                <time datetime="2024-05-01">May 1, 2024</time>
              </article>
            </body></html>"#;
        let base = Url::parse("https://ghost.example.org/").unwrap();
        let dates = DateNormalizer::new();
        let page = page_for(markup, &base, &dates);

        let extraction = PlatformStrategy::ghost()
            .extract(&page)
            .unwrap()
            .into_extraction();
        let post = &extraction.articles[0];
        assert_eq!(post.title, "Why we moved");
        assert_eq!(post.url.as_str(), "https://ghost.example.org/why-we-moved/");
        assert_eq!(
            post.summary.as_deref(),
            Some("A long story about infrastructure and cost.")
        );
        assert_eq!(
            post.published_at.unwrap().to_rfc3339(),
            "2024-05-01T00:00:00+00:00"
        );
    }
}

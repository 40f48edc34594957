//! End-to-end ingestion scenarios through the public API.

use chrono::{DateTime, TimeZone, Utc};
use news_harvest::config::AppConfig;
use news_harvest::dates::{Clock, DateNormalizer};
use news_harvest::error::{FetchError, SourceError};
use news_harvest::fetcher::{FetchConfig, FetchMarkup, Fetcher};
use news_harvest::models::Source;
use news_harvest::orchestrator::Ingestor;
use news_harvest::registry::StrategyRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 6, 12, 0, 0).unwrap()
}

fn fixed_dates() -> DateNormalizer {
    DateNormalizer::with_clock(Clock::Fixed(fixed_now()))
}

/// Serves canned markup keyed by URL.
struct CannedPages(HashMap<String, String>);

impl CannedPages {
    fn new(pages: &[(&str, &str)]) -> Self {
        Self(
            pages
                .iter()
                .map(|(u, m)| (u.to_string(), m.to_string()))
                .collect(),
        )
    }
}

impl FetchMarkup for CannedPages {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        self.0
            .get(url.as_str())
            .cloned()
            .ok_or(FetchError::HttpError { status: 404 })
    }
}

#[tokio::test]
async fn test_article_without_link_is_skipped() {
    let markup = r#"
        <html><body>
          <article>
            <h2><a href="/world/2024/05/06/summit-opens">Summit opens with a call for calm</a></h2>
            <time datetime="2024-05-06T08:30:00Z">May 6</time>
          </article>
          <article>
            <h2>Opinion column that has no link at all</h2>
          </article>
        </body></html>"#;
    let fetcher = CannedPages::new(&[("https://news.example.org/", markup)]);
    let registry = Arc::new(StrategyRegistry::with_builtins(fixed_dates()));
    let ingestor = Ingestor::new(fetcher, registry);

    let report = ingestor
        .ingest(&[Source::new("ex", "Example News", "https://news.example.org/")])
        .await;

    assert_eq!(report.items.len(), 1);
    let item = &report.items[0];
    assert_eq!(item.title, "Summit opens with a call for calm");
    assert_eq!(
        item.url,
        "https://news.example.org/world/2024/05/06/summit-opens"
    );
    assert_eq!(
        item.published_at,
        Utc.with_ymd_and_hms(2024, 5, 6, 8, 30, 0).unwrap()
    );
    assert_eq!(item.source_label, "Example News");
    assert_eq!(report.summary.succeeded, 1);
    assert_eq!(report.summary.failed, 0);
}

#[tokio::test]
async fn test_mixed_failures_are_isolated_per_source() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<article><a href=\"/late\">Too late to matter anyway</a></article>")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(""),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(
                    r#"<article><h2><a href="/ok/story">A story that arrived in plenty of time</a></h2></article>"#,
                ),
        )
        .mount(&server)
        .await;

    let fetcher = Fetcher::new(FetchConfig {
        request_timeout_secs: 1,
        resource_timeout_secs: 1,
        ..FetchConfig::default()
    })
    .unwrap();
    let registry = Arc::new(StrategyRegistry::with_builtins(fixed_dates()));
    let ingestor = Ingestor::new(fetcher, registry);

    let sources = vec![
        Source::new("slow", "Slow", format!("{}/slow", server.uri())),
        Source::new("empty", "Empty", format!("{}/empty", server.uri())),
        Source::new("ok", "Ok", format!("{}/ok", server.uri())),
    ];
    let report = ingestor.ingest(&sources).await;

    assert_eq!(report.summary.succeeded, 1);
    assert_eq!(report.summary.failed, 2);
    assert_eq!(report.summary.total_items, 1);
    assert_eq!(report.items[0].url, format!("{}/ok/story", server.uri()));
    assert_eq!(report.items[0].published_at, fixed_now());

    let kinds: Vec<(&str, &str)> = report
        .summary
        .failures
        .iter()
        .map(|f| (f.source_id.as_str(), f.error.kind()))
        .collect();
    assert_eq!(kinds, vec![("slow", "fetch"), ("empty", "no_articles")]);
    assert_eq!(
        report.summary.failures[0].error,
        SourceError::Fetch {
            error: FetchError::Timeout
        }
    );
    assert!(report.summary.failures[0].error.is_transport());
    assert!(!report.summary.failures[1].error.is_transport());
}

#[tokio::test]
async fn test_site_and_fallback_results_are_deduplicated() {
    let config = AppConfig::from_yaml_str(
        r#"
site_profiles:
  - id: example-news
    domains: ["*.example.com"]
    item: "article.story-card"
    title: "h2"
    date: "time"
"#,
    )
    .unwrap();
    let registry = Arc::new(config.build_registry(fixed_dates()).unwrap());

    let markup = r#"
        <html><body>
          <article class="story-card">
            <h2><a href="/2024/05/story-one">Story one has a long headline</a></h2>
            <time datetime="2024-05-05T10:00:00Z"></time>
          </article>
        </body></html>"#;
    let fetcher = CannedPages::new(&[("https://www.example.com/", markup)]);
    let ingestor = Ingestor::new(fetcher, registry.clone());

    let source = Source::new("ex", "Example", "https://www.example.com/");
    let ids: Vec<String> = registry
        .applicable(None, &source.resolve_url().unwrap())
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(ids.first().map(String::as_str), Some("example-news"));
    assert_eq!(ids.last().map(String::as_str), Some("general"));

    let report = ingestor.ingest(&[source]).await;
    assert_eq!(report.items.len(), 1);
    assert_eq!(
        report.items[0].url,
        "https://www.example.com/2024/05/story-one"
    );
    assert_eq!(report.items[0].title, "Story one has a long headline");
}

#[tokio::test]
async fn test_relative_dates_use_the_injected_clock() {
    let markup = r#"
        <article>
          <h3><a href="/posts/quiet-release">A quiet release of version two</a></h3>
          <span class="date">3 days ago</span>
        </article>"#;
    let fetcher = CannedPages::new(&[("https://blog.example.net/", markup)]);
    let ingestor = Ingestor::new(
        fetcher,
        Arc::new(StrategyRegistry::with_builtins(fixed_dates())),
    );

    let items = ingestor
        .refresh_source(&Source::new("b", "Blog", "blog.example.net"))
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(
        items[0].published_at,
        fixed_now() - chrono::Duration::days(3)
    );
}

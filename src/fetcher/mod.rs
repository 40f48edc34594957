//! Concurrent retrieval of raw markup with byte-encoding detection.
//!
//! [`FetchMarkup`] is the seam between the orchestrator and the network. The
//! HTTP implementation, [`Fetcher`], wraps one shared `reqwest::Client` and
//! turns every response into decoded text or a typed [`FetchError`]:
//!
//! | Condition | Result |
//! |-----------|--------|
//! | idle longer than `request_timeout_secs`, or whole resource longer than `resource_timeout_secs` | [`FetchError::Timeout`] |
//! | status outside 2xx | [`FetchError::HttpError`] |
//! | body larger than `max_body_bytes` | [`FetchError::BodyTooLarge`] |
//! | no candidate encoding decodes the payload | [`FetchError::DecodingFailed`] |
//! | TCP/TLS setup failed | [`FetchError::Connection`] |
//!
//! Encoding precedence is documented in [`encoding`].

pub mod encoding;

use crate::error::{ConfigError, FetchError};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15";
pub const DEFAULT_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,application/rss+xml;q=0.9,*/*;q=0.8";
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9,zh-CN;q=0.8,zh;q=0.7";
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Transport settings for [`Fetcher`]. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Connect and idle-read timeout.
    pub request_timeout_secs: u64,
    /// Total time allowed for one resource, including the body.
    pub resource_timeout_secs: u64,
    pub max_concurrency: usize,
    pub max_redirects: usize,
    pub max_body_bytes: u64,
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    /// Sent with every request in addition to the headers above.
    pub extra_headers: BTreeMap<String, String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 15,
            resource_timeout_secs: 30,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_redirects: 10,
            max_body_bytes: 10 * 1024 * 1024,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept: DEFAULT_ACCEPT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            extra_headers: BTreeMap::new(),
        }
    }
}

impl FetchConfig {
    fn default_headers(&self) -> Result<HeaderMap, ConfigError> {
        let value = |v: &str| {
            HeaderValue::from_str(v).map_err(|_| ConfigError::InvalidHeader(v.to_string()))
        };

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, value(&self.user_agent)?);
        headers.insert(ACCEPT, value(&self.accept)?);
        headers.insert(ACCEPT_LANGUAGE, value(&self.accept_language)?);
        for (name, v) in &self.extra_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ConfigError::InvalidHeader(name.clone()))?;
            headers.insert(name, value(v)?);
        }
        Ok(headers)
    }
}

/// Anything that can turn a URL into decoded markup.
///
/// Implementations must isolate failures per URL: an error for one URL never
/// affects another.
pub trait FetchMarkup {
    /// Retrieve and decode a single URL.
    async fn fetch(&self, url: &Url) -> Result<String, FetchError>;

    /// Upper bound on in-flight fetches for [`fetch_all`](Self::fetch_all)
    /// and for the orchestrator.
    fn max_concurrency(&self) -> usize {
        DEFAULT_MAX_CONCURRENCY
    }

    /// Fetch every URL concurrently. Duplicates are fetched once.
    async fn fetch_all(&self, urls: Vec<Url>) -> HashMap<Url, Result<String, FetchError>> {
        let unique: Vec<Url> = urls.into_iter().unique().collect();
        let limit = self.max_concurrency().max(1);

        stream::iter(unique)
            .map(|url| async move {
                let result = self.fetch(&url).await;
                (url, result)
            })
            .buffer_unordered(limit)
            .collect()
            .await
    }
}

/// HTTP implementation of [`FetchMarkup`].
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl Fetcher {
    /// Build the shared client. Fails on headers that are not valid HTTP.
    pub fn new(config: FetchConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .default_headers(config.default_headers()?)
            .connect_timeout(Duration::from_secs(config.request_timeout_secs))
            .read_timeout(Duration::from_secs(config.request_timeout_secs))
            .timeout(Duration::from_secs(config.resource_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        debug!(
            request_timeout_secs = config.request_timeout_secs,
            resource_timeout_secs = config.resource_timeout_secs,
            max_concurrency = config.max_concurrency,
            "Built HTTP client"
        );
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn read_body(&self, mut response: reqwest::Response) -> Result<Vec<u8>, FetchError> {
        let limit = self.config.max_body_bytes;
        if let Some(declared) = response.content_length().filter(|len| *len > limit) {
            return Err(FetchError::BodyTooLarge { bytes: declared });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            if body.len() as u64 > limit {
                return Err(FetchError::BodyTooLarge {
                    bytes: body.len() as u64,
                });
            }
        }
        Ok(body)
    }
}

impl FetchMarkup for Fetcher {
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let t0 = Instant::now();

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            warn!(error = %e, elapsed_ms = t0.elapsed().as_millis() as u64, "Request failed");
            FetchError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Non-success status");
            return Err(FetchError::HttpError {
                status: status.as_u16(),
            });
        }

        let header_charset = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(encoding::charset_from_content_type)
            .map(str::to_owned);

        let bytes = self.read_body(response).await?;
        let (markup, used) = encoding::decode(&bytes, header_charset.as_deref())?;

        info!(
            status = status.as_u16(),
            bytes = bytes.len(),
            encoding = used,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched markup"
        );
        Ok(markup)
    }

    fn max_concurrency(&self) -> usize {
        self.config.max_concurrency
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher_with(config: FetchConfig) -> Fetcher {
        Fetcher::new(config).unwrap()
    }

    fn url_of(server: &MockServer, p: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), p)).unwrap()
    }

    #[tokio::test]
    async fn test_decodes_with_header_charset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latin"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                b"<p>Caf\xE9 cr\xE8me</p>".to_vec(),
                "text/html; charset=ISO-8859-1",
            ))
            .mount(&server)
            .await;

        let fetcher = fetcher_with(FetchConfig::default());
        let markup = fetcher.fetch(&url_of(&server, "/latin")).await.unwrap();
        assert_eq!(markup, "<p>Café crème</p>");
    }

    #[tokio::test]
    async fn test_non_success_status_is_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = fetcher_with(FetchConfig::default());
        let err = fetcher.fetch(&url_of(&server, "/gone")).await.unwrap_err();
        assert_eq!(err, FetchError::HttpError { status: 404 });
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<p>late</p>")
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let fetcher = fetcher_with(FetchConfig {
            request_timeout_secs: 1,
            resource_timeout_secs: 1,
            ..FetchConfig::default()
        });
        let err = fetcher.fetch(&url_of(&server, "/slow")).await.unwrap_err();
        assert_eq!(err, FetchError::Timeout);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(4096)))
            .mount(&server)
            .await;

        let fetcher = fetcher_with(FetchConfig {
            max_body_bytes: 1024,
            ..FetchConfig::default()
        });
        let err = fetcher.fetch(&url_of(&server, "/big")).await.unwrap_err();
        assert!(matches!(err, FetchError::BodyTooLarge { bytes } if bytes > 1024));
    }

    #[tokio::test]
    async fn test_sends_configured_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/h"))
            .and(header("user-agent", "news_harvest-test/1.0"))
            .and(header("x-probe", "yes"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>ok</p>"))
            .mount(&server)
            .await;

        let mut extra_headers = BTreeMap::new();
        extra_headers.insert("X-Probe".to_string(), "yes".to_string());
        let fetcher = fetcher_with(FetchConfig {
            user_agent: "news_harvest-test/1.0".to_string(),
            extra_headers,
            ..FetchConfig::default()
        });
        assert_eq!(
            fetcher.fetch(&url_of(&server, "/h")).await.unwrap(),
            "<p>ok</p>"
        );
    }

    #[test]
    fn test_invalid_header_is_config_error() {
        let err = Fetcher::new(FetchConfig {
            user_agent: "bad\nagent".to_string(),
            ..FetchConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidHeader(_)));
    }

    #[tokio::test]
    async fn test_fetch_all_isolates_failures_and_dedups() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>ok</p>"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/err"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = fetcher_with(FetchConfig::default());
        let ok = url_of(&server, "/ok");
        let bad = url_of(&server, "/err");
        let results = fetcher
            .fetch_all(vec![ok.clone(), bad.clone(), ok.clone()])
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[&ok].as_deref(), Ok("<p>ok</p>"));
        assert_eq!(results[&bad], Err(FetchError::HttpError { status: 500 }));
    }

    #[tokio::test]
    async fn test_refused_connection_is_connection_error() {
        let fetcher = fetcher_with(FetchConfig {
            request_timeout_secs: 2,
            resource_timeout_secs: 2,
            ..FetchConfig::default()
        });
        let err = fetcher
            .fetch(&Url::parse("http://127.0.0.1:9/").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Connection { .. }));
    }
}

//! Error taxonomy for fetching, extraction, ingestion and setup.
//!
//! Errors are split by the scope they affect:
//!
//! | Type | Scope | Fatal to |
//! |------|-------|----------|
//! | [`FetchError`] | one URL | that source only |
//! | [`StrategyError`] | one strategy on one document | that strategy's contribution |
//! | [`PartialFailure`] | one candidate element | that element |
//! | [`SourceError`] | one source in a run | that source only |
//! | [`ConfigError`] | process setup | the CLI invocation |
//!
//! Everything that ends up in a run summary derives [`Serialize`] so the summary
//! can be written out next to the extracted items.

use serde::Serialize;
use thiserror::Error;

/// Transport-level failure while retrieving a single URL.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchError {
    /// The request or total-resource timeout elapsed.
    #[error("request timed out")]
    Timeout,

    /// The server answered with a non-2xx status.
    #[error("HTTP error: status {status}")]
    HttpError { status: u16 },

    /// No declared or sniffed encoding could decode the payload.
    #[error("could not decode payload as {encoding}")]
    DecodingFailed { encoding: String },

    /// TCP/TLS connection could not be established.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Any other transport failure reported by the HTTP client.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The payload exceeded the configured body limit.
    #[error("response body too large: {bytes} bytes")]
    BodyTooLarge { bytes: u64 },
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_connect() {
            FetchError::Connection {
                message: e.to_string(),
            }
        } else {
            FetchError::Transport {
                message: e.to_string(),
            }
        }
    }
}

/// Hard failure of one strategy on one document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyError {
    #[error("invalid selector `{0}`")]
    InvalidSelector(String),

    #[error("malformed document: {0}")]
    Malformed(String),
}

/// A candidate element that was skipped because a required field was missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartialFailure {
    pub reason: String,
}

impl PartialFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A [`StrategyError`] recorded against the strategy that raised it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyFailure {
    pub strategy: String,
    pub reason: String,
}

/// Why a source contributed nothing to a run.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceError {
    /// The source URL string could not be turned into an absolute HTTP(S) URL.
    #[error("invalid source URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("fetch failed: {error}")]
    Fetch {
        #[from]
        error: FetchError,
    },

    /// Every strategy ran cleanly but none found an article.
    #[error("no articles found")]
    NoArticles,

    /// Nothing was extracted and at least one strategy failed.
    #[error("no articles found; {} strategies failed", .failures.len())]
    Exhausted { failures: Vec<StrategyFailure> },

    #[error("deadline exceeded before the source finished")]
    DeadlineExceeded,
}

impl SourceError {
    /// Short stable name of the error class, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::InvalidUrl { .. } => "invalid_url",
            SourceError::Fetch { .. } => "fetch",
            SourceError::NoArticles => "no_articles",
            SourceError::Exhausted { .. } => "exhausted",
            SourceError::DeadlineExceeded => "deadline_exceeded",
        }
    }

    /// `true` for transport and deadline failures ("site unreachable"),
    /// `false` for structural and exhaustion failures.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SourceError::Fetch { .. } | SourceError::DeadlineExceeded
        )
    }
}

/// Failure while loading configuration or building the runtime pieces.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid header `{0}`")]
    InvalidHeader(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("override for source `{source_id}` names unknown strategy `{strategy}`")]
    UnknownStrategy { source_id: String, strategy: String },

    #[error("site profile `{id}`: {reason}")]
    InvalidProfile { id: String, reason: String },
}

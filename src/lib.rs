//! # news_harvest
//!
//! Turns arbitrary news pages and feeds into normalized, deduplicated,
//! time-ordered article lists.
//!
//! ## Architecture
//!
//! 1. **Fetching** ([`fetcher`]): concurrent HTTP retrieval with encoding detection
//! 2. **Extraction** ([`strategies`], [`registry`]): prioritized, domain-scoped
//!    strategies turn markup into articles
//! 3. **Dates** ([`dates`]): heuristic normalization of publish times
//! 4. **Ingestion** ([`orchestrator`]): per-source isolation, merge, dedup and sort
//!
//! ```no_run
//! use news_harvest::dates::DateNormalizer;
//! use news_harvest::fetcher::{FetchConfig, Fetcher};
//! use news_harvest::models::Source;
//! use news_harvest::orchestrator::Ingestor;
//! use news_harvest::registry::StrategyRegistry;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(StrategyRegistry::with_builtins(DateNormalizer::new()));
//! let ingestor = Ingestor::new(Fetcher::new(FetchConfig::default())?, registry);
//! let report = ingestor
//!     .ingest(&[Source::new("hn", "Hacker News", "https://news.ycombinator.com")])
//!     .await;
//! println!("{} items", report.items.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dates;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod orchestrator;
pub mod outputs;
pub mod registry;
pub mod strategies;
pub mod utils;

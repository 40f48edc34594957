//! # news_harvest
//!
//! Command-line front end for the extraction pipeline.
//!
//! ## Usage
//!
//! ```sh
//! news_harvest run -c ./sources.yaml -j ./json
//! news_harvest strategies
//! news_harvest explain https://lite.cnn.com
//! news_harvest fetch https://text.npr.org https://lite.cnn.com
//! news_harvest date "Posted: Jan 5, 2024 10:30 AM EST"
//! ```
//!
//! `run` writes one digest per edition to
//! `{json_output_dir}/{YYYY-MM-DD}/{morning|afternoon|evening}.json`.

use chrono::{Local, Utc};
use clap::Parser;
use news_harvest::config::AppConfig;
use news_harvest::dates::DateNormalizer;
use news_harvest::fetcher::{FetchConfig, FetchMarkup, Fetcher};
use news_harvest::models::{Digest, Source};
use news_harvest::orchestrator::Ingestor;
use news_harvest::outputs::json;
use news_harvest::registry::StrategyRegistry;
use news_harvest::utils::{ensure_writable_dir, time_of_day, truncate_for_log};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};
use url::Url;

mod cli;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let args = Cli::parse();
    debug!(?args.command, "Parsed CLI arguments");

    match args.command {
        Command::Run {
            config,
            json_output_dir,
            deadline_secs,
        } => run(&config, &json_output_dir, deadline_secs).await,
        Command::Strategies { config } => strategies(config.as_deref()).await,
        Command::Explain {
            url,
            source_id,
            config,
        } => explain(&url, source_id.as_deref(), config.as_deref()).await,
        Command::Fetch { urls } => fetch(urls).await,
        Command::Date { text } => {
            match DateNormalizer::new().parse(&text) {
                Some(instant) => println!("{}", instant.to_rfc3339()),
                None => println!("unrecognized: {text}"),
            }
            Ok(())
        }
    }
}

/// Configuration (defaults when no path is given) and the registry built from it.
async fn load_registry(
    config_path: Option<&str>,
) -> Result<(AppConfig, StrategyRegistry), Box<dyn Error>> {
    let config = match config_path {
        Some(path) => AppConfig::load(path).await?,
        None => AppConfig::default(),
    };
    let registry = config.build_registry(DateNormalizer::new())?;
    Ok((config, registry))
}

#[instrument(level = "info", skip_all, fields(config = %config_path, json_output_dir = %json_output_dir))]
async fn run(
    config_path: &str,
    json_output_dir: &str,
    deadline_secs: Option<u64>,
) -> Result<(), Box<dyn Error>> {
    let start_time = std::time::Instant::now();
    info!("news_harvest starting up");

    // Early check: ensure JSON output dir is writable
    if let Err(e) = ensure_writable_dir(json_output_dir).await {
        error!(
            path = %json_output_dir,
            error = %e,
            "JSON output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let (config, registry) = load_registry(Some(config_path)).await?;
    let sources = config.all_sources();
    if sources.is_empty() {
        warn!("No sources configured; the digest will be empty");
    }

    let ingestor = Ingestor::new(Fetcher::new(config.fetch.clone())?, Arc::new(registry));
    let report = match deadline_secs {
        Some(secs) => {
            let deadline = tokio::time::Instant::now() + Duration::from_secs(secs);
            ingestor.ingest_until(&sources, deadline).await
        }
        None => ingestor.ingest(&sources).await,
    };

    for failure in &report.summary.failures {
        warn!(
            source_id = %failure.source_id,
            label = %failure.label,
            kind = failure.error.kind(),
            "Source contributed nothing"
        );
    }

    let now = Local::now();
    let digest = Digest {
        local_date: now.date_naive().to_string(),
        time_of_day: time_of_day(now),
        generated_at: Utc::now(),
        summary: report.summary,
        items: report.items,
    };

    let path = json::write_digest(&digest, json_output_dir).await?;

    let elapsed = start_time.elapsed();
    info!(
        path = %path.display(),
        count = digest.items.len(),
        succeeded = digest.summary.succeeded,
        failed = digest.summary.failed,
        edition = %digest.time_of_day,
        elapsed_ms = elapsed.as_millis() as u64,
        "Execution complete"
    );
    Ok(())
}

async fn strategies(config_path: Option<&str>) -> Result<(), Box<dyn Error>> {
    let (_, registry) = load_registry(config_path).await?;
    for descriptor in registry.descriptors() {
        let domains = if descriptor.domains.is_empty() {
            "*".to_string()
        } else {
            descriptor.domains.join(", ")
        };
        println!("{:>5}  {:<16} {}", descriptor.priority, descriptor.id, domains);
    }
    Ok(())
}

async fn explain(
    url: &str,
    source_id: Option<&str>,
    config_path: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    let (_, registry) = load_registry(config_path).await?;
    let url = Source::new(source_id.unwrap_or("cli"), "cli", url).resolve_url()?;
    let applicable = registry.applicable(source_id, &url);
    println!("{}", serde_json::to_string_pretty(&applicable)?);
    Ok(())
}

#[instrument(level = "info", skip_all, fields(count = urls.len()))]
async fn fetch(urls: Vec<String>) -> Result<(), Box<dyn Error>> {
    let fetcher = Fetcher::new(FetchConfig::default())?;

    let mut parsed = Vec::new();
    for raw in &urls {
        match Source::new("cli", "cli", raw.as_str()).resolve_url() {
            Ok(url) => parsed.push(url),
            Err(e) => println!("{raw}\terror\t{e}"),
        }
    }

    let mut results: Vec<(Url, _)> = fetcher.fetch_all(parsed).await.into_iter().collect();
    results.sort_by(|a, b| a.0.cmp(&b.0));
    for (url, result) in results {
        match result {
            Ok(markup) => println!(
                "{url}\tok\t{} chars\t{}",
                markup.chars().count(),
                truncate_for_log(&markup.split_whitespace().collect::<Vec<_>>().join(" "), 80)
            ),
            Err(e) => println!("{url}\terror\t{e}"),
        }
    }
    Ok(())
}

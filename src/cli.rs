//! Command-line interface definitions for news_harvest.

use clap::{Parser, Subcommand};

/// Extract article lists from news pages and feeds.
///
/// # Examples
///
/// ```sh
/// # Ingest every configured source and write the edition digest
/// news_harvest run -c ./sources.yaml -j ./json
///
/// # Which strategies would handle a page?
/// news_harvest explain https://news.ycombinator.com
///
/// # Try the date normalizer
/// news_harvest date "3 hours ago"
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Ingest every configured source and write a JSON digest
    Run {
        /// Path to the YAML configuration
        #[arg(short, long, env = "NEWS_HARVEST_CONFIG")]
        config: String,

        /// Output directory for the JSON digest
        #[arg(short, long)]
        json_output_dir: String,

        /// Fail sources still running after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,
    },

    /// List registered strategies in execution order
    Strategies {
        /// Optional path to a YAML configuration
        #[arg(short, long, env = "NEWS_HARVEST_CONFIG")]
        config: Option<String>,
    },

    /// Show the strategies that would run for a URL
    Explain {
        url: String,

        /// Source id, to take per-source overrides into account
        #[arg(long)]
        source_id: Option<String>,

        /// Optional path to a YAML configuration
        #[arg(short, long, env = "NEWS_HARVEST_CONFIG")]
        config: Option<String>,
    },

    /// Fetch URLs and report the outcome for each
    Fetch {
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Normalize a date string to UTC
    Date { text: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_parsing() {
        let cli = Cli::parse_from([
            "news_harvest",
            "run",
            "--config",
            "./sources.yaml",
            "--json-output-dir",
            "./json",
        ]);
        assert_eq!(
            cli.command,
            Command::Run {
                config: "./sources.yaml".to_string(),
                json_output_dir: "./json".to_string(),
                deadline_secs: None,
            }
        );
    }

    #[test]
    fn test_run_short_flags() {
        let cli = Cli::parse_from([
            "news_harvest",
            "run",
            "-c",
            "/tmp/c.yaml",
            "-j",
            "/tmp/json",
            "--deadline-secs",
            "45",
        ]);
        match cli.command {
            Command::Run {
                json_output_dir,
                deadline_secs,
                ..
            } => {
                assert_eq!(json_output_dir, "/tmp/json");
                assert_eq!(deadline_secs, Some(45));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_explain_and_fetch() {
        let cli = Cli::parse_from([
            "news_harvest",
            "explain",
            "https://news.ycombinator.com",
            "--source-id",
            "hn",
        ]);
        assert!(matches!(
            cli.command,
            Command::Explain { ref url, source_id: Some(ref id), .. }
                if url == "https://news.ycombinator.com" && id == "hn"
        ));

        let cli = Cli::parse_from(["news_harvest", "fetch", "https://a.example", "https://b.example"]);
        assert!(matches!(cli.command, Command::Fetch { ref urls } if urls.len() == 2));

        assert!(Cli::try_parse_from(["news_harvest", "fetch"]).is_err());
    }

    #[test]
    fn test_date_parsing() {
        let cli = Cli::parse_from(["news_harvest", "date", "3 hours ago"]);
        assert_eq!(
            cli.command,
            Command::Date {
                text: "3 hours ago".to_string()
            }
        );
    }
}

//! JSON digest output.
//!
//! One [`Digest`] per run, written to `{json_output_dir}/{local_date}/{time_of_day}.json`.
//! A later run in the same edition replaces the earlier file.

use crate::models::Digest;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// Write a [`Digest`] under `json_output_dir` and return the file path.
///
/// # Arguments
///
/// * `digest` - The run's items and summary
/// * `json_output_dir` - Base directory for JSON output
///
/// # Returns
///
/// The path written, or an error if serialization or any filesystem step
/// fails.
///
/// # Output Path
///
/// `{json_output_dir}/{local_date}/{time_of_day}.json`
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir))]
pub async fn write_digest(digest: &Digest, json_output_dir: &str) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(digest)?;

    let full_json_dir = PathBuf::from(json_output_dir).join(&digest.local_date);
    info!(full_json_dir = %full_json_dir.display(), "Ensuring JSON directory exists");
    if let Err(e) = fs::create_dir_all(&full_json_dir).await {
        error!(full_json_dir = %full_json_dir.display(), error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let path = full_json_dir.join(format!("{}.json", digest.time_of_day));
    fs::write(&path, json).await?;
    info!(path = %path.display(), count = digest.items.len(), "Wrote JSON digest");

    Ok(path)
}

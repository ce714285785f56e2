//! JSON archive of each run.
//!
//! Files are grouped by local date and named after the local run time:
//! ```text
//! json_output_dir/
//! └── 2024-03-15/
//!     ├── 00-25.json
//!     └── 19-50.json
//! ```
//!
//! Manual runs land next to scheduled ones under their own minute.

use crate::models::RunReport;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// `{dir}/{YYYY-MM-DD}/{HH-MM}.json` for the report's local run time.
pub fn archive_path(report: &RunReport, json_output_dir: &str) -> PathBuf {
    let now = report.reference.now;
    PathBuf::from(json_output_dir)
        .join(now.format("%Y-%m-%d").to_string())
        .join(format!("{}.json", now.format("%H-%M")))
}

/// Serialize a [`RunReport`] into the date-based archive.
///
/// Returns the written path. A second run in the same minute overwrites the first.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir))]
pub async fn write_run(
    report: &RunReport,
    json_output_dir: &str,
) -> Result<PathBuf, Box<dyn Error + Send + Sync>> {
    let json = serde_json::to_string_pretty(report)?;
    let path = archive_path(report, json_output_dir);

    if let Some(dir) = path.parent() {
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
            return Err(e.into());
        }
    }

    fs::write(&path, json).await?;
    info!(path = %path.display(), sites = report.results.len(), "Wrote run archive");
    Ok(path)
}

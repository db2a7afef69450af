//! Manifest export: metadata log to spreadsheet rows

use crate::error::{PostProcessError, Result};
use crate::types::{ManifestContext, ManifestRecord};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Destination for manifest rows
///
/// The default implementation appends CSV; hosts can plug in other spreadsheet
/// formats.
pub trait ManifestWriter: Send + Sync {
    /// Append `records` to the manifest in `dir`, returning the file written
    fn write(&self, dir: &Path, records: &[ManifestRecord]) -> Result<PathBuf>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Writes `number,title,url` rows to a CSV file, appending across runs
#[derive(Debug, Clone)]
pub struct CsvManifestWriter {
    file_name: String,
}

impl CsvManifestWriter {
    /// Writer producing `dir/<file_name>`
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }
}

impl Default for CsvManifestWriter {
    fn default() -> Self {
        Self::new("_video_list.csv")
    }
}

impl ManifestWriter for CsvManifestWriter {
    fn write(&self, dir: &Path, records: &[ManifestRecord]) -> Result<PathBuf> {
        let path = dir.join(&self.file_name);
        let is_new = std::fs::metadata(&path).map_or(true, |m| m.len() == 0);

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);

        if is_new {
            writer.write_record(["number", "title", "url"])?;
        }
        for record in records {
            writer.write_record([
                format!("{:03}", record.ordinal).as_str(),
                record.title.as_str(),
                record.canonical_url.as_str(),
            ])?;
        }
        writer.flush()?;
        Ok(path)
    }

    fn name(&self) -> &'static str {
        "csv"
    }
}

/// One line of the metadata log
#[derive(Debug, Clone, Deserialize)]
struct MetadataLine {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    playlist_index: Option<u32>,
}

/// Build manifest rows from metadata log content
///
/// Undecodable lines are skipped. Ordinals come from the session's assignments by
/// id, then from `playlist_index` (unless `sequential_ordinals` is set), then from
/// `first_ordinal` plus the row position.
pub fn build_records(log: &str, context: &ManifestContext, url_base: &str) -> Vec<ManifestRecord> {
    let lines = log
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str::<MetadataLine>(line) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!(error = %e, "skipping undecodable metadata line");
                None
            }
        });

    lines
        .zip(0u32..)
        .map(|(line, position)| {
            let id = line.id.unwrap_or_default();
            let ordinal = context
                .ordinals_by_id
                .get(&id)
                .copied()
                .or(line.playlist_index.filter(|_| !context.sequential_ordinals))
                .unwrap_or_else(|| context.first_ordinal.saturating_add(position));
            ManifestRecord {
                ordinal,
                title: line.title.unwrap_or_default(),
                canonical_url: format!("{url_base}{id}"),
            }
        })
        .collect()
}

/// Turn `dir/<log_name>` into manifest rows and hand them to `writer`
///
/// On success the log is deleted; on failure it is kept so the next export can
/// retry. A missing log exports nothing and returns `Ok(0)`.
pub async fn export_manifest(
    dir: &Path,
    context: &ManifestContext,
    log_name: &str,
    url_base: &str,
    writer: &dyn ManifestWriter,
) -> Result<usize> {
    let log_path = dir.join(log_name);
    let content = match tokio::fs::read(&log_path).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "no metadata log, nothing to export");
            return Ok(0);
        }
        Err(e) => {
            return Err(PostProcessError::ManifestExportFailed {
                dir: dir.to_path_buf(),
                reason: format!("cannot read {}: {}", log_path.display(), e),
            }
            .into());
        }
    };

    let records = build_records(&content, context, url_base);
    if records.is_empty() {
        debug!(dir = %dir.display(), "metadata log holds no records");
        remove_log(&log_path).await;
        return Ok(0);
    }

    let written = writer.write(dir, &records).map_err(|e| {
        PostProcessError::ManifestExportFailed {
            dir: dir.to_path_buf(),
            reason: e.to_string(),
        }
    })?;

    info!(
        path = %written.display(),
        records = records.len(),
        writer = writer.name(),
        "manifest exported"
    );
    remove_log(&log_path).await;
    Ok(records.len())
}

async fn remove_log(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "could not remove metadata log");
    }
}

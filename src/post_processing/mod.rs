//! Post-processing for finished items
//!
//! Two stages run after the fetcher exits:
//! 1. Renumber - prefix each produced file with its ordinal (`"007 - Title.mp4"`)
//! 2. Manifest - turn the per-directory metadata log into manifest rows
//!
//! Renumbering runs after every item; manifest export runs once per request
//! directory after its last item. Neither stage fails a batch: problems are
//! logged and surfaced as events.

use crate::config::Config;
use crate::error::Result;
use crate::types::{Event, ManifestContext};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

mod manifest;
mod rename;

pub use manifest::{CsvManifestWriter, ManifestWriter, build_records, export_manifest};
pub use rename::{RenumberReport, numbered_name, renumber_files};

/// Post-processing executor shared by a download session
pub struct PostProcessor {
    /// Event channel for emitting post-processing events
    event_tx: broadcast::Sender<Event>,
    /// File names and URL base
    config: Arc<Config>,
    /// Manifest destination
    writer: Arc<dyn ManifestWriter>,
}

impl PostProcessor {
    /// Create a new post-processor
    pub fn new(
        event_tx: broadcast::Sender<Event>,
        config: Arc<Config>,
        writer: Arc<dyn ManifestWriter>,
    ) -> Self {
        Self {
            event_tx,
            config,
            writer,
        }
    }

    /// Number the files an item produced and return the next ordinal
    ///
    /// Emits `FileRenamed` and `RenameFailed` per file.
    pub async fn renumber_and_finalize(
        &self,
        dir: &Path,
        produced: &[String],
        starting_ordinal: u32,
    ) -> u32 {
        debug!(dir = %dir.display(), files = produced.len(), starting_ordinal, "renumbering");
        let report = renumber_files(dir, produced, starting_ordinal).await;

        for (from, to) in report.renamed {
            self.event_tx.send(Event::FileRenamed { from, to }).ok();
        }
        for failure in report.failed {
            let path = match &failure {
                crate::PostProcessError::RenameFailed { from, .. } => from.clone(),
                crate::PostProcessError::InvalidPath { path, .. } => path.clone(),
                crate::PostProcessError::ManifestExportFailed { dir, .. } => dir.clone(),
            };
            self.event_tx
                .send(Event::RenameFailed {
                    path,
                    error: failure.to_string(),
                })
                .ok();
        }

        report.next_ordinal
    }

    /// Export the manifest for `dir`, returning the number of rows written
    ///
    /// Emits `ManifestExported` when rows were written and
    /// `ManifestExportFailed` on error.
    pub async fn export_manifest(&self, dir: &Path, context: &ManifestContext) -> Result<usize> {
        let result = export_manifest(
            dir,
            context,
            &self.config.download.metadata_log_name,
            &self.config.download.canonical_url_base,
            self.writer.as_ref(),
        )
        .await;

        match &result {
            Ok(0) => {}
            Ok(records) => {
                self.event_tx
                    .send(Event::ManifestExported {
                        path: dir.join(&self.config.download.manifest_file_name),
                        records: *records,
                    })
                    .ok();
            }
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "manifest export failed");
                self.event_tx
                    .send(Event::ManifestExportFailed {
                        directory: dir.to_path_buf(),
                        error: e.to_string(),
                    })
                    .ok();
            }
        }
        result
    }
}

#[cfg(test)]
mod tests;

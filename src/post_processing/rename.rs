//! Renumbering stage: prefix finished files with their ordinal

use crate::error::PostProcessError;
use crate::utils::{max_numbered_prefix, numbered_prefix};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of one renumbering pass
#[derive(Debug, Default)]
pub struct RenumberReport {
    /// Ordinal the next file should get
    pub next_ordinal: u32,
    /// Files renamed, as `(from, to)`
    pub renamed: Vec<(PathBuf, PathBuf)>,
    /// Files that keep their name
    pub failed: Vec<PostProcessError>,
}

/// Format the numbered name for `file_name`
pub fn numbered_name(ordinal: u32, file_name: &str) -> String {
    format!("{ordinal:03} - {file_name}")
}

/// Rename each produced file in `dir` to `"NNN - <name>"`
///
/// Numbering continues from `max(starting_ordinal, highest existing prefix + 1)`.
/// Missing files and files that already carry a prefix are skipped, duplicates
/// in `produced` are handled once, and an existing target is never overwritten.
/// Failures are collected per file; they never stop the rest of the pass.
pub async fn renumber_files(dir: &Path, produced: &[String], starting_ordinal: u32) -> RenumberReport {
    let existing_next = max_numbered_prefix(dir).map_or(1, |max| max.saturating_add(1));
    let mut report = RenumberReport {
        next_ordinal: starting_ordinal.max(existing_next),
        ..RenumberReport::default()
    };

    let mut seen: Vec<&str> = Vec::with_capacity(produced.len());
    for name in produced {
        if seen.contains(&name.as_str()) {
            continue;
        }
        seen.push(name);

        let source = dir.join(name);
        if tokio::fs::metadata(&source).await.is_err() {
            debug!(path = %source.display(), "produced file no longer exists, skipping");
            continue;
        }

        let Some(file_name) = source.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            report.failed.push(PostProcessError::InvalidPath {
                path: source,
                reason: "no file name".to_string(),
            });
            continue;
        };
        if numbered_prefix(&file_name).is_some() {
            debug!(path = %source.display(), "file already numbered, skipping");
            continue;
        }

        let target = source.with_file_name(numbered_name(report.next_ordinal, &file_name));
        if tokio::fs::metadata(&target).await.is_ok() {
            warn!(from = %source.display(), to = %target.display(), "numbered target exists, keeping original name");
            report.failed.push(PostProcessError::RenameFailed {
                from: source,
                to: target,
                reason: "target already exists".to_string(),
            });
            continue;
        }

        match tokio::fs::rename(&source, &target).await {
            Ok(()) => {
                info!(from = %source.display(), to = %target.display(), "file numbered");
                report.renamed.push((source, target));
                report.next_ordinal = report.next_ordinal.saturating_add(1);
            }
            Err(e) => {
                warn!(from = %source.display(), error = %e, "rename failed, keeping original name");
                report.failed.push(PostProcessError::RenameFailed {
                    from: source,
                    to: target,
                    reason: e.to_string(),
                });
            }
        }
    }

    report
}

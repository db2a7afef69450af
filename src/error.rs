//! Error types for media-dl
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (Download, PostProcess)
//! - Context information (URL, exit code, stderr tail, file paths)
//!
//! Per-item errors are caught at the item boundary inside the download session
//! and surfaced as events; only setup-time conditions abort a batch.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "destination_dir")
        key: Option<String>,
    },

    /// The fetcher's metadata-only invocation failed or returned no parseable JSON
    #[error("metadata fetch failed for {url}: {stderr}")]
    MetadataFetch {
        /// The URL whose metadata was requested
        url: String,
        /// Captured standard error of the fetcher (or a description of the failure)
        stderr: String,
    },

    /// Download-related error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// Post-processing error (rename, manifest export)
    #[error("post-processing error: {0}")]
    PostProcess(#[from] PostProcessError),

    /// A second `start()` was attempted while a session run is active
    #[error("a download session is already running")]
    SessionAlreadyRunning,

    /// The given text is not a usable URL
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl {
        /// The rejected input
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV writer error
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// External tool execution failed (yt-dlp, ffmpeg)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, not implemented, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Download-related errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The fetcher exited non-zero for an item and no cancellation was requested
    #[error("download of {url} failed (exit code {exit_code:?}): {stderr_tail}")]
    ItemFailed {
        /// The item URL
        url: String,
        /// Process exit code, `None` when terminated by a signal
        exit_code: Option<i32>,
        /// Last lines of the captured standard error
        stderr_tail: String,
    },

    /// The fetcher process could not be started
    #[error("failed to spawn {program} for {url}: {reason}")]
    SpawnFailed {
        /// The program that was executed
        program: PathBuf,
        /// The item URL
        url: String,
        /// The underlying OS error
        reason: String,
    },

    /// The destination directory for a request could not be created
    #[error("cannot create destination {path}: {reason}")]
    DestinationUnavailable {
        /// The directory that could not be created
        path: PathBuf,
        /// The underlying OS error
        reason: String,
    },
}

/// Post-processing errors (renaming, manifest export)
#[derive(Debug, Error)]
pub enum PostProcessError {
    /// File rename failed; the original name is left in place
    #[error("failed to rename {from} to {to}: {reason}")]
    RenameFailed {
        /// The file that should have been renamed
        from: PathBuf,
        /// The numbered target name
        to: PathBuf,
        /// The reason the rename failed
        reason: String,
    },

    /// Manifest export failed; the metadata log is kept for a retry
    #[error("manifest export failed in {dir}: {reason}")]
    ManifestExportFailed {
        /// The directory whose manifest could not be written
        dir: PathBuf,
        /// The reason the export failed
        reason: String,
    },

    /// Invalid path encountered during post-processing
    #[error("invalid path {path}: {reason}")]
    InvalidPath {
        /// The invalid path that was encountered
        path: PathBuf,
        /// The reason the path is invalid
        reason: String,
    },
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Returns `true` for errors that are confined to one item and must not stop a batch
    pub fn is_item_scoped(&self) -> bool {
        matches!(
            self,
            Error::MetadataFetch { .. } | Error::Download(_) | Error::PostProcess(_)
        )
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_failed_message_includes_exit_code_and_stderr() {
        let err = Error::Download(DownloadError::ItemFailed {
            url: "https://youtu.be/abc".to_string(),
            exit_code: Some(1),
            stderr_tail: "ERROR: Video unavailable".to_string(),
        });
        let msg = err.to_string();
        assert!(msg.contains("https://youtu.be/abc"));
        assert!(msg.contains("Some(1)"));
        assert!(msg.contains("Video unavailable"));
    }

    #[test]
    fn item_scoped_classification() {
        assert!(
            Error::MetadataFetch {
                url: "u".into(),
                stderr: "e".into()
            }
            .is_item_scoped()
        );
        assert!(
            Error::PostProcess(PostProcessError::RenameFailed {
                from: "a".into(),
                to: "b".into(),
                reason: "exists".into(),
            })
            .is_item_scoped()
        );
        assert!(!Error::SessionAlreadyRunning.is_item_scoped());
        assert!(!Error::Io(std::io::Error::other("disk")).is_item_scoped());
    }

    #[test]
    fn config_helper_records_key() {
        match Error::config("must not be empty", "filename_template") {
            Error::Config { message, key } => {
                assert_eq!(message, "must not be empty");
                assert_eq!(key.as_deref(), Some("filename_template"));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn io_errors_convert() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, Error::Io(_)));
    }
}

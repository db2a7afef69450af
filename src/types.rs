//! Core types for media-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Shape of a source URL as far as the fetcher is concerned
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlClass {
    /// A single video page
    Video,
    /// A playlist (`list=` query parameter)
    Playlist,
    /// A channel or user feed
    Channel,
}

impl UrlClass {
    /// Whether the fetcher has to enumerate this URL into items
    pub fn is_collection(self) -> bool {
        matches!(self, UrlClass::Playlist | UrlClass::Channel)
    }
}

/// Whether a request covers one item or an enumerable collection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkKind {
    /// One item, downloaded directly from the raw URL
    Single,
    /// A playlist or channel feed
    Collection,
}

/// Inclusive, 1-based item range inside a collection
///
/// Only non-empty ranges starting at 1 or later can be built; deserializing
/// an inverted or zero-based range fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawItemRange")]
pub struct ItemRange {
    start: u32,
    end: u32,
}

#[derive(Deserialize)]
struct RawItemRange {
    start: u32,
    end: u32,
}

impl TryFrom<RawItemRange> for ItemRange {
    type Error = String;

    fn try_from(raw: RawItemRange) -> std::result::Result<Self, Self::Error> {
        ItemRange::new(raw.start, raw.end)
            .ok_or_else(|| format!("invalid item range {}-{}", raw.start, raw.end))
    }
}

impl ItemRange {
    /// Build a range, or `None` (meaning "all items") when it is empty or zero-based
    pub fn new(start: u32, end: u32) -> Option<Self> {
        if start == 0 || start > end {
            None
        } else {
            Some(Self { start, end })
        }
    }

    /// Parse `"START-END"`; anything unparseable or inverted means "all"
    pub fn parse(text: &str) -> Option<Self> {
        let (start, end) = text.trim().split_once('-')?;
        Self::new(start.trim().parse().ok()?, end.trim().parse().ok()?)
    }

    /// First item (1-based)
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Last item (inclusive)
    pub fn end(&self) -> u32 {
        self.end
    }

    /// Whether the range selects anything
    pub fn is_valid(&self) -> bool {
        self.start >= 1 && self.start <= self.end
    }

    /// Number of items covered by the range
    pub fn len(&self) -> u32 {
        if self.is_valid() {
            self.end - self.start + 1
        } else {
            0
        }
    }

    /// True only for ranges that select nothing
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Display for ItemRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// One URL the caller asked for, before enumeration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRequest {
    /// The URL as entered (after `www.` normalization)
    pub raw_url: String,
    /// Single item or collection
    pub kind: WorkKind,
    /// Optional item range; only meaningful for collections
    pub range: Option<ItemRange>,
}

impl WorkRequest {
    /// Attach an item range; ignored for single items
    #[must_use]
    pub fn with_range(mut self, range: Option<ItemRange>) -> Self {
        self.range = match self.kind {
            WorkKind::Collection => range,
            WorkKind::Single => None,
        };
        self
    }
}

/// One downloadable unit
///
/// The listing details (`duration`, `upload_date`, `thumbnail`) are whatever the
/// collection listing reported; hosts use them to let users pick items.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// URL handed to the fetcher for this item
    pub source_url: String,
    /// Title as reported during enumeration (may be empty for single items)
    pub display_title: String,
    /// 1-based position inside the enumerated collection
    pub ordinal_index: u32,
    /// Fetcher item id, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Human-readable duration, e.g. `"3:25"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    /// Upload date as `YYYYMMDD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<String>,
    /// Thumbnail image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

/// What to keep from each item
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadMode {
    /// Best mp4 video merged with m4a audio
    #[default]
    Video,
    /// Audio only, extracted to mp3
    AudioOnly,
}

/// Per-run download options
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOptions {
    /// Video or audio-only
    pub mode: DownloadMode,
    /// Embed the thumbnail into video files
    pub include_thumbnail: bool,
    /// Fetcher output template; `%(number)03d` style placeholders take the ordinal
    pub filename_template: String,
    /// Base directory for all output
    pub destination_dir: PathBuf,
}

impl DownloadOptions {
    /// Video downloads into `destination_dir` using the default template
    pub fn new(destination_dir: impl Into<PathBuf>) -> Self {
        Self {
            mode: DownloadMode::Video,
            include_thumbnail: false,
            filename_template: crate::fetcher::DEFAULT_TEMPLATE.to_string(),
            destination_dir: destination_dir.into(),
        }
    }
}

/// Normalized view of one line of fetcher output
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// The fetcher started writing a final output file
    Started {
        /// Output file name as printed by the fetcher
        title: String,
    },
    /// The archive or an existing file made the fetcher skip the item
    AlreadyDownloaded {
        /// Existing file name
        filename: String,
    },
    /// Separate video and audio streams were merged
    MergeComplete {
        /// Merged file name
        filename: String,
    },
    /// Download progress
    PercentUpdate {
        /// Percentage (0.0 to 100.0)
        percent: f64,
        /// Total size in MB, when printed
        total_mb: Option<f64>,
        /// Progress bar position
        current: u64,
        /// Progress bar maximum
        max: u64,
    },
    /// Format information (resolution, height)
    Info {
        /// The line as printed
        text: String,
    },
    /// Anything else
    Unrecognized {
        /// The line as printed
        raw_line: String,
    },
}

/// Snapshot of a session's live state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// A run is active
    pub is_running: bool,
    /// Cancellation was requested and not yet reset
    pub cancel_requested: bool,
    /// Process id of the live fetcher, if any
    pub current_pid: Option<u32>,
    /// Ordinal the next item will receive
    pub next_ordinal: u32,
}

/// One manifest row
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRecord {
    /// Item number as shown in file names
    pub ordinal: u32,
    /// Item title
    pub title: String,
    /// Canonical short URL of the item
    pub canonical_url: String,
}

/// Numbering knowledge the session hands to manifest export
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ManifestContext {
    /// Ordinal to count from for records the session has no ordinal for
    pub first_ordinal: u32,
    /// Ordinals the session assigned, keyed by fetcher item id
    pub ordinals_by_id: HashMap<String, u32>,
    /// Number unmapped rows by position only, ignoring the fetcher's
    /// `playlist_index` (set when the fetcher numbered files from `first_ordinal`)
    pub sequential_ordinals: bool,
}

/// Totals reported when a batch ends
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Requests processed
    pub requests: usize,
    /// Items whose fetcher exited successfully
    pub items_succeeded: usize,
    /// Items that failed (non-zero exit, spawn failure, unusable directory)
    pub items_failed: usize,
    /// Items interrupted by cancellation or timeout
    pub items_cancelled: usize,
    /// Manifest rows written across all request directories
    pub manifest_records: usize,
    /// The batch stopped because of a cancel request
    pub cancelled: bool,
    /// The batch stopped because an item exceeded its timeout
    pub timed_out: bool,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
}

impl BatchSummary {
    pub(crate) fn begin(requests: usize) -> Self {
        let now = Utc::now();
        Self {
            requests,
            items_succeeded: 0,
            items_failed: 0,
            items_cancelled: 0,
            manifest_records: 0,
            cancelled: false,
            timed_out: false,
            started_at: now,
            finished_at: now,
        }
    }

    /// True when nothing failed
    pub fn is_clean(&self) -> bool {
        self.items_failed == 0
    }
}

/// Event emitted by a download session
///
/// Subscribe with [`DownloadSession::subscribe`](crate::DownloadSession::subscribe).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A run started
    BatchStarted {
        /// Number of requests in the batch
        requests: usize,
    },

    /// A request was resolved to its output directory
    RequestResolved {
        /// The request URL
        url: String,
        /// Display name (playlist or channel title)
        display_name: String,
        /// Directory the request's files go to
        directory: PathBuf,
        /// Items to download (for single-invocation collections, 1)
        items: usize,
    },

    /// The fetcher was started for an item
    ItemStarted {
        /// Item URL
        url: String,
        /// Enumerated title
        title: String,
        /// Ordinal the item will be numbered with
        ordinal: u32,
    },

    /// The fetcher began writing a final output file
    FileStarted {
        /// Output file name
        filename: String,
    },

    /// The fetcher skipped an item it already has
    FileAlreadyDownloaded {
        /// Existing file name
        filename: String,
    },

    /// Video and audio were merged into one file
    FileMerged {
        /// Merged file name
        filename: String,
    },

    /// Download progress
    Progress {
        /// Percentage (0.0 to 100.0)
        percent: f64,
        /// Total size in MB, when known
        #[serde(skip_serializing_if = "Option::is_none")]
        total_mb: Option<f64>,
        /// Progress bar position
        current: u64,
        /// Progress bar maximum
        max: u64,
    },

    /// Informational fetcher output (format, resolution)
    Log {
        /// The line as printed
        message: String,
    },

    /// The fetcher finished an item
    ItemCompleted {
        /// Item URL
        url: String,
        /// The item was interrupted by cancellation
        cancelled: bool,
    },

    /// The fetcher failed an item
    ItemFailed {
        /// Item URL
        url: String,
        /// Error message including the stderr tail
        error: String,
    },

    /// An item exceeded the configured timeout; the batch stops
    ItemTimedOut {
        /// Item URL
        url: String,
        /// Timeout that expired, in seconds
        timeout_secs: u64,
    },

    /// A file got its ordinal prefix
    FileRenamed {
        /// Original path
        from: PathBuf,
        /// Numbered path
        to: PathBuf,
    },

    /// A file could not be numbered and keeps its name
    RenameFailed {
        /// The file
        path: PathBuf,
        /// Why
        error: String,
    },

    /// A manifest was written
    ManifestExported {
        /// Manifest file
        path: PathBuf,
        /// Rows written
        records: usize,
    },

    /// Manifest export failed; the metadata log is kept
    ManifestExportFailed {
        /// Request directory
        directory: PathBuf,
        /// Why
        error: String,
    },

    /// Metadata lookup failed; a fallback name or empty list was used
    MetadataFetchFailed {
        /// The URL
        url: String,
        /// Why
        error: String,
    },

    /// Cancellation was requested
    CancelRequested,

    /// A run finished
    BatchComplete {
        /// Totals
        summary: BatchSummary,
    },

    /// The session was shut down
    Shutdown,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_range_rejects_inverted_and_zero_based() {
        assert_eq!(ItemRange::new(2, 4), Some(ItemRange { start: 2, end: 4 }));
        assert_eq!(ItemRange::new(3, 3).map(|r| r.len()), Some(1));
        assert_eq!(ItemRange::new(5, 2), None);
        assert_eq!(ItemRange::new(0, 2), None);
    }

    #[test]
    fn item_range_deserialize_rejects_inverted() {
        let range: ItemRange = serde_json::from_str(r#"{"start":2,"end":5}"#).unwrap();
        assert_eq!((range.start(), range.end(), range.len()), (2, 5, 4));
        assert!(serde_json::from_str::<ItemRange>(r#"{"start":3,"end":2}"#).is_err());
        assert!(serde_json::from_str::<ItemRange>(r#"{"start":0,"end":2}"#).is_err());
    }

    #[test]
    fn inverted_range_selects_everything() {
        let inverted = ItemRange { start: 3, end: 2 };
        assert_eq!(inverted.len(), 0);
        assert!(inverted.is_empty());

        let items: Vec<u32> = (1..=3).collect();
        assert_eq!(crate::fetcher::slice_range(items.clone(), Some(inverted)), items);
        let zero_based = ItemRange { start: 0, end: 2 };
        assert_eq!(crate::fetcher::slice_range(items.clone(), Some(zero_based)), items);
    }

    #[test]
    fn item_range_parse() {
        assert_eq!(ItemRange::parse(" 1 - 10 "), ItemRange::new(1, 10));
        assert_eq!(ItemRange::parse("10-1"), None);
        assert_eq!(ItemRange::parse("abc"), None);
        assert_eq!(ItemRange::parse("3-"), None);
        assert_eq!(ItemRange::new(4, 9).unwrap().to_string(), "4-9");
    }

    #[test]
    fn range_is_dropped_for_single_requests() {
        let single = WorkRequest {
            raw_url: "https://youtu.be/abc".into(),
            kind: WorkKind::Single,
            range: None,
        }
        .with_range(ItemRange::new(1, 2));
        assert_eq!(single.range, None);

        let collection = WorkRequest {
            raw_url: "https://www.youtube.com/playlist?list=PL1".into(),
            kind: WorkKind::Collection,
            range: None,
        }
        .with_range(ItemRange::new(1, 2));
        assert_eq!(collection.range, ItemRange::new(1, 2));
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let json = serde_json::to_value(Event::ItemTimedOut {
            url: "https://youtu.be/abc".into(),
            timeout_secs: 900,
        })
        .unwrap();
        assert_eq!(json["type"], "item_timed_out");
        assert_eq!(json["timeout_secs"], 900);

        let json = serde_json::to_value(Event::CancelRequested).unwrap();
        assert_eq!(json["type"], "cancel_requested");
    }

    #[test]
    fn progress_event_serializes_with_kind_tag() {
        let json = serde_json::to_value(ProgressEvent::PercentUpdate {
            percent: 45.2,
            total_mb: Some(10.0),
            current: 5,
            max: 10,
        })
        .unwrap();
        assert_eq!(json["kind"], "percent_update");
        assert_eq!(json["max"], 10);
    }

    #[test]
    fn url_class_collections() {
        assert!(UrlClass::Playlist.is_collection());
        assert!(UrlClass::Channel.is_collection());
        assert!(!UrlClass::Video.is_collection());
    }
}

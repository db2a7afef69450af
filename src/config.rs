//! Configuration types for media-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::fetcher::PercentPatternSet;

/// Network-hardening flags passed to every fetcher invocation
///
/// All three default to on, matching the behaviour users of the original tool
/// expect. `no_check_certificates` disables TLS certificate validation inside the
/// fetcher; turn it off wherever certificate validation matters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkFlags {
    /// Pass `--no-warnings`
    #[serde(default = "default_true")]
    pub no_warnings: bool,

    /// Pass `--no-call-home`
    #[serde(default = "default_true")]
    pub no_call_home: bool,

    /// Pass `--no-check-certificates`
    #[serde(default = "default_true")]
    pub no_check_certificates: bool,
}

impl Default for NetworkFlags {
    fn default() -> Self {
        Self {
            no_warnings: true,
            no_call_home: true,
            no_check_certificates: true,
        }
    }
}

/// Side outputs and compatibility options requested from every download
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFlags {
    /// Keep a thumbnail image next to each download (`--write-thumbnail`, default: true)
    #[serde(default = "default_true")]
    pub write_thumbnail: bool,

    /// Image format written thumbnails are converted to (default: "png")
    ///
    /// Empty keeps the format the source serves.
    #[serde(default = "default_thumbnail_format")]
    pub thumbnail_format: String,

    /// Pass `--compat-options filename-sanitization` (default: true)
    #[serde(default = "default_true")]
    pub compat_filename_sanitization: bool,
}

impl Default for OutputFlags {
    fn default() -> Self {
        Self {
            write_thumbnail: true,
            thumbnail_format: default_thumbnail_format(),
            compat_filename_sanitization: true,
        }
    }
}

/// External tool settings (fetcher and transcoder)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Path to the yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub binary_path: Option<PathBuf>,

    /// Path to the ffmpeg executable (auto-detected if None, optional)
    #[serde(default)]
    pub transcoder_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Network-hardening flags
    #[serde(default)]
    pub network: NetworkFlags,

    /// Thumbnail and compatibility flags for downloads
    #[serde(default)]
    pub output: OutputFlags,

    /// Explicit cookies file; takes precedence over discovery
    #[serde(default)]
    pub cookies_file: Option<PathBuf>,

    /// File name looked up during cookies discovery (default: "_cookies.txt")
    #[serde(default = "default_cookies_file_name")]
    pub cookies_file_name: String,

    /// Upper bound for one metadata-only invocation (default: 120 seconds)
    #[serde(default = "default_metadata_timeout", with = "duration_serde")]
    pub metadata_timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            transcoder_path: None,
            search_path: true,
            network: NetworkFlags::default(),
            output: OutputFlags::default(),
            cookies_file: None,
            cookies_file_name: default_cookies_file_name(),
            metadata_timeout: default_metadata_timeout(),
        }
    }
}

/// How collection URLs are handed to the fetcher
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStrategy {
    /// Enumerate the collection and invoke the fetcher once per item (default)
    #[default]
    PerItem,
    /// Invoke the fetcher once for the whole collection with a range token
    SingleInvocation,
}

/// Download behavior configuration (file names, numbering, timeouts)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Archive file the fetcher uses to skip completed items (default: "_downloaded.txt")
    #[serde(default = "default_archive_file_name")]
    pub archive_file_name: String,

    /// Per-directory metadata log written by the fetcher (default: "_metadata.jsonl")
    #[serde(default = "default_metadata_log_name")]
    pub metadata_log_name: String,

    /// Manifest file written after each request (default: "_video_list.csv")
    #[serde(default = "default_manifest_file_name")]
    pub manifest_file_name: String,

    /// Prefix joined with an item id to form its canonical URL (default: "https://youtu.be/")
    #[serde(default = "default_canonical_url_base")]
    pub canonical_url_base: String,

    /// Collection handling strategy
    #[serde(default)]
    pub collection_strategy: CollectionStrategy,

    /// Create one sub-directory per request, named after the source (default: true)
    #[serde(default = "default_true")]
    pub group_by_source: bool,

    /// Upper bound for one item download; expiry cancels the batch (default: 15 minutes)
    ///
    /// `None` disables the timeout.
    #[serde(default = "default_item_timeout", with = "optional_duration_serde")]
    pub item_timeout: Option<Duration>,

    /// Time a terminated fetcher gets to exit before it is killed (default: 5 seconds)
    #[serde(default = "default_kill_grace", with = "duration_serde")]
    pub kill_grace: Duration,

    /// Pause between items (default: 1 second)
    #[serde(default = "default_inter_item_delay", with = "millis_serde")]
    pub inter_item_delay: Duration,

    /// Number of trailing stderr lines kept in item failure reports (default: 20)
    #[serde(default = "default_stderr_tail_lines")]
    pub stderr_tail_lines: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            archive_file_name: default_archive_file_name(),
            metadata_log_name: default_metadata_log_name(),
            manifest_file_name: default_manifest_file_name(),
            canonical_url_base: default_canonical_url_base(),
            collection_strategy: CollectionStrategy::default(),
            group_by_source: true,
            item_timeout: default_item_timeout(),
            kill_grace: default_kill_grace(),
            inter_item_delay: default_inter_item_delay(),
            stderr_tail_lines: default_stderr_tail_lines(),
        }
    }
}

/// Progress parsing configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Percent pattern set, tried in order; first match wins
    #[serde(default)]
    pub percent_patterns: PercentPatternSet,
}

/// Retry configuration for transient metadata failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 2)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 2 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Main configuration for a [`DownloadSession`](crate::DownloadSession)
///
/// Fields are organized into logical sub-configs:
/// - [`fetcher`](FetcherConfig) - external binaries, network flags, cookies
/// - [`download`](DownloadConfig) - file names, numbering, timeouts
/// - [`progress`](ProgressConfig) - progress line patterns
/// - [`retry`](RetryConfig) - metadata retry policy
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// External tool settings
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Download behavior settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Progress parsing settings
    #[serde(default)]
    pub progress: ProgressConfig,

    /// Retry policy for metadata fetches
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Load a configuration from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &std::path::Path) -> crate::Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::Config {
                message: format!("cannot read {}: {}", path.display(), e),
                key: None,
            }
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the session cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        let names = [
            ("archive_file_name", &self.download.archive_file_name),
            ("metadata_log_name", &self.download.metadata_log_name),
            ("manifest_file_name", &self.download.manifest_file_name),
            ("cookies_file_name", &self.fetcher.cookies_file_name),
        ];
        for (key, value) in names {
            if value.trim().is_empty() {
                return Err(crate::Error::config("file name must not be empty", key));
            }
            if value.contains(['/', '\\']) {
                return Err(crate::Error::config(
                    "file name must not contain path separators",
                    key,
                ));
            }
        }
        if self.download.stderr_tail_lines == 0 {
            return Err(crate::Error::config(
                "must keep at least one stderr line",
                "stderr_tail_lines",
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(crate::Error::config(
                "backoff multiplier must be >= 1.0",
                "backoff_multiplier",
            ));
        }
        self.progress.percent_patterns.compile()?;
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_cookies_file_name() -> String {
    "_cookies.txt".to_string()
}

fn default_thumbnail_format() -> String {
    "png".to_string()
}

fn default_metadata_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_archive_file_name() -> String {
    "_downloaded.txt".to_string()
}

fn default_metadata_log_name() -> String {
    "_metadata.jsonl".to_string()
}

fn default_manifest_file_name() -> String {
    "_video_list.csv".to_string()
}

fn default_canonical_url_base() -> String {
    "https://youtu.be/".to_string()
}

fn default_item_timeout() -> Option<Duration> {
    Some(Duration::from_secs(15 * 60))
}

fn default_kill_grace() -> Duration {
    Duration::from_secs(5)
}

fn default_inter_item_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_stderr_tail_lines() -> usize {
    20
}

fn default_max_attempts() -> u32 {
    2
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: Option<u64> = Option::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}

// Millisecond Duration helper for short delays
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

//! Parsers for fetcher output
//!
//! [`ProgressParser`] turns the fetcher's streamed progress text into
//! [`ProgressEvent`]s, one line at a time. The only state it keeps is a
//! "completed" latch: once a file reached 100%, was reported as already present,
//! or was merged, further percent lines (post-processing chatter such as
//! thumbnail or audio-extraction progress) no longer drive the progress bar
//! until the next real `Destination:` line.
//!
//! [`parse_metadata_output`] decodes the output of a metadata-only invocation.

use super::traits::MetadataEntry;
use crate::types::ProgressEvent;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str;

/// Exit status of an external command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// The command exited successfully (exit code 0)
    Success,
    /// The command exited with a non-zero exit code
    Failure,
}

impl ExitStatus {
    /// Returns `true` if the exit status represents success
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<bool> for ExitStatus {
    fn from(success: bool) -> Self {
        if success {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

const DESTINATION_MARKER: &str = "Destination:";
const ALREADY_DOWNLOADED_MARKER: &str = "has already been downloaded";
const MERGE_MARKER: &str = "Merging formats into";
const DOWNLOAD_PREFIX: &str = "[download] ";
const INFO_PREFIX: &str = "[info]";
const INFO_KEYWORDS: &[&str] = &["resolution", "height", "format"];

#[allow(clippy::expect_used)]
static INTERMEDIATE_FILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\.f\d+(?:-\w+)?\.[A-Za-z0-9]+$").expect("intermediate pattern is valid")
});

/// One percent pattern
///
/// The regex must contain a `percent` capture group; `size` and `unit` groups
/// are optional and, when both match, give the total size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PercentPattern {
    /// Name used in logs
    pub name: String,
    /// Regular expression source
    pub regex: String,
}

/// Ordered set of percent patterns; the first match wins
///
/// The fetcher's progress format changes between releases. The set is versioned
/// so a configuration written for one format can be recognized, and it can be
/// replaced entirely from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PercentPatternSet {
    /// Format revision this set was written for
    pub version: u32,
    /// Patterns in priority order
    pub patterns: Vec<PercentPattern>,
}

impl Default for PercentPatternSet {
    fn default() -> Self {
        Self {
            version: 1,
            patterns: vec![
                PercentPattern {
                    name: "percent_of_size".to_string(),
                    regex: r"(?P<percent>\d+(?:\.\d+)?)%\s+of\s+~?\s*(?P<size>\d+(?:\.\d+)?)\s*(?P<unit>[KMG]i?B)"
                        .to_string(),
                },
                PercentPattern {
                    name: "bracketed_percent".to_string(),
                    regex: r"^\s*\[[^\]]+\]\s+(?P<percent>\d+(?:\.\d+)?)%".to_string(),
                },
                PercentPattern {
                    name: "bare_percent".to_string(),
                    regex: r"(?P<percent>\d+(?:\.\d+)?)%".to_string(),
                },
            ],
        }
    }
}

impl PercentPatternSet {
    /// Compile every pattern, rejecting invalid regexes and missing `percent` groups
    pub fn compile(&self) -> crate::Result<Vec<Regex>> {
        self.patterns
            .iter()
            .map(|pattern| {
                let regex = Regex::new(&pattern.regex).map_err(|e| {
                    crate::Error::config(
                        format!("percent pattern {:?} is invalid: {}", pattern.name, e),
                        "percent_patterns",
                    )
                })?;
                if !regex.capture_names().any(|name| name == Some("percent")) {
                    return Err(crate::Error::config(
                        format!("percent pattern {:?} has no `percent` group", pattern.name),
                        "percent_patterns",
                    ));
                }
                Ok(regex)
            })
            .collect()
    }
}

type Matcher = fn(&mut ProgressParser, &str) -> Option<ProgressEvent>;

/// Matchers in priority order; the first one that returns an event wins
const MATCHERS: &[Matcher] = &[
    match_destination,
    match_already_downloaded,
    match_merge,
    match_percent,
    match_info,
];

/// Incremental parser for the fetcher's progress lines
#[derive(Debug, Clone)]
pub struct ProgressParser {
    percent_patterns: Vec<Regex>,
    completed: bool,
}

impl Default for ProgressParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressParser {
    /// Parser using the built-in percent patterns
    pub fn new() -> Self {
        Self {
            // The built-in set always compiles
            percent_patterns: PercentPatternSet::default()
                .compile()
                .unwrap_or_default(),
            completed: false,
        }
    }

    /// Parser using a configured pattern set
    pub fn with_patterns(patterns: &PercentPatternSet) -> crate::Result<Self> {
        Ok(Self {
            percent_patterns: patterns.compile()?,
            completed: false,
        })
    }

    /// Whether the current file has been reported complete
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Clear the completed latch (start of a new item)
    pub fn reset(&mut self) {
        self.completed = false;
    }

    /// Classify one line of fetcher output
    pub fn parse_line(&mut self, line: &str) -> ProgressEvent {
        for matcher in MATCHERS {
            if let Some(event) = matcher(self, line) {
                return event;
            }
        }
        unrecognized(line)
    }
}

fn unrecognized(line: &str) -> ProgressEvent {
    ProgressEvent::Unrecognized {
        raw_line: line.to_string(),
    }
}

fn is_intermediate(filename: &str) -> bool {
    INTERMEDIATE_FILE.is_match(filename)
}

fn first_quoted(line: &str) -> Option<&str> {
    let start = line.find('"')? + 1;
    let len = line[start..].find('"')?;
    Some(&line[start..start + len]).filter(|s| !s.trim().is_empty())
}

fn match_destination(parser: &mut ProgressParser, line: &str) -> Option<ProgressEvent> {
    let (_, rest) = line.split_once(DESTINATION_MARKER)?;
    let filename = rest.trim();
    if filename.is_empty() || is_intermediate(filename) {
        return Some(unrecognized(line));
    }
    parser.completed = false;
    Some(ProgressEvent::Started {
        title: filename.to_string(),
    })
}

fn match_already_downloaded(parser: &mut ProgressParser, line: &str) -> Option<ProgressEvent> {
    let marker_at = line.find(ALREADY_DOWNLOADED_MARKER)?;
    let filename = first_quoted(line)
        .map(str::to_string)
        .or_else(|| {
            let head = &line[..marker_at];
            let start = head.find(DOWNLOAD_PREFIX)? + DOWNLOAD_PREFIX.len();
            Some(head[start..].trim().to_string()).filter(|s| !s.is_empty())
        });

    match filename {
        Some(filename) if !is_intermediate(&filename) => {
            parser.completed = true;
            Some(ProgressEvent::AlreadyDownloaded { filename })
        }
        _ => Some(unrecognized(line)),
    }
}

fn match_merge(parser: &mut ProgressParser, line: &str) -> Option<ProgressEvent> {
    let (_, rest) = line.split_once(MERGE_MARKER)?;
    let filename = first_quoted(line)
        .map(str::to_string)
        .unwrap_or_else(|| rest.trim().trim_matches('"').to_string());
    if filename.is_empty() {
        return Some(unrecognized(line));
    }
    parser.completed = true;
    Some(ProgressEvent::MergeComplete { filename })
}

fn size_in_mb(size: f64, unit: &str) -> f64 {
    match unit {
        "GiB" | "GB" => size * 1024.0,
        "KiB" | "KB" => size * 0.001,
        _ => size,
    }
}

fn match_percent(parser: &mut ProgressParser, line: &str) -> Option<ProgressEvent> {
    if parser.completed || !line.contains('%') {
        return None;
    }

    let caps = parser
        .percent_patterns
        .iter()
        .find_map(|regex| regex.captures(line))?;
    let percent: f64 = caps.name("percent")?.as_str().parse().ok()?;

    let total_mb = match (caps.name("size"), caps.name("unit")) {
        (Some(size), Some(unit)) => size
            .as_str()
            .parse::<f64>()
            .ok()
            .map(|size| size_in_mb(size, unit.as_str())),
        _ => None,
    };

    let (current, max) = progress_bar(percent, total_mb);
    if percent >= 100.0 {
        parser.completed = true;
    }

    Some(ProgressEvent::PercentUpdate {
        percent,
        total_mb,
        current,
        max,
    })
}

/// Bar position for a percentage: MB-scaled when the size is at least 1 MB, else 0-100
fn progress_bar(percent: f64, total_mb: Option<f64>) -> (u64, u64) {
    let percent = percent.clamp(0.0, 100.0);
    match total_mb {
        Some(mb) if mb >= 1.0 => {
            let max = mb.floor() as u64;
            let current = ((mb * percent / 100.0).ceil() as u64).min(max);
            (current, max)
        }
        _ => (percent.ceil() as u64, 100),
    }
}

fn match_info(_parser: &mut ProgressParser, line: &str) -> Option<ProgressEvent> {
    if !line.contains(INFO_PREFIX) {
        return None;
    }
    let lower = line.to_lowercase();
    INFO_KEYWORDS
        .iter()
        .any(|keyword| lower.contains(keyword))
        .then(|| ProgressEvent::Info {
            text: line.trim().to_string(),
        })
}

/// Parse the output of a `--flat-playlist --dump-json` invocation
///
/// Each line is decoded independently; lines that are not JSON objects are
/// dropped. A failed invocation that still produced entries is accepted with a
/// warning (the fetcher exits non-zero when a single playlist entry is
/// unavailable).
///
/// # Errors
///
/// Returns [`Error::MetadataFetch`](crate::Error::MetadataFetch) when no entry
/// could be decoded.
pub fn parse_metadata_output(
    url: &str,
    stdout: &[u8],
    stderr: &[u8],
    exit_status: ExitStatus,
) -> crate::Result<Vec<MetadataEntry>> {
    let output = String::from_utf8_lossy(stdout);
    let entries: Vec<MetadataEntry> = output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect();

    let error_output = String::from_utf8_lossy(stderr);
    if entries.is_empty() {
        let stderr = match error_output.trim() {
            "" if exit_status.is_success() => "no metadata entries in fetcher output".to_string(),
            "" => "fetcher exited with an error and no output".to_string(),
            text => text.to_string(),
        };
        return Err(crate::Error::MetadataFetch {
            url: url.to_string(),
            stderr,
        });
    }

    if !exit_status.is_success() {
        tracing::warn!(
            url = %url,
            entries = entries.len(),
            stderr = %error_output.trim(),
            "fetcher reported errors during enumeration, using the entries it listed"
        );
    }

    Ok(entries)
}

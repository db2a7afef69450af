//! Turning URLs into units of work
//!
//! Classification is pure; enumeration and display names go through a
//! [`MetadataSource`] wrapped in the retry policy.

use super::traits::{MetadataEntry, MetadataSource, non_empty};
use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::types::{ItemRange, UrlClass, WorkItem, WorkKind, WorkRequest};
use crate::utils::normalize_url;
use std::path::Path;
use std::sync::Arc;
use url::Url;

/// Fallback display name for playlists whose metadata is unavailable
pub const UNKNOWN_PLAYLIST: &str = "unknown_playlist";
/// Fallback display name for channels whose metadata is unavailable
pub const UNKNOWN_CHANNEL: &str = "unknown_channel";
/// Fallback display name for single items whose metadata is unavailable
pub const UNKNOWN_VIDEO: &str = "unknown_video";

const CHANNEL_PATH_MARKERS: &[&str] = &["/@", "/channel/", "/c/", "/user/"];

fn parse_url(raw_url: &str) -> Result<Url> {
    let normalized = normalize_url(raw_url);
    let url = Url::parse(&normalized).map_err(|e| Error::InvalidUrl {
        url: raw_url.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidUrl {
            url: raw_url.to_string(),
            reason: format!("unsupported scheme {:?}", url.scheme()),
        });
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::InvalidUrl {
            url: raw_url.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(url)
}

/// Classify a URL as video, playlist or channel
///
/// ```
/// use media_dl::fetcher::classify;
/// use media_dl::UrlClass;
///
/// assert_eq!(classify("https://www.youtube.com/playlist?list=PL1").unwrap(), UrlClass::Playlist);
/// assert_eq!(classify("www.youtube.com/@someone").unwrap(), UrlClass::Channel);
/// assert_eq!(classify("https://youtu.be/abc").unwrap(), UrlClass::Video);
/// ```
pub fn classify(raw_url: &str) -> Result<UrlClass> {
    let url = parse_url(raw_url)?;
    Ok(classify_parsed(&url))
}

fn classify_parsed(url: &Url) -> UrlClass {
    let has_list = url
        .query_pairs()
        .any(|(key, value)| key == "list" && !value.is_empty());
    if has_list {
        return UrlClass::Playlist;
    }
    let path = url.path();
    if CHANNEL_PATH_MARKERS.iter().any(|marker| path.contains(marker)) {
        return UrlClass::Channel;
    }
    UrlClass::Video
}

/// Build a request for a URL; the range is "all" until set with
/// [`WorkRequest::with_range`]
pub fn resolve(raw_url: &str) -> Result<WorkRequest> {
    let url = parse_url(raw_url)?;
    let kind = if classify_parsed(&url).is_collection() {
        WorkKind::Collection
    } else {
        WorkKind::Single
    };
    Ok(WorkRequest {
        raw_url: normalize_url(raw_url),
        kind,
        range: None,
    })
}

/// Keep the entries inside `range` (1-based, inclusive), clamped to the list
///
/// A zero-based or inverted range selects everything.
pub fn slice_range<T>(items: Vec<T>, range: Option<ItemRange>) -> Vec<T> {
    let Some(range) = range.filter(ItemRange::is_valid) else {
        return items;
    };
    let len = items.len();
    let start = (range.start() as usize).saturating_sub(1).min(len);
    let end = (range.end() as usize).min(len);
    items
        .into_iter()
        .skip(start)
        .take(end.saturating_sub(start))
        .collect()
}

/// Items for a collection's entries, numbered by position
pub fn items_from_entries(entries: &[MetadataEntry]) -> Vec<WorkItem> {
    entries
        .iter()
        .zip(1u32..)
        .filter_map(|(entry, ordinal_index)| {
            let source_url = entry.item_url()?;
            Some(WorkItem {
                source_url,
                display_title: entry.title.clone().unwrap_or_default(),
                ordinal_index,
                id: non_empty(&entry.id).map(str::to_string),
                duration: non_empty(&entry.duration_string).map(str::to_string),
                upload_date: non_empty(&entry.upload_date).map(str::to_string),
                thumbnail: entry.thumbnail_url(),
            })
        })
        .collect()
}

/// Display name for a URL's first metadata entry, with class-specific fallbacks
pub fn display_name_from(class: UrlClass, entry: Option<&MetadataEntry>) -> String {
    let fallback = match class {
        UrlClass::Playlist => UNKNOWN_PLAYLIST,
        UrlClass::Channel => UNKNOWN_CHANNEL,
        UrlClass::Video => UNKNOWN_VIDEO,
    };
    let Some(entry) = entry else {
        return fallback.to_string();
    };
    let chain = match class {
        UrlClass::Playlist | UrlClass::Channel => {
            [&entry.playlist_title, &entry.channel, &entry.uploader]
        }
        UrlClass::Video => [&entry.channel, &entry.uploader, &entry.title],
    };
    chain
        .into_iter()
        .find_map(non_empty)
        .unwrap_or(fallback)
        .to_string()
}

/// Resolves requests into items and display names through a metadata source
#[derive(Clone)]
pub struct WorkResolver {
    source: Arc<dyn MetadataSource>,
    retry: RetryConfig,
}

impl WorkResolver {
    /// Create a resolver over `source`
    pub fn new(source: Arc<dyn MetadataSource>, retry: RetryConfig) -> Self {
        Self { source, retry }
    }

    async fn fetch(&self, url: &str, cookies: Option<&Path>) -> Result<Vec<MetadataEntry>> {
        with_retry(&self.retry, || self.source.fetch_metadata(url, cookies)).await
    }

    /// Expand a request into the items to download, honouring its range
    ///
    /// Single requests produce one item without invoking the fetcher.
    pub async fn enumerate(
        &self,
        request: &WorkRequest,
        cookies: Option<&Path>,
    ) -> Result<Vec<WorkItem>> {
        if request.kind == WorkKind::Single {
            return Ok(vec![WorkItem {
                source_url: request.raw_url.clone(),
                display_title: String::new(),
                ordinal_index: 1,
                ..WorkItem::default()
            }]);
        }

        let entries = self.fetch(&request.raw_url, cookies).await?;
        let items = slice_range(items_from_entries(&entries), request.range);
        tracing::info!(
            url = %request.raw_url,
            listed = entries.len(),
            selected = items.len(),
            range = ?request.range,
            source = self.source.name(),
            "collection enumerated"
        );
        Ok(items)
    }

    /// Human-readable name for a URL, surfacing metadata failures
    ///
    /// Callers that need a name regardless should fall back to
    /// [`fallback_display_name`] on error.
    pub async fn try_display_name(&self, url: &str, cookies: Option<&Path>) -> Result<String> {
        let class = classify(url)?;
        let entries = self.fetch(url, cookies).await?;
        Ok(display_name_from(class, entries.first()))
    }

    /// Human-readable name for a URL; never fails
    pub async fn resolve_display_name(&self, url: &str, cookies: Option<&Path>) -> String {
        match self.try_display_name(url, cookies).await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "metadata unavailable, using fallback name");
                fallback_display_name(url)
            }
        }
    }
}

/// Class-specific fallback name; unclassifiable URLs count as videos
pub fn fallback_display_name(url: &str) -> String {
    let class = classify(url).unwrap_or(UrlClass::Video);
    display_name_from(class, None)
}

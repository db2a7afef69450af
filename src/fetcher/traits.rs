//! Traits and types for the fetcher's metadata-only mode

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;

/// One JSON object printed by `--flat-playlist --dump-json`
///
/// Only the fields media-dl consumes are modelled; everything else the fetcher
/// prints is ignored. All fields are optional because flat entries, channel tabs
/// and single videos each carry a different subset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MetadataEntry {
    /// Item id (the video id for YouTube)
    #[serde(default)]
    pub id: Option<String>,
    /// Item title
    #[serde(default)]
    pub title: Option<String>,
    /// Item URL (flat entries)
    #[serde(default)]
    pub url: Option<String>,
    /// Item page URL (full extraction)
    #[serde(default)]
    pub webpage_url: Option<String>,
    /// Title of the enclosing playlist
    #[serde(default)]
    pub playlist_title: Option<String>,
    /// Channel name
    #[serde(default)]
    pub channel: Option<String>,
    /// Uploader name
    #[serde(default)]
    pub uploader: Option<String>,
    /// 1-based position inside the enclosing playlist
    #[serde(default)]
    pub playlist_index: Option<u32>,
    /// Human-readable duration, e.g. `"3:25"`
    #[serde(default)]
    pub duration_string: Option<String>,
    /// Upload date as `YYYYMMDD`
    #[serde(default)]
    pub upload_date: Option<String>,
    /// Preferred thumbnail URL (full extraction)
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Available thumbnails, smallest first (flat entries)
    #[serde(default)]
    pub thumbnails: Option<Vec<ThumbnailRef>>,
}

/// One entry of a metadata object's `thumbnails` list
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ThumbnailRef {
    /// Image URL
    #[serde(default)]
    pub url: Option<String>,
}

impl MetadataEntry {
    /// URL that downloads exactly this entry
    ///
    /// Prefers the page URL, then the flat entry URL, then a watch URL built from
    /// the id.
    pub fn item_url(&self) -> Option<String> {
        non_empty(&self.webpage_url)
            .or_else(|| non_empty(&self.url))
            .map(str::to_string)
            .or_else(|| {
                non_empty(&self.id).map(|id| format!("https://www.youtube.com/watch?v={id}"))
            })
    }

    /// Thumbnail URL: the preferred one, else the last (largest) listed
    pub fn thumbnail_url(&self) -> Option<String> {
        non_empty(&self.thumbnail)
            .or_else(|| {
                self.thumbnails
                    .iter()
                    .flatten()
                    .rev()
                    .find_map(|t| non_empty(&t.url))
            })
            .map(str::to_string)
    }
}

pub(crate) fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Source of item metadata for a URL
///
/// The CLI implementation runs the fetcher in metadata-only mode; tests use
/// in-memory fakes.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// List the entries behind `url`, in the order the fetcher emits them
    ///
    /// # Errors
    ///
    /// Returns [`Error::MetadataFetch`](crate::Error::MetadataFetch) when the
    /// invocation fails and yields no decodable entry, and
    /// [`Error::NotSupported`](crate::Error::NotSupported) when no fetcher is
    /// available.
    async fn fetch_metadata(
        &self,
        url: &str,
        cookies: Option<&Path>,
    ) -> crate::Result<Vec<MetadataEntry>>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

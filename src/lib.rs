//! # media-dl
//!
//! Download orchestration around the external `yt-dlp` fetcher and `ffmpeg`
//! transcoder.
//!
//! ## Design Philosophy
//!
//! media-dl is designed to be:
//! - **Library-first** - the `media-dl` binary is a thin host over the crate
//! - **Sequential and predictable** - one fetcher process at a time, items in
//!   enumeration order, numbered files and a manifest per source
//! - **Event-driven** - consumers subscribe to events, no polling required
//! - **Cancellable** - cancel requests and timeouts terminate the live fetcher
//!   and still leave a consistent directory behind
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{Config, DownloadMode, DownloadOptions, DownloadSession, ItemRange};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = DownloadSession::new(Config::default())?;
//!
//!     // Subscribe to events
//!     let mut events = session.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let requests = vec![
//!         media_dl::fetcher::resolve("https://youtu.be/dQw4w9WgXcQ")?,
//!         media_dl::fetcher::resolve("https://www.youtube.com/playlist?list=PL123")?
//!             .with_range(ItemRange::new(1, 5)),
//!     ];
//!     let mut options = DownloadOptions::new("./downloads");
//!     options.mode = DownloadMode::AudioOnly;
//!
//!     let summary = session.start(requests, options).await?;
//!     println!("{} items downloaded", summary.items_succeeded);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// External fetcher integration: resolution, arguments, progress parsing
pub mod fetcher;
/// Renumbering and manifest export
pub mod post_processing;
/// Retry logic with exponential backoff
pub mod retry;
/// Download session (decomposed into focused submodules)
pub mod session;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{CollectionStrategy, Config};
pub use error::{DownloadError, Error, PostProcessError, Result};
pub use session::DownloadSession;
pub use types::{
    BatchSummary, DownloadMode, DownloadOptions, Event, ItemRange, ManifestContext,
    ManifestRecord, ProgressEvent, SessionState, UrlClass, WorkItem, WorkKind, WorkRequest,
};

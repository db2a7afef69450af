//! Everything that talks to, or about, the external fetcher
//!
//! ## Architecture
//!
//! - [`classify`], [`resolve`] and [`WorkResolver`]: URL classification,
//!   collection enumeration and display names
//! - [`MetadataSource`]: trait seam over the fetcher's metadata-only mode, with
//!   [`CliFetcher`] as the real implementation
//! - [`build_download_args`] / [`build_collection_args`]: pure argument
//!   construction
//! - [`LossyLinesCodec`]: byte stream to line framing for the fetcher's stdout
//! - [`ProgressParser`]: line to [`ProgressEvent`](crate::ProgressEvent)
//! - [`discover_cookies`]: cookies file lookup
//!
//! ## Usage
//!
//! ```no_run
//! use media_dl::fetcher::{CliFetcher, WorkResolver, resolve};
//! use media_dl::config::RetryConfig;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = Arc::new(CliFetcher::from_path().expect("yt-dlp not found"));
//!     let resolver = WorkResolver::new(fetcher, RetryConfig::default());
//!
//!     let request = resolve("https://www.youtube.com/playlist?list=PL123")?;
//!     for item in resolver.enumerate(&request, None).await? {
//!         println!("{:>3} {}", item.ordinal_index, item.display_title);
//!     }
//!     Ok(())
//! }
//! ```

mod args;
mod cli;
mod cookies;
mod lines;
mod parser;
mod resolver;
mod traits;

pub use args::{
    ArgContext, DEFAULT_TEMPLATE, METADATA_PRINT_TEMPLATE, build_collection_args,
    build_download_args, effective_template, has_ordinal_placeholder, render_template,
};
pub use cli::{CliFetcher, FETCHER_PROGRAM, TRANSCODER_PROGRAM};
pub use cookies::{cookie_candidates, discover_cookies};
pub use lines::LossyLinesCodec;
pub use parser::{
    ExitStatus, PercentPattern, PercentPatternSet, ProgressParser, parse_metadata_output,
};
pub use resolver::{
    UNKNOWN_CHANNEL, UNKNOWN_PLAYLIST, UNKNOWN_VIDEO, WorkResolver, classify,
    display_name_from, fallback_display_name, items_from_entries, resolve, slice_range,
};
pub use traits::{MetadataEntry, MetadataSource, ThumbnailRef};

//! Argument construction for fetcher download invocations
//!
//! Everything here is pure: whatever needed I/O to discover (cookies file,
//! transcoder location) arrives through [`ArgContext`].

use crate::config::{Config, NetworkFlags, OutputFlags};
use crate::types::{DownloadMode, DownloadOptions, ItemRange};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::path::PathBuf;

/// Output template used when the configured one is unusable
pub const DEFAULT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Metadata the fetcher appends to the metadata log after moving each file
pub const METADATA_PRINT_TEMPLATE: &str = "%(.{title,id,playlist_index})j";

const VIDEO_FORMAT: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";
const AUDIO_FORMAT: &str = "bestaudio/best";

#[allow(clippy::expect_used)]
static ORDINAL_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%\(number\)0*(\d*)d").expect("placeholder pattern is valid"));

/// Inputs to argument construction that required I/O or configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgContext {
    /// Archive file name, relative to the working directory
    pub archive_file: String,
    /// Metadata log file name, relative to the working directory
    pub metadata_log: String,
    /// Network-hardening flags
    pub network: NetworkFlags,
    /// Thumbnail and compatibility flags
    pub output: OutputFlags,
    /// Discovered cookies file
    pub cookies: Option<PathBuf>,
    /// Discovered transcoder binary
    pub transcoder: Option<PathBuf>,
}

impl ArgContext {
    /// Context with the configured file names and flags, nothing discovered yet
    pub fn from_config(config: &Config) -> Self {
        Self {
            archive_file: config.download.archive_file_name.clone(),
            metadata_log: config.download.metadata_log_name.clone(),
            network: config.fetcher.network,
            output: config.fetcher.output.clone(),
            cookies: None,
            transcoder: None,
        }
    }
}

impl Default for ArgContext {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// The template actually handed to the fetcher
///
/// Blank templates and templates with NUL or line breaks fall back to
/// [`DEFAULT_TEMPLATE`].
pub fn effective_template(template: &str) -> &str {
    if template.trim().is_empty() || template.contains(['\0', '\n', '\r']) {
        DEFAULT_TEMPLATE
    } else {
        template
    }
}

/// Whether the template numbers files itself
pub fn has_ordinal_placeholder(template: &str) -> bool {
    ORDINAL_PLACEHOLDER.is_match(effective_template(template))
}

fn placeholder_width(caps: &Captures<'_>) -> usize {
    caps.get(1)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Replace every `%(number)<width>d` placeholder with the zero-padded ordinal
///
/// ```
/// use media_dl::fetcher::render_template;
///
/// assert_eq!(render_template("%(number)03d - %(title)s.%(ext)s", 7), "007 - %(title)s.%(ext)s");
/// assert_eq!(render_template("%(number)d %(title)s.%(ext)s", 7), "7 %(title)s.%(ext)s");
/// ```
pub fn render_template(template: &str, ordinal: u32) -> String {
    ORDINAL_PLACEHOLDER
        .replace_all(effective_template(template), |caps: &Captures<'_>| {
            let width = placeholder_width(caps);
            format!("{ordinal:0width$}")
        })
        .into_owned()
}

/// Translate ordinal placeholders into the fetcher's own autonumber field
fn autonumber_template(template: &str) -> String {
    ORDINAL_PLACEHOLDER
        .replace_all(effective_template(template), |caps: &Captures<'_>| {
            match placeholder_width(caps) {
                0 => "%(autonumber)d".to_string(),
                width => format!("%(autonumber)0{width}d"),
            }
        })
        .into_owned()
}

fn push_format_args(args: &mut Vec<String>, options: &DownloadOptions) {
    match options.mode {
        DownloadMode::AudioOnly => {
            args.extend(
                [
                    "-f",
                    AUDIO_FORMAT,
                    "-x",
                    "--audio-format",
                    "mp3",
                    "--audio-quality",
                    "0",
                ]
                .map(String::from),
            );
        }
        DownloadMode::Video => {
            args.extend(
                ["-f", VIDEO_FORMAT, "--merge-output-format", "mp4"].map(String::from),
            );
            if options.include_thumbnail {
                args.push("--embed-thumbnail".to_string());
            }
        }
    }
}

fn push_output_args(args: &mut Vec<String>, output: &OutputFlags) {
    if output.write_thumbnail {
        args.push("--write-thumbnail".to_string());
        let format = output.thumbnail_format.trim();
        if !format.is_empty() {
            args.push("--convert-thumbnails".to_string());
            args.push(format.to_string());
        }
    }
    if output.compat_filename_sanitization {
        args.push("--compat-options".to_string());
        args.push("filename-sanitization".to_string());
    }
}

fn push_common_args(args: &mut Vec<String>, range: Option<ItemRange>, context: &ArgContext) {
    if let Some(range) = range.filter(ItemRange::is_valid) {
        args.push("--playlist-items".to_string());
        args.push(range.to_string());
    }

    push_output_args(args, &context.output);

    args.push("--download-archive".to_string());
    args.push(context.archive_file.clone());

    if context.network.no_warnings {
        args.push("--no-warnings".to_string());
    }
    if context.network.no_call_home {
        args.push("--no-call-home".to_string());
    }
    if context.network.no_check_certificates {
        args.push("--no-check-certificates".to_string());
    }

    if let Some(cookies) = &context.cookies {
        args.push("--cookies".to_string());
        args.push(cookies.to_string_lossy().into_owned());
    }

    args.push("--newline".to_string());
    args.push("--print-to-file".to_string());
    args.push(format!("after_move:{METADATA_PRINT_TEMPLATE}"));
    args.push(context.metadata_log.clone());

    if let Some(transcoder) = &context.transcoder {
        args.push("--ffmpeg-location".to_string());
        args.push(transcoder.to_string_lossy().into_owned());
    }
}

/// Arguments for downloading one item (the URL is appended by the caller)
pub fn build_download_args(
    options: &DownloadOptions,
    range: Option<ItemRange>,
    ordinal: u32,
    context: &ArgContext,
) -> Vec<String> {
    let mut args = Vec::with_capacity(24);
    push_format_args(&mut args, options);
    args.push("-o".to_string());
    args.push(render_template(&options.filename_template, ordinal));
    push_common_args(&mut args, range, context);
    args
}

/// Arguments for downloading a whole collection in one invocation
///
/// Ordinal placeholders become the fetcher's `%(autonumber)` counter starting at
/// `first_ordinal`.
pub fn build_collection_args(
    options: &DownloadOptions,
    range: Option<ItemRange>,
    first_ordinal: u32,
    context: &ArgContext,
) -> Vec<String> {
    let mut args = Vec::with_capacity(26);
    push_format_args(&mut args, options);
    args.push("-o".to_string());
    args.push(autonumber_template(&options.filename_template));
    if has_ordinal_placeholder(&options.filename_template) {
        args.push("--autonumber-start".to_string());
        args.push(first_ordinal.to_string());
    }
    push_common_args(&mut args, range, context);
    args
}

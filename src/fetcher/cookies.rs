//! Cookies file discovery
//!
//! The fetcher needs a Netscape-format cookies file for age-restricted or
//! members-only items. Users drop it next to their downloads, so media-dl looks
//! in a few well-known places instead of requiring a path.

use crate::config::FetcherConfig;
use std::path::{Path, PathBuf};

/// Directory name under the user data directory
const APP_DIR_NAME: &str = "media-dl";

/// Candidate locations, in lookup order
///
/// 1. the configured `cookies_file`
/// 2. `destination/<name>`
/// 3. `destination/../<name>`
/// 4. `<cwd>/<name>`
/// 5. `<user data dir>/media-dl/<name>`
pub fn cookie_candidates(config: &FetcherConfig, destination: &Path) -> Vec<PathBuf> {
    let name = config.cookies_file_name.as_str();
    let mut candidates = Vec::with_capacity(5);

    if let Some(explicit) = &config.cookies_file {
        candidates.push(explicit.clone());
    }
    candidates.push(destination.join(name));
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        candidates.push(parent.join(name));
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join(name));
    }
    if let Some(data_dir) = dirs::data_dir() {
        candidates.push(data_dir.join(APP_DIR_NAME).join(name));
    }

    candidates.dedup();
    candidates
}

/// First existing cookies file, if any
///
/// The returned path is absolute: downloads run with the request directory as
/// their working directory, so a relative path would resolve elsewhere. A
/// configured path that does not exist is reported and skipped.
pub fn discover_cookies(config: &FetcherConfig, destination: &Path) -> Option<PathBuf> {
    if let Some(explicit) = &config.cookies_file
        && !explicit.is_file()
    {
        tracing::warn!(path = %explicit.display(), "configured cookies file does not exist");
    }

    let found = cookie_candidates(config, destination)
        .into_iter()
        .find(|candidate| candidate.is_file())
        .map(|path| std::path::absolute(&path).unwrap_or(path));

    match &found {
        Some(path) => tracing::debug!(path = %path.display(), "using cookies file"),
        None => tracing::debug!("no cookies file found"),
    }
    found
}

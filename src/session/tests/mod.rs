//! Session tests driving the scripted fake fetcher
#![cfg(unix)]

use super::DownloadSession;
use super::test_helpers::{
    create_test_session, create_test_session_with, drain, file_names, wait_for_fetcher,
};
use crate::config::CollectionStrategy;
use crate::error::Error;
use crate::fetcher::resolve;
use crate::types::{DownloadOptions, Event, ItemRange, WorkRequest};
use serial_test::serial;
use std::path::Path;
use std::time::{Duration, Instant};

mod control;

fn requests(urls: &[&str]) -> Vec<WorkRequest> {
    urls.iter().map(|url| resolve(url).unwrap()).collect()
}

fn options(dest: &Path) -> DownloadOptions {
    DownloadOptions::new(dest)
}

/// Start a batch on a background task
fn spawn_start(
    session: &DownloadSession,
    requests: Vec<WorkRequest>,
    dest: &Path,
) -> tokio::task::JoinHandle<crate::Result<crate::BatchSummary>> {
    let runner = session.clone();
    let options = options(dest);
    tokio::spawn(async move { runner.start(requests, options).await })
}

//! Download session: the stateful orchestrator around the fetcher.
//!
//! The `DownloadSession` struct and its methods are organized by concern:
//! - [`run`] - batch and per-request orchestration (`start`)
//! - [`item`] - one fetcher invocation: spawn, stream, timeout, terminate
//! - [`control`] - cancellation surface
//! - [`lifecycle`] - shutdown coordination for hosts

mod control;
mod item;
mod lifecycle;
mod run;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::error::Result;
use crate::fetcher::{CliFetcher, MetadataSource, WorkResolver};
use crate::post_processing::{CsvManifestWriter, ManifestWriter, PostProcessor};
use crate::types::{Event, SessionState};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio_util::sync::CancellationToken;

/// Live state shared between the running batch and control calls
///
/// Every field is independently synchronized; no lock is held across an await.
#[derive(Clone)]
pub(crate) struct SessionControl {
    /// A run is active
    pub(crate) running: Arc<AtomicBool>,
    /// Cancellation was requested and not yet reset
    pub(crate) cancel_requested: Arc<AtomicBool>,
    /// Token observed by the live item; replaced on reset
    pub(crate) cancel_token: Arc<std::sync::Mutex<CancellationToken>>,
    /// Process id of the live fetcher, 0 when none
    pub(crate) current_pid: Arc<AtomicU32>,
    /// Ordinal the next item will receive
    pub(crate) next_ordinal: Arc<AtomicU32>,
}

impl SessionControl {
    fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            cancel_requested: Arc::new(AtomicBool::new(false)),
            cancel_token: Arc::new(std::sync::Mutex::new(CancellationToken::new())),
            current_pid: Arc::new(AtomicU32::new(0)),
            next_ordinal: Arc::new(AtomicU32::new(1)),
        }
    }

    /// Clone of the current cancellation token
    pub(crate) fn token(&self) -> CancellationToken {
        self.cancel_token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// A download session (cloneable - all fields are Arc-wrapped)
///
/// Only one run may be active per session; a second [`start`](Self::start)
/// while running fails with [`Error::SessionAlreadyRunning`](crate::Error::SessionAlreadyRunning).
#[derive(Clone)]
pub struct DownloadSession {
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Fetcher used for download invocations
    pub(crate) fetcher: Arc<CliFetcher>,
    /// Enumeration and display names
    pub(crate) resolver: WorkResolver,
    /// Renumbering and manifest export
    pub(crate) post_processor: Arc<PostProcessor>,
    /// Live state
    pub(crate) control: SessionControl,
}

impl DownloadSession {
    /// Create a session with the external fetcher located from configuration
    ///
    /// The fetcher doubles as the metadata source, and manifests are written as
    /// CSV.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or no fetcher binary can
    /// be found.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let fetcher = CliFetcher::from_config(&config.fetcher)?;
        let metadata: Arc<dyn MetadataSource> = Arc::new(fetcher.clone());
        let writer: Arc<dyn ManifestWriter> = Arc::new(CsvManifestWriter::new(
            config.download.manifest_file_name.clone(),
        ));
        Self::with_components(config, fetcher, metadata, writer)
    }

    /// Create a session from explicit collaborators
    pub fn with_components(
        config: Config,
        fetcher: CliFetcher,
        metadata: Arc<dyn MetadataSource>,
        writer: Arc<dyn ManifestWriter>,
    ) -> Result<Self> {
        config.validate()?;

        // Buffer size of 1000 events; slow subscribers lag instead of blocking
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);
        let config = Arc::new(config);
        let resolver = WorkResolver::new(metadata, config.retry.clone());
        let post_processor = Arc::new(PostProcessor::new(
            event_tx.clone(),
            config.clone(),
            writer,
        ));

        Ok(Self {
            event_tx,
            config,
            fetcher: Arc::new(fetcher),
            resolver,
            post_processor,
            control: SessionControl::new(),
        })
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Snapshot of the live state
    pub fn state(&self) -> SessionState {
        let pid = self.control.current_pid.load(Ordering::SeqCst);
        SessionState {
            is_running: self.control.running.load(Ordering::SeqCst),
            cancel_requested: self.control.cancel_requested.load(Ordering::SeqCst),
            current_pid: (pid != 0).then_some(pid),
            next_ordinal: self.control.next_ordinal.load(Ordering::SeqCst),
        }
    }

    /// Whether a run is active
    pub fn is_running(&self) -> bool {
        self.control.running.load(Ordering::SeqCst)
    }

    /// Session configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn emit(&self, event: Event) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }
}

//! Batch orchestration: requests to directories, items to invocations.

use crate::config::CollectionStrategy;
use crate::error::{DownloadError, Error, Result};
use crate::fetcher::{
    ArgContext, build_collection_args, build_download_args, discover_cookies,
    fallback_display_name, has_ordinal_placeholder,
};
use crate::types::{
    BatchSummary, DownloadOptions, Event, ManifestContext, WorkItem, WorkKind, WorkRequest,
};
use crate::utils::{next_ordinal_in, sanitize_file_name};
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::DownloadSession;
use super::item::ItemOutcome;

/// Set while any session in the process is running a batch
///
/// Runs in one process share the download archive and the working directory
/// of the fetcher, so only one may be active at a time.
static PROCESS_RUN_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Clears the session and process running flags however `start` returns
struct RunningGuard(Arc<AtomicBool>);

impl RunningGuard {
    fn claim(session_running: &Arc<AtomicBool>) -> Option<Self> {
        PROCESS_RUN_ACTIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        session_running.store(true, Ordering::SeqCst);
        Some(Self(session_running.clone()))
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
        PROCESS_RUN_ACTIVE.store(false, Ordering::SeqCst);
    }
}

impl DownloadSession {
    /// Download every request into `options.destination_dir`
    ///
    /// Requests and their items run strictly one after another. Item failures
    /// are reported as events and counted in the returned summary; the batch
    /// continues. A cancel request (or an item timeout) stops the batch after
    /// the current item has been post-processed. The batch always ends with
    /// [`Event::BatchComplete`].
    ///
    /// # Errors
    ///
    /// - [`Error::SessionAlreadyRunning`] when a run is already active in this
    ///   process, on this or any other session (the running batch is unaffected)
    /// - [`Error::Io`] when the destination directory cannot be created
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use media_dl::*;
    /// # async fn example() -> Result<()> {
    /// let session = DownloadSession::new(Config::default())?;
    /// let request = fetcher::resolve("https://www.youtube.com/playlist?list=PL123")?
    ///     .with_range(ItemRange::new(1, 10));
    /// let summary = session
    ///     .start(vec![request], DownloadOptions::new("./downloads"))
    ///     .await?;
    /// println!("{} downloaded, {} failed", summary.items_succeeded, summary.items_failed);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn start(
        &self,
        requests: Vec<WorkRequest>,
        options: DownloadOptions,
    ) -> Result<BatchSummary> {
        let Some(_running) = RunningGuard::claim(&self.control.running) else {
            tracing::warn!("start called while a batch is running");
            return Err(Error::SessionAlreadyRunning);
        };

        let mut summary = BatchSummary::begin(requests.len());
        tracing::info!(
            requests = requests.len(),
            dest = %options.destination_dir.display(),
            mode = ?options.mode,
            "batch started"
        );
        self.emit(Event::BatchStarted {
            requests: requests.len(),
        });

        if let Err(e) = tokio::fs::create_dir_all(&options.destination_dir).await {
            tracing::error!(
                dest = %options.destination_dir.display(),
                error = %e,
                "cannot create destination directory"
            );
            summary.finished_at = Utc::now();
            self.emit(Event::BatchComplete { summary });
            return Err(Error::Io(e));
        }

        for request in &requests {
            if self.is_cancel_requested() {
                tracing::info!(url = %request.raw_url, "cancel requested, skipping remaining requests");
                break;
            }
            self.run_request(request, &options, &mut summary).await;
        }

        summary.cancelled = self.is_cancel_requested();
        summary.finished_at = Utc::now();
        tracing::info!(
            succeeded = summary.items_succeeded,
            failed = summary.items_failed,
            cancelled_items = summary.items_cancelled,
            manifest_records = summary.manifest_records,
            cancelled = summary.cancelled,
            timed_out = summary.timed_out,
            "batch complete"
        );
        self.emit(Event::BatchComplete {
            summary: summary.clone(),
        });
        Ok(summary)
    }

    /// Resolve one request, download its items, post-process its directory
    async fn run_request(
        &self,
        request: &WorkRequest,
        options: &DownloadOptions,
        summary: &mut BatchSummary,
    ) {
        let download = &self.config.download;
        let url = request.raw_url.as_str();

        let (display_name, request_dir) = self.request_directory(request, options).await;
        if let Err(e) = tokio::fs::create_dir_all(&request_dir).await {
            let error = DownloadError::DestinationUnavailable {
                path: request_dir.clone(),
                reason: e.to_string(),
            };
            tracing::warn!(url = %url, error = %error, "skipping request");
            summary.items_failed += 1;
            self.emit(Event::ItemFailed {
                url: url.to_string(),
                error: error.to_string(),
            });
            return;
        }

        let context = ArgContext {
            cookies: discover_cookies(&self.config.fetcher, &request_dir),
            transcoder: self.fetcher.transcoder_path().map(Path::to_path_buf),
            ..ArgContext::from_config(&self.config)
        };

        let single_invocation = request.kind == WorkKind::Collection
            && download.collection_strategy == CollectionStrategy::SingleInvocation;
        let items = if single_invocation {
            vec![WorkItem {
                source_url: url.to_string(),
                display_title: display_name.clone(),
                ordinal_index: 1,
                ..WorkItem::default()
            }]
        } else {
            match self
                .resolver
                .enumerate(request, context.cookies.as_deref())
                .await
            {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "cannot enumerate collection");
                    summary.items_failed += 1;
                    self.emit(Event::MetadataFetchFailed {
                        url: url.to_string(),
                        error: e.to_string(),
                    });
                    Vec::new()
                }
            }
        };

        let first_ordinal = next_ordinal_in(&request_dir);
        self.control
            .next_ordinal
            .store(first_ordinal, Ordering::SeqCst);
        tracing::info!(
            url = %url,
            name = %display_name,
            dir = %request_dir.display(),
            items = items.len(),
            first_ordinal,
            single_invocation,
            "request resolved"
        );
        self.emit(Event::RequestResolved {
            url: url.to_string(),
            display_name,
            directory: request_dir.clone(),
            items: items.len(),
        });

        let numbered_by_template = has_ordinal_placeholder(&options.filename_template);
        let mut manifest = ManifestContext {
            first_ordinal,
            ordinals_by_id: HashMap::new(),
            sequential_ordinals: single_invocation,
        };
        let mut next_ordinal = first_ordinal;

        for (index, item) in items.iter().enumerate() {
            if index > 0 {
                self.pause_between_items().await;
            }
            if self.is_cancel_requested() {
                tracing::info!(url = %url, remaining = items.len() - index, "cancel requested, stopping");
                break;
            }

            let ordinal = next_ordinal;
            let args = if single_invocation {
                build_collection_args(options, request.range, ordinal, &context)
            } else {
                build_download_args(options, None, ordinal, &context)
            };

            let run = self.run_item(item, &args, &request_dir, ordinal).await;
            self.record_outcome(item, run.outcome, summary);

            next_ordinal = if !numbered_by_template {
                self.post_processor
                    .renumber_and_finalize(&request_dir, &run.produced, ordinal)
                    .await
            } else if single_invocation {
                // The fetcher numbered the files itself
                next_ordinal_in(&request_dir).max(ordinal)
            } else {
                ordinal.saturating_add(1)
            };

            if let Some(id) = item.id.as_ref().filter(|_| next_ordinal > ordinal) {
                manifest
                    .ordinals_by_id
                    .insert(id.clone(), next_ordinal - 1);
            }
            self.control
                .next_ordinal
                .store(next_ordinal, Ordering::SeqCst);
        }

        // Also after cancellation: whatever finished gets its manifest rows
        if let Ok(records) = self
            .post_processor
            .export_manifest(&request_dir, &manifest)
            .await
        {
            summary.manifest_records += records;
        }
    }

    /// Display name and output directory for a request
    ///
    /// Metadata failures fall back to a class-specific name and are reported as
    /// [`Event::MetadataFetchFailed`].
    async fn request_directory(
        &self,
        request: &WorkRequest,
        options: &DownloadOptions,
    ) -> (String, PathBuf) {
        let base = &options.destination_dir;
        if !self.config.download.group_by_source {
            return (request.raw_url.clone(), base.clone());
        }

        let cookies = discover_cookies(&self.config.fetcher, base);
        let name = match self
            .resolver
            .try_display_name(&request.raw_url, cookies.as_deref())
            .await
        {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(url = %request.raw_url, error = %e, "metadata unavailable, using fallback name");
                self.emit(Event::MetadataFetchFailed {
                    url: request.raw_url.clone(),
                    error: e.to_string(),
                });
                fallback_display_name(&request.raw_url)
            }
        };
        let dir = base.join(sanitize_file_name(&name));
        (name, dir)
    }

    fn record_outcome(&self, item: &WorkItem, outcome: ItemOutcome, summary: &mut BatchSummary) {
        let url = item.source_url.clone();
        match outcome {
            ItemOutcome::Succeeded => {
                summary.items_succeeded += 1;
                self.emit(Event::ItemCompleted {
                    url,
                    cancelled: false,
                });
            }
            ItemOutcome::Cancelled => {
                summary.items_cancelled += 1;
                self.emit(Event::ItemCompleted {
                    url,
                    cancelled: true,
                });
            }
            ItemOutcome::TimedOut => {
                summary.items_cancelled += 1;
                summary.timed_out = true;
                self.emit(Event::ItemCompleted {
                    url,
                    cancelled: true,
                });
            }
            ItemOutcome::Failed(e) => {
                tracing::warn!(url = %url, error = %e, "item failed, continuing with next");
                summary.items_failed += 1;
                self.emit(Event::ItemFailed {
                    url,
                    error: e.to_string(),
                });
            }
        }
    }

    /// Wait `inter_item_delay`, returning early on cancellation
    async fn pause_between_items(&self) {
        let delay = self.config.download.inter_item_delay;
        if delay.is_zero() {
            return;
        }
        let token = self.control.token();
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

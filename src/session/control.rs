//! Cancellation surface: request, cancel, query, reset.

use crate::types::Event;
use std::sync::atomic::Ordering;
use tokio_util::sync::CancellationToken;

use super::DownloadSession;

impl DownloadSession {
    /// Ask the running batch to stop
    ///
    /// Sets the cancel flag and fires the cancellation token observed by the live
    /// item, which terminates the fetcher gracefully (SIGTERM on Unix, process
    /// termination elsewhere) and escalates to a hard kill after
    /// `download.kill_grace`. Safe to call at any time, including when nothing
    /// runs; repeated calls have no further effect.
    ///
    /// The flag stays set until [`reset_cancel_flag`](Self::reset_cancel_flag):
    /// a run started while it is set processes zero items.
    pub fn request_cancel(&self) {
        let was_requested = self.control.cancel_requested.swap(true, Ordering::SeqCst);
        self.control.token().cancel();

        if !was_requested {
            let pid = self.control.current_pid.load(Ordering::SeqCst);
            tracing::info!(
                running = self.is_running(),
                pid = (pid != 0).then_some(pid),
                "cancellation requested"
            );
        }
    }

    /// [`request_cancel`](Self::request_cancel) and emit [`Event::CancelRequested`]
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use media_dl::*;
    /// # fn example(session: DownloadSession) {
    /// let handle = session.clone();
    /// tokio::spawn(async move {
    ///     tokio::signal::ctrl_c().await.ok();
    ///     handle.cancel();
    /// });
    /// # }
    /// ```
    pub fn cancel(&self) {
        self.request_cancel();
        self.emit(Event::CancelRequested);
    }

    /// Whether cancellation was requested and not yet reset
    pub fn is_cancel_requested(&self) -> bool {
        self.control.cancel_requested.load(Ordering::SeqCst)
    }

    /// Clear the cancel flag so the next run proceeds
    ///
    /// The fired token is replaced with a fresh one.
    pub fn reset_cancel_flag(&self) {
        let mut token = self
            .control
            .cancel_token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *token = CancellationToken::new();
        self.control.cancel_requested.store(false, Ordering::SeqCst);
        tracing::debug!("cancel flag reset");
    }
}

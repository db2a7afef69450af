//! Shutdown coordination for hosts.

use crate::types::Event;
use std::time::Duration;

use super::DownloadSession;

/// How long `shutdown` waits for the running batch to wind down
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl DownloadSession {
    /// Gracefully shut down the session
    ///
    /// 1. Requests cancellation (terminating the live fetcher, if any)
    /// 2. Waits up to 30 seconds for the running batch to finish its
    ///    post-processing and return
    /// 3. Emits [`Event::Shutdown`]
    ///
    /// The library installs no signal handlers; hosts call this from their own
    /// Ctrl-C / SIGTERM handling. Calling it again, or with nothing running, is
    /// harmless.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating graceful shutdown");

        self.cancel();

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_until_idle()).await {
            Ok(()) => tracing::info!("Session idle"),
            Err(_) => {
                tracing::warn!("Timeout waiting for the batch to stop, proceeding with shutdown");
            }
        }

        self.emit(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
    }

    /// Wait until no run is active
    async fn wait_until_idle(&self) {
        while self.is_running() {
            tracing::debug!("Waiting for the running batch to stop");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

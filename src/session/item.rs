//! One fetcher invocation: spawn, stream progress, enforce timeout, terminate.

use crate::error::{DownloadError, Error};
use crate::fetcher::{LossyLinesCodec, ProgressParser};
use crate::types::{Event, ProgressEvent, WorkItem};
use futures::StreamExt;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio_util::codec::FramedRead;

use super::DownloadSession;

/// How long to wait for the stderr reader after the fetcher exited
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

type StdoutLines = FramedRead<ChildStdout, LossyLinesCodec>;

/// How an invocation ended
#[derive(Debug)]
pub(crate) enum ItemOutcome {
    /// Exit status 0
    Succeeded,
    /// Interrupted by a cancel request
    Cancelled,
    /// Interrupted because `item_timeout` expired
    TimedOut,
    /// Spawn failure or non-zero exit
    Failed(Error),
}

/// Result of one invocation
#[derive(Debug)]
pub(crate) struct ItemRun {
    pub(crate) outcome: ItemOutcome,
    /// Final files the fetcher reported, in order, without duplicates
    pub(crate) produced: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Cancelled,
    TimedOut,
}

impl DownloadSession {
    /// Run the fetcher for `item` in `dir` with prepared `args`
    ///
    /// Never returns an error: every way an invocation can end is an
    /// [`ItemOutcome`]. Progress is forwarded as events while the fetcher runs.
    pub(crate) async fn run_item(
        &self,
        item: &WorkItem,
        args: &[String],
        dir: &Path,
        ordinal: u32,
    ) -> ItemRun {
        let url = item.source_url.as_str();
        let mut produced = Vec::new();

        self.emit(Event::ItemStarted {
            url: url.to_string(),
            title: item.display_title.clone(),
            ordinal,
        });

        let token = self.control.token();
        let mut child = match self.fetcher.spawn_download(args, url, dir) {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(url = %url, error = %e, "failed to start fetcher");
                return ItemRun {
                    outcome: ItemOutcome::Failed(e),
                    produced,
                };
            }
        };

        let pid = child.id();
        if let Some(pid) = pid {
            self.control.current_pid.store(pid, Ordering::SeqCst);
        }
        tracing::info!(url = %url, ordinal, pid, dir = %dir.display(), "fetcher started");

        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(collect_stderr_tail(
                stderr,
                self.config.download.stderr_tail_lines,
                url.to_string(),
            ))
        });
        let mut lines = child
            .stdout
            .take()
            .map(|stdout| FramedRead::new(stdout, LossyLinesCodec::new()));

        let mut parser = ProgressParser::with_patterns(&self.config.progress.percent_patterns)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "configured percent patterns unusable, using built-in set");
                ProgressParser::new()
            });

        let item_timeout = self.config.download.item_timeout;
        let deadline = async move {
            match item_timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        // Stream stdout until EOF, then wait for exit; both race cancel and timeout
        let mut exit = None;
        let mut interrupt = loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break Some(Interrupt::Cancelled),
                _ = &mut deadline => break Some(Interrupt::TimedOut),
                line = next_line(&mut lines) => match line {
                    Some(Ok(line)) => self.handle_line(&mut parser, &line, &mut produced),
                    Some(Err(e)) => {
                        tracing::warn!(url = %url, error = %e, "error reading fetcher output");
                        break None;
                    }
                    None => break None,
                },
            }
        };
        if interrupt.is_none() {
            interrupt = tokio::select! {
                biased;
                _ = token.cancelled() => Some(Interrupt::Cancelled),
                _ = &mut deadline => Some(Interrupt::TimedOut),
                status = child.wait() => {
                    exit = Some(status);
                    None
                }
            };
        }

        if let Some(reason) = interrupt {
            if reason == Interrupt::TimedOut {
                let timeout_secs = item_timeout.map_or(0, |limit| limit.as_secs());
                tracing::warn!(url = %url, timeout_secs, "item exceeded its timeout, stopping batch");
                self.emit(Event::ItemTimedOut {
                    url: url.to_string(),
                    timeout_secs,
                });
                self.request_cancel();
            }
            exit = Some(terminate(&mut child, self.config.download.kill_grace).await);
        }
        let exit = match exit {
            Some(exit) => exit,
            None => child.wait().await,
        };
        self.control.current_pid.store(0, Ordering::SeqCst);

        let stderr_tail = match stderr_task {
            Some(task) => {
                let abort = task.abort_handle();
                match tokio::time::timeout(STDERR_DRAIN_TIMEOUT, task).await {
                    Ok(Ok(tail)) => tail,
                    Ok(Err(e)) => {
                        tracing::debug!(error = %e, "stderr reader failed");
                        String::new()
                    }
                    Err(_) => {
                        // A grandchild can keep the pipe open after the fetcher exited
                        abort.abort();
                        String::new()
                    }
                }
            }
            None => String::new(),
        };

        let outcome = match (interrupt, exit) {
            (Some(Interrupt::TimedOut), _) => ItemOutcome::TimedOut,
            (Some(Interrupt::Cancelled), _) => ItemOutcome::Cancelled,
            (None, Ok(status)) if status.success() => ItemOutcome::Succeeded,
            // Cancelled right as the fetcher exited on its own
            (None, Ok(_)) if token.is_cancelled() => ItemOutcome::Cancelled,
            (None, Ok(status)) => ItemOutcome::Failed(
                DownloadError::ItemFailed {
                    url: url.to_string(),
                    exit_code: status.code(),
                    stderr_tail,
                }
                .into(),
            ),
            (None, Err(e)) => ItemOutcome::Failed(Error::Io(e)),
        };

        tracing::debug!(url = %url, outcome = ?outcome, files = produced.len(), "fetcher finished");
        ItemRun { outcome, produced }
    }

    fn handle_line(&self, parser: &mut ProgressParser, line: &str, produced: &mut Vec<String>) {
        match parser.parse_line(line) {
            ProgressEvent::Started { title } => {
                remember(produced, &title);
                self.emit(Event::FileStarted { filename: title });
            }
            ProgressEvent::AlreadyDownloaded { filename } => {
                remember(produced, &filename);
                self.emit(Event::FileAlreadyDownloaded { filename });
            }
            ProgressEvent::MergeComplete { filename } => {
                remember(produced, &filename);
                self.emit(Event::FileMerged { filename });
            }
            ProgressEvent::PercentUpdate {
                percent,
                total_mb,
                current,
                max,
            } => {
                self.emit(Event::Progress {
                    percent,
                    total_mb,
                    current,
                    max,
                });
            }
            ProgressEvent::Info { text } => {
                tracing::debug!(line = %text, "fetcher info");
                self.emit(Event::Log { message: text });
            }
            ProgressEvent::Unrecognized { raw_line } => {
                tracing::trace!(line = %raw_line, "fetcher output");
            }
        }
    }
}

fn remember(produced: &mut Vec<String>, filename: &str) {
    if !produced.iter().any(|known| known == filename) {
        produced.push(filename.to_string());
    }
}

async fn next_line(lines: &mut Option<StdoutLines>) -> Option<std::io::Result<String>> {
    match lines {
        Some(lines) => lines.next().await,
        None => None,
    }
}

/// Keep the last `keep` non-blank stderr lines
async fn collect_stderr_tail(stderr: ChildStderr, keep: usize, url: String) -> String {
    let mut lines = FramedRead::new(stderr, LossyLinesCodec::new());
    let mut tail = VecDeque::with_capacity(keep);

    while let Some(line) = lines.next().await {
        match line {
            Ok(line) if line.trim().is_empty() => {}
            Ok(line) => {
                tracing::debug!(url = %url, line = %line, "fetcher stderr");
                if tail.len() == keep {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "stopped reading fetcher stderr");
                break;
            }
        }
    }

    Vec::from(tail).join("\n")
}

/// Ask the fetcher to stop, then kill it if it is still alive after `grace`
async fn terminate(
    child: &mut Child,
    grace: Duration,
) -> std::io::Result<std::process::ExitStatus> {
    request_termination(child);
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            tracing::warn!(
                pid = child.id(),
                grace_secs = grace.as_secs_f64(),
                "fetcher ignored termination request, killing"
            );
            child.kill().await?;
            child.wait().await
        }
    }
}

#[cfg(unix)]
fn request_termination(child: &mut Child) {
    // Already reaped
    let Some(pid) = child.id() else {
        return;
    };
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        child.start_kill().ok();
        return;
    };

    // SAFETY: kill(2) only delivers a signal. The pid belongs to our own child,
    // which has not been reaped yet (`id()` returned Some), so it cannot have
    // been recycled for an unrelated process.
    let result = unsafe { libc::kill(pid, libc::SIGTERM) };
    if result != 0 {
        tracing::debug!(
            pid,
            error = %std::io::Error::last_os_error(),
            "SIGTERM failed, killing instead"
        );
        child.start_kill().ok();
    }
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child) {
    // TerminateProcess: there is no softer request for a console-less child
    if let Err(e) = child.start_kill() {
        tracing::debug!(error = %e, "terminate request failed");
    }
}

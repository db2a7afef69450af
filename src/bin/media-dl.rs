//! media-dl command-line host
//!
//! Resolves the given URLs, runs one download session over them and prints the
//! session's events. Ctrl-C / SIGTERM shut the session down gracefully: the
//! running fetcher is terminated and the directory is still numbered and
//! manifested.

use clap::Parser;
use media_dl::fetcher::{CliFetcher, resolve};
use media_dl::utils::extract_urls;
use media_dl::{
    BatchSummary, CollectionStrategy, Config, DownloadMode, DownloadOptions, DownloadSession,
    Error, Event, ItemRange, WorkRequest,
};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "media_dl=info";

/// Download videos, playlists and channels with yt-dlp
#[derive(Parser, Debug)]
#[command(name = "media-dl", version, about, long_about = None)]
struct Args {
    /// Video, playlist or channel URLs
    urls: Vec<String>,

    /// Extract audio as MP3 instead of downloading video
    #[arg(long)]
    audio: bool,

    /// Embed the thumbnail into video files
    #[arg(long)]
    thumbnail: bool,

    /// Only download collection items START through END (1-based, inclusive)
    #[arg(long, value_name = "START-END", value_parser = parse_range)]
    range: Option<ItemRange>,

    /// Output file name template, e.g. "%(number)03d - %(title)s.%(ext)s"
    #[arg(long)]
    template: Option<String>,

    /// Destination directory
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    dest: PathBuf,

    /// Read URLs from a text file (URLs are picked out of any text)
    #[arg(long, value_name = "PATH")]
    from_file: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Hand each collection to the fetcher in a single invocation
    #[arg(long)]
    single_invocation: bool,

    /// Export cookies from BROWSER into the destination's cookies file first
    #[arg(long, value_name = "BROWSER")]
    cookies_from_browser: Option<String>,
}

fn parse_range(text: &str) -> Result<ItemRange, String> {
    ItemRange::parse(text)
        .ok_or_else(|| format!("expected START-END with 1 <= START <= END, got {text:?}"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging();

    match run(args).await {
        Ok(summary) if summary.is_clean() => ExitCode::SUCCESS,
        Ok(summary) => {
            eprintln!("{} item(s) failed", summary.items_failed);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Args) -> media_dl::Result<BatchSummary> {
    let mut config = match &args.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    if args.single_invocation {
        config.download.collection_strategy = CollectionStrategy::SingleInvocation;
    }

    let requests = collect_requests(&args)?;
    if let Some(browser) = &args.cookies_from_browser {
        std::fs::create_dir_all(&args.dest)?;
        let target = args.dest.join(&config.fetcher.cookies_file_name);
        CliFetcher::from_config(&config.fetcher)?
            .export_browser_cookies(browser, &target)
            .await?;
    }
    let session = DownloadSession::new(config)?;

    let mut options = DownloadOptions::new(&args.dest);
    if args.audio {
        options.mode = DownloadMode::AudioOnly;
    }
    options.include_thumbnail = args.thumbnail;
    if let Some(template) = args.template {
        options.filename_template = template;
    }

    let printer = tokio::spawn(print_events(session.subscribe()));
    let signals = {
        let session = session.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            session.shutdown().await;
        })
    };

    let result = session.start(requests, options).await;
    signals.abort();
    printer.await.ok();
    result
}

fn collect_requests(args: &Args) -> media_dl::Result<Vec<WorkRequest>> {
    let mut urls = args.urls.clone();
    if let Some(path) = &args.from_file {
        let text = std::fs::read_to_string(path)?;
        let found = extract_urls(&text);
        tracing::info!(path = %path.display(), urls = found.len(), "read URL list");
        urls.extend(found);
    }

    let requests: Vec<WorkRequest> = urls
        .iter()
        .filter_map(|url| match resolve(url) {
            Ok(request) => Some(request.with_range(args.range)),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "skipping URL");
                None
            }
        })
        .collect();

    if requests.is_empty() {
        return Err(Error::Other(
            "no usable URLs given (pass URLs or --from-file)".to_string(),
        ));
    }
    Ok(requests)
}

/// Print events until the batch completes
async fn print_events(mut events: broadcast::Receiver<Event>) {
    loop {
        match events.recv().await {
            Ok(Event::BatchComplete { summary }) => {
                println!(
                    "done: {} downloaded, {} failed, {} cancelled, {} manifest row(s)",
                    summary.items_succeeded,
                    summary.items_failed,
                    summary.items_cancelled,
                    summary.manifest_records
                );
                break;
            }
            Ok(event) => print_event(&event),
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "event printer lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_event(event: &Event) {
    match event {
        Event::RequestResolved {
            display_name,
            directory,
            items,
            ..
        } => println!(
            "==> {display_name}: {items} item(s) -> {}",
            directory.display()
        ),
        Event::ItemStarted {
            url,
            title,
            ordinal,
        } => {
            let label = if title.is_empty() { url } else { title };
            println!("[{ordinal:03}] {label}");
        }
        Event::FileStarted { filename } => println!("      -> {filename}"),
        Event::FileAlreadyDownloaded { filename } => {
            println!("      already downloaded: {filename}");
        }
        Event::FileMerged { filename } => println!("\n      merged: {filename}"),
        Event::Progress { percent, .. } => {
            print!("\r      {percent:5.1}%");
            std::io::stdout().flush().ok();
        }
        Event::ItemCompleted { cancelled: true, .. } => println!("\n      cancelled"),
        Event::ItemCompleted { .. } => println!(),
        Event::ItemFailed { url, error } => eprintln!("\n      FAILED {url}: {error}"),
        Event::ItemTimedOut { url, timeout_secs } => {
            eprintln!("\n      timed out after {timeout_secs}s: {url}");
        }
        Event::FileRenamed { to, .. } => println!("      saved as {}", to.display()),
        Event::RenameFailed { path, error } => {
            eprintln!("      could not number {}: {error}", path.display());
        }
        Event::ManifestExported { path, records } => {
            println!("    manifest: {} ({records} row(s))", path.display());
        }
        Event::ManifestExportFailed { directory, error } => {
            eprintln!("    manifest export failed in {}: {error}", directory.display());
        }
        Event::MetadataFetchFailed { url, error } => {
            eprintln!("    metadata unavailable for {url}: {error}");
        }
        Event::CancelRequested => eprintln!("cancelling..."),
        Event::Log { .. } | Event::BatchStarted { .. } | Event::BatchComplete { .. } => {}
        Event::Shutdown => {}
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for Ctrl+C only");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            // Never resolve: a failed listener must not trigger shutdown
            std::future::pending::<()>().await;
        }
    }
}

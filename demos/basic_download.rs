//! Basic download example
//!
//! This example demonstrates the core functionality of media-dl:
//! - Creating a session (yt-dlp is looked up in PATH)
//! - Subscribing to events
//! - Resolving a playlist URL with an item range
//! - Running the batch and reading the summary

use media_dl::fetcher::resolve;
use media_dl::{Config, DownloadOptions, DownloadSession, Event, ItemRange};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let session = DownloadSession::new(Config::default())?;

    // Subscribe to events
    let mut events = session.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::ItemStarted { title, ordinal, .. } => {
                    println!("[{ordinal:03}] {title}");
                }
                Event::Progress { percent, .. } => {
                    println!("      {percent:.1}%");
                }
                Event::FileRenamed { to, .. } => {
                    println!("      saved as {}", to.display());
                }
                Event::ItemFailed { url, error } => {
                    eprintln!("      failed {url}: {error}");
                }
                Event::BatchComplete { .. } => break,
                _ => {}
            }
        }
    });

    // First five entries of a playlist
    let request = resolve("https://www.youtube.com/playlist?list=PLxxxxxxxxxxxxxxxx")?
        .with_range(ItemRange::new(1, 5));

    let mut options = DownloadOptions::new("./downloads");
    options.include_thumbnail = true;

    let summary = session.start(vec![request], options).await?;
    println!(
        "{} downloaded, {} failed, {} manifest row(s)",
        summary.items_succeeded, summary.items_failed, summary.manifest_records
    );

    Ok(())
}

//! Custom test assertions for E2E tests

use media_dl::{DownloadSession, Event};
use std::path::Path;
use std::time::Duration;

/// Collect all events until timeout or predicate is satisfied
pub async fn collect_events_until<F>(
    mut events: tokio::sync::broadcast::Receiver<Event>,
    timeout: Duration,
    stop_predicate: F,
) -> Vec<Event>
where
    F: Fn(&Event) -> bool,
{
    let mut collected = Vec::new();

    let _ = tokio::time::timeout(timeout, async {
        while let Ok(event) = events.recv().await {
            let should_stop = stop_predicate(&event);
            collected.push(event);
            if should_stop {
                break;
            }
        }
    })
    .await;

    collected
}

/// Subscribe before a run, returning a collector for everything up to `BatchComplete`
pub fn record_batch(
    session: &DownloadSession,
) -> tokio::task::JoinHandle<Vec<Event>> {
    let events = session.subscribe();
    tokio::spawn(collect_events_until(
        events,
        Duration::from_secs(30),
        |event| matches!(event, Event::BatchComplete { .. }),
    ))
}

/// Assert that files exist in the download directory
pub fn assert_files_exist(dir: &Path, expected_files: &[&str]) {
    for filename in expected_files {
        let path = dir.join(filename);
        assert!(
            path.exists(),
            "Expected file '{}' to exist in {:?}",
            filename,
            dir
        );
    }
}

/// Assert that files are absent from the download directory
pub fn assert_files_absent(dir: &Path, unexpected_files: &[&str]) {
    for filename in unexpected_files {
        let path = dir.join(filename);
        assert!(
            !path.exists(),
            "Expected file '{}' to be absent from {:?}",
            filename,
            dir
        );
    }
}

/// Manifest rows (header excluded)
pub fn manifest_rows(dir: &Path) -> Vec<String> {
    let content = std::fs::read_to_string(dir.join("_video_list.csv"))
        .expect("Failed to read manifest");
    let mut lines = content.lines();
    assert_eq!(lines.next(), Some("number,title,url"), "manifest header");
    lines.map(str::to_string).collect()
}

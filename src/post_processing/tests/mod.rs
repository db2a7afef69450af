// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use std::collections::HashMap;
use tempfile::TempDir;

fn processor(writer: Arc<dyn ManifestWriter>) -> (PostProcessor, broadcast::Receiver<Event>) {
    let (tx, rx) = broadcast::channel(100);
    let config = Arc::new(Config::default());
    (PostProcessor::new(tx, config, writer), rx)
}

fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn renumber_emits_file_renamed_per_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("One.mp4"), b"1").unwrap();
    std::fs::write(dir.path().join("Two.mp4"), b"2").unwrap();
    let (processor, mut rx) = processor(Arc::new(CsvManifestWriter::default()));

    let next = processor
        .renumber_and_finalize(dir.path(), &["One.mp4".into(), "Two.mp4".into()], 3)
        .await;

    assert_eq!(next, 5);
    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    assert!(matches!(
        &events[0],
        Event::FileRenamed { to, .. } if to.ends_with("003 - One.mp4")
    ));
    assert!(matches!(
        &events[1],
        Event::FileRenamed { to, .. } if to.ends_with("004 - Two.mp4")
    ));
}

#[tokio::test]
async fn renumber_collision_emits_rename_failed() {
    let dir = TempDir::new().unwrap();
    let sub = dir.path().join("Album");
    std::fs::create_dir(&sub).unwrap();
    std::fs::write(sub.join("Track.mp3"), b"new").unwrap();
    std::fs::write(sub.join("001 - Track.mp3"), b"old").unwrap();
    let (processor, mut rx) = processor(Arc::new(CsvManifestWriter::default()));

    let next = processor
        .renumber_and_finalize(dir.path(), &["Album/Track.mp3".into()], 1)
        .await;

    assert_eq!(next, 1);
    let events = drain(&mut rx);
    assert!(matches!(
        &events[..],
        [Event::RenameFailed { path, .. }] if path.ends_with("Track.mp3")
    ));
}

#[tokio::test]
async fn manifest_export_emits_event_with_path() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("_metadata.jsonl"),
        "{\"title\":\"Intro\",\"id\":\"id1\"}\n",
    )
    .unwrap();
    let (processor, mut rx) = processor(Arc::new(CsvManifestWriter::default()));

    let context = ManifestContext {
        first_ordinal: 1,
        ordinals_by_id: HashMap::from([("id1".to_string(), 7)]),
        sequential_ordinals: false,
    };
    let records = processor.export_manifest(dir.path(), &context).await.unwrap();

    assert_eq!(records, 1);
    let events = drain(&mut rx);
    assert!(matches!(
        &events[..],
        [Event::ManifestExported { path, records: 1 }] if path.ends_with("_video_list.csv")
    ));
    let csv = std::fs::read_to_string(dir.path().join("_video_list.csv")).unwrap();
    assert!(csv.contains("007,Intro,https://youtu.be/id1"));
}

#[tokio::test]
async fn manifest_without_log_is_silent() {
    let dir = TempDir::new().unwrap();
    let (processor, mut rx) = processor(Arc::new(CsvManifestWriter::default()));

    let records = processor
        .export_manifest(dir.path(), &ManifestContext::default())
        .await
        .unwrap();

    assert_eq!(records, 0);
    assert!(drain(&mut rx).is_empty());
}

struct ReadOnlyWriter;

impl ManifestWriter for ReadOnlyWriter {
    fn write(
        &self,
        _dir: &Path,
        _records: &[crate::ManifestRecord],
    ) -> Result<std::path::PathBuf> {
        Err(crate::Error::Other("spreadsheet locked by another program".into()))
    }

    fn name(&self) -> &'static str {
        "read-only"
    }
}

#[tokio::test]
async fn manifest_failure_emits_event_and_keeps_log() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("_metadata.jsonl"), "{\"title\":\"A\",\"id\":\"a\"}\n").unwrap();
    let (processor, mut rx) = processor(Arc::new(ReadOnlyWriter));

    let result = processor
        .export_manifest(dir.path(), &ManifestContext::default())
        .await;

    assert!(result.is_err());
    let events = drain(&mut rx);
    assert!(matches!(
        &events[..],
        [Event::ManifestExportFailed { error, .. }] if error.contains("locked")
    ));
    assert!(dir.path().join("_metadata.jsonl").exists());
}

//! Shared test helpers: a scripted stand-in for the fetcher and session setup.

use crate::config::Config;
use crate::fetcher::{CliFetcher, MetadataSource};
use crate::post_processing::{CsvManifestWriter, ManifestWriter};
use crate::session::DownloadSession;
use crate::types::Event;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// POSIX shell script answering like yt-dlp for the URLs the tests use
///
/// Metadata mode (`--flat-playlist`): `list=` URLs list three entries, `@` URLs
/// list two, anything else describes one video. URLs containing `fail-meta`
/// fail. Download mode: URLs containing `fail` exit 1 with an error on
/// stderr, URLs containing `slow` hang, anything else writes `<id>.mp4` and a
/// metadata log line.
pub(crate) const FAKE_FETCHER: &str = r#"#!/bin/sh
for last; do :; done
url="$last"
id="${url##*v=}"
id="${id##*/}"

case " $* " in
  *" --flat-playlist "*)
    case "$url" in
      *fail-meta*)
        echo "ERROR: [youtube:tab] Unable to download API page: HTTP Error 404: Not Found" >&2
        exit 1
        ;;
      *list=*)
        for n in 1 2 3; do
          printf '{"id":"p%s","title":"Part %s","url":"https://www.youtube.com/watch?v=p%s","playlist_title":"Road Trip","playlist_index":%s}\n' "$n" "$n" "$n" "$n"
        done
        ;;
      *@*)
        for n in 1 2; do
          printf '{"id":"c%s","title":"Upload %s","url":"https://www.youtube.com/watch?v=c%s","channel":"Some Creator"}\n' "$n" "$n" "$n"
        done
        ;;
      *)
        printf '{"id":"%s","title":"Clip %s","channel":"Solo Channel"}\n' "$id" "$id"
        ;;
    esac
    exit 0
    ;;
esac

case "$url" in
  *fail*)
    echo "WARNING: [youtube] $id: falling back to web client" >&2
    echo "ERROR: [youtube] $id: Video unavailable" >&2
    exit 1
    ;;
  *slow*)
    echo "[download] Destination: $id.mp4"
    exec sleep 30
    ;;
esac

echo "[info] $id: Downloading 1 format(s): 22 (resolution 1280x720)"
echo "[download] Destination: $id.mp4"
echo "[download]  50.0% of   10.00MiB at  1.00MiB/s ETA 00:05"
echo "[download] 100% of   10.00MiB in 00:00:01"
printf 'media' > "$id.mp4"
printf '{"title":"Clip %s","id":"%s"}\n' "$id" "$id" >> _metadata.jsonl
exit 0
"#;

/// Write [`FAKE_FETCHER`] into `dir` and make it executable
#[cfg(unix)]
pub(crate) fn write_fake_fetcher(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-yt-dlp");
    std::fs::write(&path, FAKE_FETCHER).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Configuration suitable for tests: no delays, short grace period
pub(crate) fn test_config(fetcher: &Path) -> Config {
    let mut config = Config::default();
    config.fetcher.binary_path = Some(fetcher.to_path_buf());
    config.fetcher.search_path = false;
    config.download.inter_item_delay = Duration::ZERO;
    config.download.kill_grace = Duration::from_secs(2);
    config.retry.max_attempts = 0;
    config
}

/// Build a session around the fake fetcher
///
/// Returns the session, its download directory, and the tempdir (which must
/// be kept alive).
#[cfg(unix)]
pub(crate) fn create_test_session_with(
    adjust: impl FnOnce(&mut Config),
) -> (DownloadSession, PathBuf, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let fetcher_path = write_fake_fetcher(temp_dir.path());

    let mut config = test_config(&fetcher_path);
    adjust(&mut config);

    let fetcher = CliFetcher::new(fetcher_path).with_metadata_timeout(Duration::from_secs(10));
    let metadata: Arc<dyn MetadataSource> = Arc::new(fetcher.clone());
    let writer: Arc<dyn ManifestWriter> = Arc::new(CsvManifestWriter::new(
        config.download.manifest_file_name.clone(),
    ));
    let session = DownloadSession::with_components(config, fetcher, metadata, writer).unwrap();

    let downloads = temp_dir.path().join("downloads");
    (session, downloads, temp_dir)
}

/// [`create_test_session_with`] using the test configuration unchanged
#[cfg(unix)]
pub(crate) fn create_test_session() -> (DownloadSession, PathBuf, TempDir) {
    create_test_session_with(|_| {})
}

/// Wait until the session has a live fetcher process and return its pid
pub(crate) async fn wait_for_fetcher(session: &DownloadSession) -> u32 {
    for _ in 0..200 {
        if let Some(pid) = session.state().current_pid {
            return pid;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("fetcher never started");
}

/// Everything currently buffered on `rx`
pub(crate) fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Sorted file names in `dir`
pub(crate) fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

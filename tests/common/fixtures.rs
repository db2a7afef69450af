//! Scripted fetcher and session construction for E2E tests

use media_dl::fetcher::{CliFetcher, MetadataSource};
use media_dl::post_processing::{CsvManifestWriter, ManifestWriter};
use media_dl::{Config, DownloadSession};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Shell script standing in for yt-dlp
///
/// Honors `-o` (`%(title)s` and `%(ext)s` only), `-x` (mp3 output) and
/// `--download-archive` (items already listed are reported as downloaded).
pub const FAKE_FETCHER: &str = r#"#!/bin/sh
for last; do :; done
url="$last"
id="${url##*v=}"
id="${id##*/}"

case " $* " in
  *" --flat-playlist "*)
    case "$url" in
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

out="%(title)s.%(ext)s"
archive=""
ext="mp4"
prev=""
for arg; do
  case "$prev" in
    -o) out="$arg" ;;
    --download-archive) archive="$arg" ;;
  esac
  if [ "$arg" = "-x" ]; then ext="mp3"; fi
  prev="$arg"
done
name=$(printf '%s' "$out" | sed -e "s/%(title)s/Clip $id/" -e "s/%(ext)s/$ext/")

if [ -n "$archive" ] && [ -f "$archive" ] && grep -qx "youtube $id" "$archive"; then
  echo "[download] $name has already been downloaded"
  exit 0
fi

echo "[info] $id: Downloading 1 format(s): 22"
echo "[download] Destination: $name"
echo "[download]  25.0% of   40.00MiB at  4.00MiB/s ETA 00:07"
echo "[download] 100% of   40.00MiB in 00:00:10"
printf 'media' > "$name"
if [ -n "$archive" ]; then echo "youtube $id" >> "$archive"; fi
printf '{"title":"Clip %s","id":"%s"}\n' "$id" "$id" >> _metadata.jsonl
exit 0
"#;

/// Write the fake fetcher into `dir` and make it executable
pub fn write_fake_fetcher(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-yt-dlp");
    std::fs::write(&path, FAKE_FETCHER).expect("write fake fetcher");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("make fake fetcher executable");
    path
}

/// A session over the fake fetcher and its download directory
///
/// The tempdir must be kept alive for the duration of the test.
pub fn create_session() -> (DownloadSession, PathBuf, TempDir) {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let fetcher_path = write_fake_fetcher(temp_dir.path());

    let mut config = Config::default();
    config.fetcher.binary_path = Some(fetcher_path.clone());
    config.fetcher.search_path = false;
    config.download.inter_item_delay = Duration::ZERO;
    config.retry.max_attempts = 0;

    let fetcher = CliFetcher::new(fetcher_path);
    let metadata: Arc<dyn MetadataSource> = Arc::new(fetcher.clone());
    let writer: Arc<dyn ManifestWriter> = Arc::new(CsvManifestWriter::default());
    let session = DownloadSession::with_components(config, fetcher, metadata, writer)
        .expect("build session");

    let downloads = temp_dir.path().join("downloads");
    (session, downloads, temp_dir)
}

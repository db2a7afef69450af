//! CLI-based fetcher using the external yt-dlp binary

use super::parser::{ExitStatus, parse_metadata_output};
use super::traits::{MetadataEntry, MetadataSource};
use crate::config::{FetcherConfig, NetworkFlags};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};

/// Program name looked up in PATH for the fetcher
pub const FETCHER_PROGRAM: &str = "yt-dlp";

/// Program name looked up in PATH for the transcoder
pub const TRANSCODER_PROGRAM: &str = "ffmpeg";

/// Runs the external fetcher in metadata and download mode
///
/// # Examples
///
/// ```no_run
/// use media_dl::fetcher::{CliFetcher, MetadataSource};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = CliFetcher::from_path().expect("yt-dlp not found in PATH");
/// let entries = fetcher
///     .fetch_metadata("https://www.youtube.com/playlist?list=PL123", None)
///     .await?;
/// println!("{} entries", entries.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CliFetcher {
    binary_path: PathBuf,
    transcoder_path: Option<PathBuf>,
    network: NetworkFlags,
    metadata_timeout: Duration,
}

impl CliFetcher {
    /// Create a fetcher with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        let defaults = FetcherConfig::default();
        Self {
            binary_path,
            transcoder_path: None,
            network: defaults.network,
            metadata_timeout: defaults.metadata_timeout,
        }
    }

    /// Attempt to find yt-dlp in PATH
    pub fn from_path() -> Option<Self> {
        which::which(FETCHER_PROGRAM).ok().map(Self::new)
    }

    /// Build a fetcher from configuration
    ///
    /// Explicit paths win; otherwise PATH is searched when `search_path` is on.
    /// A missing transcoder is not an error: the fetcher then falls back to its
    /// own lookup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`](crate::Error::NotSupported) when no fetcher
    /// binary can be found.
    pub fn from_config(config: &FetcherConfig) -> crate::Result<Self> {
        let binary_path = match &config.binary_path {
            Some(path) => path.clone(),
            None if config.search_path => which::which(FETCHER_PROGRAM).map_err(|_| {
                crate::Error::NotSupported(format!("{FETCHER_PROGRAM} not found in PATH"))
            })?,
            None => {
                return Err(crate::Error::NotSupported(format!(
                    "{FETCHER_PROGRAM} path not configured and PATH search disabled"
                )));
            }
        };

        let transcoder_path = match &config.transcoder_path {
            Some(path) => Some(path.clone()),
            None if config.search_path => which::which(TRANSCODER_PROGRAM).ok(),
            None => None,
        };
        if transcoder_path.is_none() {
            tracing::debug!("{TRANSCODER_PROGRAM} not found, merging relies on the fetcher's lookup");
        }

        tracing::info!(
            fetcher = %binary_path.display(),
            transcoder = ?transcoder_path,
            "external tools located"
        );

        Ok(Self {
            binary_path,
            transcoder_path,
            network: config.network,
            metadata_timeout: config.metadata_timeout,
        })
    }

    /// Use the given transcoder binary
    #[must_use]
    pub fn with_transcoder(mut self, path: Option<PathBuf>) -> Self {
        self.transcoder_path = path;
        self
    }

    /// Use the given network flags for metadata invocations
    #[must_use]
    pub fn with_network_flags(mut self, network: NetworkFlags) -> Self {
        self.network = network;
        self
    }

    /// Bound metadata invocations to `timeout`
    #[must_use]
    pub fn with_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = timeout;
        self
    }

    /// Path of the fetcher binary
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// Path of the transcoder binary, when known
    pub fn transcoder_path(&self) -> Option<&Path> {
        self.transcoder_path.as_deref()
    }

    /// Arguments of a metadata-only invocation
    pub fn metadata_args(&self, url: &str, cookies: Option<&Path>) -> Vec<String> {
        let mut args = Vec::with_capacity(8);
        if self.network.no_warnings {
            args.push("--no-warnings".to_string());
        }
        if self.network.no_call_home {
            args.push("--no-call-home".to_string());
        }
        if self.network.no_check_certificates {
            args.push("--no-check-certificates".to_string());
        }
        args.push("--flat-playlist".to_string());
        args.push("--dump-json".to_string());
        if let Some(cookies) = cookies {
            args.push("--cookies".to_string());
            args.push(cookies.to_string_lossy().into_owned());
        }
        args.push(url.to_string());
        args
    }

    /// Arguments of a cookie export invocation
    pub fn cookie_export_args(&self, browser: &str, target: &Path) -> Vec<String> {
        vec![
            "--cookies-from-browser".to_string(),
            browser.to_string(),
            "--cookies".to_string(),
            target.to_string_lossy().into_owned(),
        ]
    }

    /// Export a browser's cookies into a Netscape cookies file at `target`
    ///
    /// `browser` takes the fetcher's `BROWSER[+KEYRING][:PROFILE]` form, e.g.
    /// `"firefox"`. The fetcher writes into a sibling file that replaces
    /// `target` only once the export produced it, so a failed export leaves an
    /// existing cookies file alone. The fetcher complains about the missing URL
    /// and exits non-zero either way; the written file is what counts.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`](crate::Error::Config) for an empty or flag-like browser
    /// - [`Error::ExternalTool`](crate::Error::ExternalTool) when the fetcher
    ///   cannot run, times out or writes no cookies file
    pub async fn export_browser_cookies(&self, browser: &str, target: &Path) -> crate::Result<PathBuf> {
        let browser = browser.trim();
        if browser.is_empty() || browser.starts_with('-') {
            return Err(crate::Error::Config {
                message: format!("invalid browser {browser:?}"),
                key: Some("cookies_from_browser".to_string()),
            });
        }

        let target = std::path::absolute(target)?;
        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| crate::Error::Config {
                message: format!("cookies target {} has no file name", target.display()),
                key: Some("cookies_file".to_string()),
            })?;
        let partial = target.with_file_name(format!(".{file_name}.partial"));
        let _ = tokio::fs::remove_file(&partial).await;

        let mut command = self.command();
        command
            .args(self.cookie_export_args(browser, &partial))
            .stdin(Stdio::null());
        tracing::info!(browser = %browser, target = %target.display(), "exporting browser cookies");

        let output = match tokio::time::timeout(self.metadata_timeout, command.output()).await {
            Ok(result) => result.map_err(|e| {
                crate::Error::ExternalTool(format!("Failed to execute {FETCHER_PROGRAM}: {e}"))
            })?,
            Err(_) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(crate::Error::ExternalTool(format!(
                    "cookie export from {browser} timed out after {}s",
                    self.metadata_timeout.as_secs()
                )));
            }
        };

        if !tokio::fs::metadata(&partial).await.is_ok_and(|m| m.is_file()) {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(crate::Error::ExternalTool(format!(
                "cookie export from {browser} produced no cookies file: {}",
                stderr.trim()
            )));
        }
        tokio::fs::rename(&partial, &target).await?;
        tracing::info!(target = %target.display(), "browser cookies exported");
        Ok(target)
    }

    /// Start a download invocation in `cwd` with piped stdout and stderr
    ///
    /// `args` come from the argument builder; `url` is appended last.
    pub fn spawn_download(&self, args: &[String], url: &str, cwd: &Path) -> crate::Result<Child> {
        let mut command = self.command();
        command
            .args(args)
            .arg(url)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!(
            program = %self.binary_path.display(),
            url = %url,
            cwd = %cwd.display(),
            args = ?args,
            "spawning fetcher"
        );

        command.spawn().map_err(|e| {
            crate::DownloadError::SpawnFailed {
                program: self.binary_path.clone(),
                url: url.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary_path);
        command.kill_on_drop(true);
        configure_for_background(&mut command);
        command
    }
}

#[cfg(windows)]
fn configure_for_background(command: &mut Command) {
    // Keep console windows from popping up for every invocation
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    command.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn configure_for_background(_command: &mut Command) {}

#[async_trait]
impl MetadataSource for CliFetcher {
    async fn fetch_metadata(
        &self,
        url: &str,
        cookies: Option<&Path>,
    ) -> crate::Result<Vec<MetadataEntry>> {
        let mut command = self.command();
        command
            .args(self.metadata_args(url, cookies))
            .stdin(Stdio::null());

        tracing::debug!(url = %url, "fetching metadata");

        let output = match tokio::time::timeout(self.metadata_timeout, command.output()).await {
            Ok(result) => result.map_err(|e| {
                crate::Error::ExternalTool(format!("Failed to execute {FETCHER_PROGRAM}: {e}"))
            })?,
            Err(_) => {
                return Err(crate::Error::MetadataFetch {
                    url: url.to_string(),
                    stderr: format!(
                        "metadata lookup timed out after {}s",
                        self.metadata_timeout.as_secs()
                    ),
                });
            }
        };

        parse_metadata_output(
            url,
            &output.stdout,
            &output.stderr,
            ExitStatus::from(output.status.success()),
        )
    }

    fn name(&self) -> &'static str {
        "cli-yt-dlp"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_path_consistency_with_which_crate() {
        let which_result = which::which(FETCHER_PROGRAM);
        let from_path_result = CliFetcher::from_path();
        assert_eq!(which_result.is_ok(), from_path_result.is_some());
    }

    #[test]
    fn from_config_prefers_explicit_paths() {
        let config = FetcherConfig {
            binary_path: Some(PathBuf::from("/opt/yt-dlp")),
            transcoder_path: Some(PathBuf::from("/opt/ffmpeg")),
            ..FetcherConfig::default()
        };
        let fetcher = CliFetcher::from_config(&config).unwrap();
        assert_eq!(fetcher.binary_path(), Path::new("/opt/yt-dlp"));
        assert_eq!(fetcher.transcoder_path(), Some(Path::new("/opt/ffmpeg")));
    }

    #[test]
    fn from_config_without_path_or_search_is_not_supported() {
        let config = FetcherConfig {
            search_path: false,
            ..FetcherConfig::default()
        };
        assert!(matches!(
            CliFetcher::from_config(&config),
            Err(crate::Error::NotSupported(_))
        ));
    }

    #[test]
    fn metadata_args_shape() {
        let fetcher = CliFetcher::new(PathBuf::from("yt-dlp"));
        let args = fetcher.metadata_args("https://youtu.be/abc", Some(Path::new("/c/_cookies.txt")));
        assert_eq!(
            args,
            vec![
                "--no-warnings",
                "--no-call-home",
                "--no-check-certificates",
                "--flat-playlist",
                "--dump-json",
                "--cookies",
                "/c/_cookies.txt",
                "https://youtu.be/abc",
            ]
        );

        let fetcher = fetcher.with_network_flags(NetworkFlags {
            no_warnings: false,
            no_call_home: false,
            no_check_certificates: false,
        });
        assert_eq!(
            fetcher.metadata_args("u", None),
            vec!["--flat-playlist", "--dump-json", "u"]
        );
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-yt-dlp");
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn cookie_export_args_shape() {
        let fetcher = CliFetcher::new(PathBuf::from("yt-dlp"));
        assert_eq!(
            fetcher.cookie_export_args("firefox", Path::new("/c/_cookies.txt")),
            vec!["--cookies-from-browser", "firefox", "--cookies", "/c/_cookies.txt"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    #[serial_test::serial]
    async fn cookie_export_writes_target() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            dir.path(),
            r#"#!/bin/sh
prev=""
for arg; do
  if [ "$prev" = "--cookies" ]; then printf '# Netscape HTTP Cookie File
' > "$arg"; fi
  prev="$arg"
done
echo "ERROR: You must provide at least one URL." >&2
exit 2
"#,
        );
        let target = dir.path().join("_cookies.txt");

        let written = CliFetcher::new(script)
            .export_browser_cookies("chrome", &target)
            .await
            .unwrap();
        assert_eq!(written, target);
        assert!(std::fs::read_to_string(&target).unwrap().starts_with("# Netscape"));
        assert!(!dir.path().join("._cookies.txt.partial").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    #[serial_test::serial]
    async fn failed_cookie_export_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            dir.path(),
            r#"#!/bin/sh
echo "ERROR: could not find safari cookies database" >&2
exit 1
"#,
        );
        let target = dir.path().join("_cookies.txt");
        std::fs::write(&target, "old").unwrap();

        let err = CliFetcher::new(script)
            .export_browser_cookies("safari", &target)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::ExternalTool(ref m) if m.contains("cookies database")));
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "old");
    }

    #[tokio::test]
    async fn cookie_export_rejects_flag_like_browser() {
        let fetcher = CliFetcher::new(PathBuf::from("/nonexistent/yt-dlp-binary-xyz"));
        for browser in ["", "  ", "--exec"] {
            let err = fetcher
                .export_browser_cookies(browser, Path::new("/tmp/_cookies.txt"))
                .await
                .unwrap_err();
            assert!(matches!(err, crate::Error::Config { .. }), "{browser:?}");
        }
    }

    #[tokio::test]
    async fn missing_binary_is_an_external_tool_error() {
        let fetcher = CliFetcher::new(PathBuf::from("/nonexistent/yt-dlp-binary-xyz"));
        let err = fetcher.fetch_metadata("https://youtu.be/abc", None).await.unwrap_err();
        assert!(matches!(err, crate::Error::ExternalTool(_)));

        let err = fetcher
            .spawn_download(&[], "https://youtu.be/abc", Path::new("."))
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Download(crate::DownloadError::SpawnFailed { .. })
        ));
    }
}

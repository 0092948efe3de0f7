// CLI Extractor - drives the native `yt-dlp` binary
//
// resolve: `yt-dlp --dump-json` parsed into RawMedia
// stream:  `yt-dlp -f <id> -o -` piped into the reserved file, with a
//          machine-readable progress template on stderr

use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command as TokioCommand;

use super::traits::{ChunkCallback, Extractor, ExtractorConfig, RawMedia};
use crate::downloader::errors::FetchError;
use crate::downloader::models::MediaReference;
use crate::downloader::utils::run_output_with_timeout;

// yt-dlp strips the leading `download:` type selector; the marker is what it prints
const PROGRESS_TEMPLATE: &str = "download:[tubefetch]%(progress.downloaded_bytes)s/%(progress.total_bytes)s/%(progress.total_bytes_estimate)s";

lazy_static::lazy_static! {
    static ref PROGRESS_RE: Regex = Regex::new(
        r"^\[tubefetch\](\d+)/(\d+|NA|None)/(\d+(?:\.\d+)?|NA|None)"
    ).unwrap();
}

/// Parse a templated progress line into (downloaded, total)
fn parse_progress_line(line: &str) -> Option<(u64, Option<u64>)> {
    let caps = PROGRESS_RE.captures(line.trim())?;
    let downloaded: u64 = caps.get(1)?.as_str().parse().ok()?;
    let exact = caps.get(2).and_then(|m| m.as_str().parse::<u64>().ok());
    let estimate = caps
        .get(3)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(|f| f as u64);
    Some((downloaded, exact.or(estimate)))
}

/// Last `ERROR:` line of stderr, or the whole text
fn error_summary(stderr: &str, status: ExitStatus) -> String {
    let last_error = stderr
        .lines()
        .rev()
        .find(|l| l.trim_start().starts_with("ERROR:"))
        .map(|l| l.trim().to_string());
    match last_error {
        Some(line) => line,
        None if !stderr.trim().is_empty() => stderr.trim().to_string(),
        None => format!("yt-dlp exited with {}", status),
    }
}

/// Find yt-dlp binary: explicit path, `YTDLP_PATH`, common locations, then PATH
pub fn find_ytdlp(configured: Option<&Path>) -> PathBuf {
    if let Some(path) = configured {
        return path.to_path_buf();
    }
    if let Ok(custom) = std::env::var("YTDLP_PATH") {
        if !custom.trim().is_empty() {
            return PathBuf::from(custom);
        }
    }

    let common_paths = [
        "/opt/homebrew/bin/yt-dlp", // Homebrew on Apple Silicon
        "/usr/local/bin/yt-dlp",    // Homebrew on Intel Mac
        "/usr/bin/yt-dlp",
    ];
    for path in common_paths {
        if Path::new(path).exists() {
            return PathBuf::from(path);
        }
    }

    PathBuf::from("yt-dlp")
}

/// CLI-based extractor using the yt-dlp binary
pub struct CliExtractor {
    ytdlp_path: PathBuf,
    config: ExtractorConfig,
}

impl CliExtractor {
    pub fn new(ytdlp_path: PathBuf, config: ExtractorConfig) -> Self {
        Self { ytdlp_path, config }
    }

    fn program(&self) -> String {
        self.ytdlp_path.to_string_lossy().into_owned()
    }

    fn network_args(&self) -> Vec<String> {
        let mut args = vec![
            "--socket-timeout".to_string(),
            self.config.timeout_seconds.to_string(),
        ];

        if let Some(path) = &self.config.cookies_path {
            args.push("--cookies".to_string());
            args.push(path.clone());
        } else if let Some(browser) = &self.config.cookies_from_browser {
            args.push("--cookies-from-browser".to_string());
            args.push(browser.clone());
        }

        if let Some(proxy) = &self.config.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        args
    }

    fn resolve_args(&self, reference: &MediaReference) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
        ];
        args.extend(self.network_args());
        args.push(reference.as_str().to_string());
        args
    }

    fn stream_args(&self, reference: &MediaReference, format_id: &str) -> Vec<String> {
        // media on stdout; yt-dlp then logs and reports progress on stderr
        let mut args = vec![
            "-f".to_string(),
            format_id.to_string(),
            "-o".to_string(),
            "-".to_string(),
            "--no-part".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--newline".to_string(),
            "--progress-template".to_string(),
            PROGRESS_TEMPLATE.to_string(),
        ];
        args.extend(self.network_args());
        args.push(reference.as_str().to_string());
        args
    }

    fn parse_json(stdout: &[u8]) -> Result<RawMedia, FetchError> {
        serde_json::from_slice(stdout)
            .map_err(|e| FetchError::resolution(format!("Invalid JSON from yt-dlp: {}", e)))
    }
}

#[async_trait]
impl Extractor for CliExtractor {
    fn name(&self) -> &'static str {
        "cli-yt-dlp"
    }

    async fn resolve(&self, reference: &MediaReference) -> Result<RawMedia, FetchError> {
        let args = self.resolve_args(reference);
        tracing::debug!(program = %self.ytdlp_path.display(), ?args, "running yt-dlp");

        let output = run_output_with_timeout(
            &self.program(),
            args,
            u64::from(self.config.timeout_seconds),
        )
        .await
        .map_err(FetchError::resolution)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FetchError::resolution(error_summary(&stderr, output.status)));
        }

        Self::parse_json(&output.stdout)
    }

    async fn stream(
        &self,
        reference: &MediaReference,
        format_id: &str,
        destination: &Path,
        on_chunk: &mut ChunkCallback<'_>,
    ) -> Result<(), FetchError> {
        // write into the reserved file in place; it is never removed or recreated here
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(destination)
            .await
            .map_err(|e| FetchError::filesystem("Could not open output file", e))?;

        let args = self.stream_args(reference, format_id);
        tracing::debug!(program = %self.ytdlp_path.display(), ?args, "starting yt-dlp download");

        let mut child = TokioCommand::new(&self.ytdlp_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FetchError::transfer(format!("Failed to start yt-dlp: {}", e)))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| FetchError::transfer("Failed to capture yt-dlp stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| FetchError::transfer("Failed to capture yt-dlp stderr"))?;

        let copy = async {
            let written = tokio::io::copy(&mut stdout, &mut file).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok::<u64, std::io::Error>(written)
        };

        let watch = async {
            let mut diagnostics = String::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Some(line) = lines.next_line().await? {
                match parse_progress_line(&line) {
                    Some((downloaded, total)) => on_chunk(downloaded, total),
                    None => {
                        diagnostics.push_str(&line);
                        diagnostics.push('\n');
                    }
                }
            }
            Ok::<String, std::io::Error>(diagnostics)
        };

        let (copied, diagnostics) = tokio::join!(copy, watch);

        let status = child
            .wait()
            .await
            .map_err(|e| FetchError::transfer(format!("yt-dlp process failed: {}", e)))?;
        let diagnostics = diagnostics.unwrap_or_default();

        if !status.success() {
            return Err(FetchError::transfer(error_summary(&diagnostics, status)));
        }
        let written = copied
            .map_err(|e| FetchError::transfer(format!("Failed to write output file: {}", e)))?;
        tracing::debug!(path = %destination.display(), bytes = written, "yt-dlp stream finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> CliExtractor {
        CliExtractor::new(
            PathBuf::from("yt-dlp"),
            ExtractorConfig::default()
                .with_proxy(Some("socks5://127.0.0.1:1080".into()))
                .with_cookies_from_browser(Some("chrome".into())),
        )
    }

    #[test]
    fn parses_progress_with_exact_total() {
        assert_eq!(
            parse_progress_line("[tubefetch]250000/1000000/NA"),
            Some((250_000, Some(1_000_000)))
        );
    }

    #[test]
    fn parses_progress_with_estimate_only() {
        assert_eq!(
            parse_progress_line("[tubefetch]1024/NA/4096.5"),
            Some((1024, Some(4096)))
        );
        assert_eq!(parse_progress_line("[tubefetch]1024/NA/NA"), Some((1024, None)));
    }

    #[test]
    fn ignores_other_output() {
        assert_eq!(parse_progress_line("[youtube] abc: Downloading webpage"), None);
        assert_eq!(parse_progress_line("[download] Destination: a.mp4"), None);
        // the type selector never reaches the output
        assert_eq!(parse_progress_line("250000/1000000/NA"), None);
    }

    #[test]
    fn template_keeps_type_selector_and_marker() {
        let (selector, printed) = PROGRESS_TEMPLATE.split_once(':').unwrap();
        assert_eq!(selector, "download");
        assert!(printed.starts_with("[tubefetch]"));
    }

    #[test]
    fn parses_dump_json() {
        let json = br#"{
            "id": "abc",
            "title": "My Video",
            "thumbnail": "https://i.ytimg.com/vi/abc/hqdefault.jpg",
            "formats": [
                {"format_id": "140", "ext": "m4a", "acodec": "mp4a.40.2", "vcodec": "none", "format_note": "medium", "filesize": 1048576},
                {"format_id": "18", "ext": "mp4", "acodec": "mp4a.40.2", "vcodec": "avc1.42001E", "format_note": "360p", "filesize": 5242880, "tbr": 500.1}
            ]
        }"#;
        let raw = CliExtractor::parse_json(json).unwrap();
        assert_eq!(raw.title.as_deref(), Some("My Video"));
        assert_eq!(raw.formats.len(), 2);
        assert_eq!(raw.formats[1].note.as_deref(), Some("360p"));
    }

    #[test]
    fn invalid_json_is_a_resolution_error() {
        let err = CliExtractor::parse_json(b"not json").unwrap_err();
        assert_eq!(err.kind(), crate::downloader::errors::ErrorKind::Resolution);
    }

    #[test]
    fn stream_args_write_to_stdout_and_pass_network_options() {
        let reference = MediaReference::parse("https://youtu.be/abc").unwrap();
        let args = extractor().stream_args(&reference, "18");
        assert_eq!(&args[..4], &["-f", "18", "-o", "-"]);
        assert!(!args.contains(&"--force-overwrites".to_string()));
        assert!(args.windows(2).any(|w| w == ["--proxy", "socks5://127.0.0.1:1080"]));
        assert!(args.windows(2).any(|w| w == ["--cookies-from-browser", "chrome"]));
        assert_eq!(args.last().unwrap(), "https://youtu.be/abc");
    }

    #[test]
    fn cookies_file_takes_precedence() {
        let config = ExtractorConfig::default()
            .with_cookies_path(Some("/tmp/cookies.txt".into()))
            .with_cookies_from_browser(Some("chrome".into()));
        let args = CliExtractor::new(PathBuf::from("yt-dlp"), config).network_args();
        assert!(args.contains(&"--cookies".to_string()));
        assert!(!args.contains(&"--cookies-from-browser".to_string()));
    }

    #[test]
    fn configured_path_wins() {
        assert_eq!(
            find_ytdlp(Some(Path::new("/custom/yt-dlp"))),
            PathBuf::from("/custom/yt-dlp")
        );
    }

    #[tokio::test]
    async fn missing_binary_fails_resolution() {
        let extractor = CliExtractor::new(
            PathBuf::from("/nonexistent/yt-dlp-binary"),
            ExtractorConfig::default(),
        );
        let reference = MediaReference::parse("https://youtu.be/abc").unwrap();
        let err = extractor.resolve(&reference).await.unwrap_err();
        assert_eq!(err.kind(), crate::downloader::errors::ErrorKind::Resolution);
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use crate::downloader::errors::ErrorKind;
        use crate::downloader::naming::reserve;
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;

        /// Executable standing in for yt-dlp
        fn fake_ytdlp(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake-yt-dlp");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn reference() -> MediaReference {
            MediaReference::parse("https://youtu.be/abc").unwrap()
        }

        #[tokio::test]
        async fn stream_reports_chunks_and_fills_the_reserved_file() {
            let bin = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            let script = fake_ytdlp(
                bin.path(),
                "echo '[youtube] abc: Downloading webpage' >&2\n\
                 echo '[tubefetch]250000/1000000/NA' >&2\n\
                 printf 'media-bytes'\n\
                 echo '[tubefetch]1000000/1000000/NA' >&2\n\
                 exit 0",
            );
            let extractor = CliExtractor::new(script, ExtractorConfig::default());
            let reserved = reserve(out.path(), "Clip", "mp4").await.unwrap();

            let mut chunks = Vec::new();
            let mut on_chunk = |d: u64, t: Option<u64>| chunks.push((d, t));
            extractor
                .stream(&reference(), "18", reserved.path(), &mut on_chunk)
                .await
                .unwrap();

            assert_eq!(
                chunks,
                vec![(250_000, Some(1_000_000)), (1_000_000, Some(1_000_000))]
            );
            let path = reserved.commit();
            assert_eq!(std::fs::read(&path).unwrap(), b"media-bytes");
        }

        #[tokio::test]
        async fn failing_process_is_a_transfer_error() {
            let bin = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            let script = fake_ytdlp(
                bin.path(),
                "echo '[tubefetch]10/100/NA' >&2\n\
                 echo 'ERROR: [youtube] abc: Video unavailable' >&2\n\
                 exit 1",
            );
            let extractor = CliExtractor::new(script, ExtractorConfig::default());
            let reserved = reserve(out.path(), "Clip", "mp4").await.unwrap();

            let mut calls = 0;
            let mut on_chunk = |_: u64, _: Option<u64>| calls += 1;
            let err = extractor
                .stream(&reference(), "18", reserved.path(), &mut on_chunk)
                .await
                .unwrap_err();

            assert_eq!(calls, 1);
            assert_eq!(err.kind(), ErrorKind::Transfer);
            assert_eq!(err.message(), "ERROR: [youtube] abc: Video unavailable");
        }

        #[tokio::test]
        async fn reservation_holds_while_streaming() {
            let bin = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            let script = fake_ytdlp(
                bin.path(),
                "echo '[tubefetch]1/2/NA' >&2\n\
                 sleep 0.3\n\
                 printf 'xy'\n\
                 exit 0",
            );
            let extractor = CliExtractor::new(script, ExtractorConfig::default());
            let first = reserve(out.path(), "Same", "mp4").await.unwrap();

            let mut on_chunk = |_: u64, _: Option<u64>| {};
            let media = reference();
            let (streamed, second) = tokio::join!(
                extractor.stream(&media, "18", first.path(), &mut on_chunk),
                async {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    reserve(out.path(), "Same", "mp4").await
                }
            );

            streamed.unwrap();
            let second = second.unwrap();
            assert_eq!(second.path().file_name().unwrap(), "Same (1).mp4");
            assert_eq!(std::fs::read(first.path()).unwrap(), b"xy");
        }

        #[tokio::test]
        async fn missing_destination_is_not_recreated() {
            let bin = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            let script = fake_ytdlp(bin.path(), "printf 'data'\nexit 0");
            let extractor = CliExtractor::new(script, ExtractorConfig::default());
            let destination = out.path().join("gone.mp4");

            let mut on_chunk = |_: u64, _: Option<u64>| {};
            let err = extractor
                .stream(&reference(), "18", &destination, &mut on_chunk)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Filesystem);
            assert!(!destination.exists());
        }
    }
}

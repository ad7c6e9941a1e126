//! yt-dlp backed extractor
//!
//! Metadata comes from `yt-dlp --dump-single-json`, streams from
//! `yt-dlp -f <selector> -o -` with the child's stdout forwarded chunk by
//! chunk.

use async_trait::async_trait;
use bytes::BytesMut;
use futures_util::stream;
use serde::Deserialize;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;

use super::{ByteStream, RawFormat, RawVideoInfo, RetryConfig, StreamOptions, Thumbnail, VideoExtractor};
use crate::config::ExtractorConfig;
use crate::error::ExtractError;

/// Read size for the download pipe
const CHUNK_SIZE: usize = 64 * 1024;

/// Extractor driving the yt-dlp executable
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: String,
    extra_args: Vec<String>,
}

impl YtDlp {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            extra_args: Vec::new(),
        }
    }

    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self {
            extra_args: config.extra_args.clone(),
            ..Self::new(config.binary.clone())
        }
    }

    fn info_args(&self, url: &str, retry: &RetryConfig) -> Vec<String> {
        let mut args: Vec<String> = [
            "--dump-single-json",
            "--skip-download",
            "--no-playlist",
            "--no-warnings",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let retries = retry.max_retries.to_string();
        args.extend([
            "--retries".to_string(),
            retries.clone(),
            "--extractor-retries".to_string(),
            retries,
        ]);
        if retry.max_retries > 0 {
            let sleep = format!(
                "exp={}:{}",
                seconds(retry.backoff_inc),
                seconds(retry.backoff_max)
            );
            args.extend([
                "--retry-sleep".to_string(),
                sleep.clone(),
                "--retry-sleep".to_string(),
                format!("extractor:{}", sleep),
            ]);
        }

        args.extend(self.extra_args.iter().cloned());
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    fn stream_args(&self, url: &str, options: &StreamOptions) -> Vec<String> {
        let mut args: Vec<String> = [
            "--no-playlist",
            "--no-warnings",
            "--quiet",
            "--no-part",
            "--retries",
            "0",
            "--fragment-retries",
            "0",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        args.push("-f".to_string());
        args.push(format_selector(options));
        args.push("-o".to_string());
        args.push("-".to_string());
        args.extend(self.extra_args.iter().cloned());
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    fn command(&self, args: &[String]) -> Command {
        tracing::debug!("{} {}", self.binary, args.join(" "));
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }

    fn spawn_error(&self, source: io::Error) -> ExtractError {
        ExtractError::Spawn {
            binary: self.binary.clone(),
            source,
        }
    }
}

#[async_trait]
impl VideoExtractor for YtDlp {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn get_info(&self, url: &str, retry: &RetryConfig) -> Result<RawVideoInfo, ExtractError> {
        let output = self
            .command(&self.info_args(url, retry))
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::Failed {
                message: error_message(&stderr, output.status.code()),
            });
        }

        parse_info(&output.stdout)
    }

    async fn open_stream(
        &self,
        url: &str,
        options: &StreamOptions,
    ) -> Result<ByteStream, ExtractError> {
        let mut child = self
            .command(&self.stream_args(url, options))
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stderr = child.stderr.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExtractError::Io(io::Error::other("yt-dlp stdout not captured")))?;

        Ok(child_stream(stdout, stderr, child))
    }
}

fn seconds(d: Duration) -> String {
    format!("{}", d.as_secs_f64())
}

/// yt-dlp format selector for one format id
fn format_selector(options: &StreamOptions) -> String {
    if options.require_audio_and_video {
        format!("{}[vcodec!=none][acodec!=none]", options.format_id)
    } else {
        options.format_id.clone()
    }
}

/// Pick the user-facing message out of yt-dlp's stderr
fn error_message(stderr: &str, code: Option<i32>) -> String {
    let lines = || stderr.lines().map(str::trim).filter(|l| !l.is_empty());

    if let Some(line) = lines().filter(|l| l.starts_with("ERROR:")).last() {
        return line.trim_start_matches("ERROR:").trim().to_string();
    }
    if let Some(line) = lines().last() {
        return line.to_string();
    }
    match code {
        Some(code) => format!("yt-dlp exited with status {}", code),
        None => "yt-dlp was terminated by a signal".to_string(),
    }
}

/// Log the child's stderr as it arrives and hand back everything it wrote
fn collect_stderr(stderr: ChildStderr) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut collected = String::new();
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.starts_with("ERROR:") {
                tracing::warn!("yt-dlp: {}", line);
            } else {
                tracing::debug!("yt-dlp: {}", line);
            }
            collected.push_str(&line);
            collected.push('\n');
        }
        collected
    })
}

struct ChildOutput {
    stdout: ChildStdout,
    stderr: Option<JoinHandle<String>>,
    child: Option<Child>,
}

impl ChildOutput {
    /// Error for a non-zero exit, carrying yt-dlp's own message
    async fn exit_error(&mut self, code: Option<i32>) -> io::Error {
        let stderr = match self.stderr.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };
        io::Error::other(error_message(&stderr, code))
    }
}

/// Forward a child's stdout as a byte stream.
///
/// Each chunk is read only when the consumer polls, so a slow client stalls
/// the pipe instead of growing a buffer. A non-zero exit after EOF is
/// reported as a stream error whose text is the last `ERROR:` line on stderr.
fn child_stream(stdout: ChildStdout, stderr: Option<ChildStderr>, child: Child) -> ByteStream {
    let output = ChildOutput {
        stdout,
        stderr: stderr.map(collect_stderr),
        child: Some(child),
    };

    Box::pin(stream::unfold(output, |mut output| async move {
        let mut child = output.child.take()?;
        let mut buf = BytesMut::with_capacity(CHUNK_SIZE);

        match output.stdout.read_buf(&mut buf).await {
            Ok(0) => match child.wait().await {
                Ok(status) if status.success() => None,
                Ok(status) => {
                    tracing::error!("yt-dlp stream ended with {}", status);
                    let err = output.exit_error(status.code()).await;
                    Some((Err(err), output))
                }
                Err(e) => Some((Err(e), output)),
            },
            Ok(_) => {
                output.child = Some(child);
                Some((Ok(buf.freeze()), output))
            }
            Err(e) => Some((Err(e), output)),
        }
    }))
}

#[derive(Debug, Deserialize)]
struct InfoJson {
    title: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    thumbnails: Option<Vec<ThumbnailJson>>,
    formats: Option<Vec<FormatJson>>,
}

#[derive(Debug, Deserialize)]
struct ThumbnailJson {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FormatJson {
    format_id: Option<String>,
    ext: Option<String>,
    vcodec: Option<String>,
    acodec: Option<String>,
    format_note: Option<String>,
    height: Option<u32>,
    filesize: Option<f64>,
    filesize_approx: Option<f64>,
}

fn has_codec(codec: &Option<String>) -> bool {
    codec.as_deref().is_some_and(|c| !c.is_empty() && c != "none")
}

impl FormatJson {
    fn into_raw(self) -> Option<RawFormat> {
        let quality_label = self
            .format_note
            .filter(|note| note.starts_with(|c: char| c.is_ascii_digit()))
            .or_else(|| self.height.map(|h| format!("{}p", h)));

        Some(RawFormat {
            has_video: has_codec(&self.vcodec),
            has_audio: has_codec(&self.acodec),
            id: self.format_id?,
            container: self.ext.unwrap_or_default(),
            quality_label,
            content_length: self
                .filesize
                .or(self.filesize_approx)
                .filter(|size| *size >= 0.0)
                .map(|size| size as u64),
        })
    }
}

/// Narrow `--dump-single-json` output into [`RawVideoInfo`]
fn parse_info(stdout: &[u8]) -> Result<RawVideoInfo, ExtractError> {
    let info: InfoJson = serde_json::from_slice(stdout)?;

    let mut thumbnails: Vec<Thumbnail> = info
        .thumbnails
        .unwrap_or_default()
        .into_iter()
        .filter_map(|t| t.url)
        .map(|url| Thumbnail { url })
        .collect();
    if thumbnails.is_empty() {
        thumbnails.extend(info.thumbnail.map(|url| Thumbnail { url }));
    }

    Ok(RawVideoInfo {
        title: info.title.ok_or(ExtractError::MissingField("title"))?,
        thumbnails,
        length_seconds: info.duration.filter(|d| *d > 0.0).map_or(0, |d| d as u64),
        formats: info
            .formats
            .unwrap_or_default()
            .into_iter()
            .filter_map(FormatJson::into_raw)
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    const SAMPLE: &str = r#"{
        "id": "dQw4w9WgXcQ",
        "title": "Rick Astley - Never Gonna Give You Up",
        "duration": 212.0,
        "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg",
        "thumbnails": [
            {"url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/default.jpg", "preference": -10},
            {"url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg", "preference": 0}
        ],
        "formats": [
            {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2",
             "format_note": "medium", "filesize": 3433514},
            {"format_id": "18", "ext": "mp4", "vcodec": "avc1.42001E", "acodec": "mp4a.40.2",
             "format_note": "360p", "height": 360, "filesize_approx": 8500000.0},
            {"format_id": "137", "ext": "mp4", "vcodec": "avc1.640028", "acodec": "none",
             "format_note": "1080p", "height": 1080, "filesize": null},
            {"format_id": "sb0", "ext": "mhtml", "vcodec": "none", "acodec": "none",
             "format_note": "storyboard"},
            {"ext": "mp4"}
        ]
    }"#;

    #[test]
    fn test_parse_info() {
        let info = parse_info(SAMPLE.as_bytes()).unwrap();
        assert_eq!(info.title, "Rick Astley - Never Gonna Give You Up");
        assert_eq!(info.length_seconds, 212);
        assert_eq!(
            info.thumbnails.last().unwrap().url,
            "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg"
        );
        // the entry without format_id is dropped
        assert_eq!(info.formats.len(), 4);

        let audio = &info.formats[0];
        assert!(!audio.has_video && audio.has_audio);
        assert_eq!(audio.quality_label, None);
        assert_eq!(audio.content_length, Some(3433514));

        let muxed = &info.formats[1];
        assert_eq!(muxed.id, "18");
        assert!(muxed.has_video && muxed.has_audio);
        assert_eq!(muxed.container, "mp4");
        assert_eq!(muxed.quality_label.as_deref(), Some("360p"));
        assert_eq!(muxed.content_length, Some(8500000));

        let video_only = &info.formats[2];
        assert!(video_only.has_video && !video_only.has_audio);
        assert_eq!(video_only.content_length, None);
    }

    #[test]
    fn test_parse_info_fallbacks() {
        let info = parse_info(
            br#"{"title": "live", "thumbnail": "https://x/t.jpg", "thumbnails": null,
                 "formats": [{"format_id": "22", "ext": "mp4", "vcodec": "avc1",
                              "acodec": "mp4a", "height": 720}]}"#,
        )
        .unwrap();
        assert_eq!(info.length_seconds, 0);
        assert_eq!(info.thumbnails, vec![Thumbnail { url: "https://x/t.jpg".to_string() }]);
        assert_eq!(info.formats[0].quality_label.as_deref(), Some("720p"));
    }

    #[test]
    fn test_parse_info_requires_title() {
        let err = parse_info(br#"{"formats": []}"#).unwrap_err();
        assert!(matches!(err, ExtractError::MissingField("title")));

        let err = parse_info(b"<html>").unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }

    #[test]
    fn test_info_args_carry_retry_policy() {
        let ytdlp = YtDlp::new("yt-dlp");
        let args = ytdlp.info_args("https://youtu.be/dQw4w9WgXcQ", &RetryConfig::default());

        assert_eq!(args[0], "--dump-single-json");
        let joined = args.join(" ");
        assert!(joined.contains("--retries 3"));
        assert!(joined.contains("--extractor-retries 3"));
        assert!(joined.contains("--retry-sleep exp=0.1:1"));
        assert!(joined.contains("--retry-sleep extractor:exp=0.1:1"));
        assert_eq!(&args[args.len() - 2..], ["--", "https://youtu.be/dQw4w9WgXcQ"]);
    }

    #[test]
    fn test_info_args_without_retries() {
        let ytdlp = YtDlp::new("yt-dlp");
        let args = ytdlp.info_args("https://youtu.be/dQw4w9WgXcQ", &RetryConfig::disabled());
        let joined = args.join(" ");
        assert!(joined.contains("--retries 0"));
        assert!(!joined.contains("--retry-sleep"));
    }

    #[test]
    fn test_stream_args() {
        let mut ytdlp = YtDlp::new("yt-dlp");
        ytdlp.extra_args = vec!["--cookies".to_string(), "cookies.txt".to_string()];
        let options = StreamOptions {
            format_id: "18".to_string(),
            require_audio_and_video: true,
        };
        let args = ytdlp.stream_args("https://youtu.be/dQw4w9WgXcQ", &options);
        let joined = args.join(" ");
        assert!(joined.contains("-f 18[vcodec!=none][acodec!=none]"));
        assert!(joined.contains("-o - --cookies cookies.txt -- https://youtu.be/dQw4w9WgXcQ"));
    }

    #[test]
    fn test_error_message() {
        let stderr = "WARNING: [youtube] falling back\nERROR: [youtube] dQw4w9WgXcQ: Video unavailable\n";
        assert_eq!(
            error_message(stderr, Some(1)),
            "[youtube] dQw4w9WgXcQ: Video unavailable"
        );
        assert_eq!(error_message("Traceback\n  boom\n", Some(1)), "boom");
        assert_eq!(error_message("", Some(2)), "yt-dlp exited with status 2");
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let ytdlp = YtDlp::new("/nonexistent/yt-dlp");
        let err = ytdlp
            .get_info("https://youtu.be/dQw4w9WgXcQ", &RetryConfig::disabled())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_child_stream_forwards_stdout() {
        let mut child = Command::new("sh")
            .args(["-c", "printf 'hello '; printf 'world'"])
            .stdout(Stdio::piped())
            .spawn()
            .unwrap();
        let stdout = child.stdout.take().unwrap();

        let chunks: Vec<_> = child_stream(stdout, None, child).collect().await;
        let body: Vec<u8> = chunks
            .into_iter()
            .map(|c| c.unwrap())
            .flat_map(|b| b.to_vec())
            .collect();
        assert_eq!(body, b"hello world");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_child_stream_reports_failed_exit() {
        let mut child = Command::new("sh")
            .args(["-c", "printf partial; exit 3"])
            .stdout(Stdio::piped())
            .spawn()
            .unwrap();
        let stdout = child.stdout.take().unwrap();

        let chunks: Vec<_> = child_stream(stdout, None, child).collect().await;
        assert!(chunks.first().unwrap().is_ok());
        assert!(chunks.last().unwrap().is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_child_stream_reports_stderr_error_before_any_bytes() {
        let mut child = Command::new("sh")
            .args([
                "-c",
                "echo '[youtube] dQw4w9WgXcQ: Downloading webpage' >&2; \
                 echo 'ERROR: [youtube] dQw4w9WgXcQ: Requested format is not available' >&2; \
                 exit 1",
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        let stdout = child.stdout.take().unwrap();
        let stderr = child.stderr.take();

        let chunks: Vec<_> = child_stream(stdout, stderr, child).collect().await;
        assert_eq!(chunks.len(), 1);
        let err = chunks.into_iter().next().unwrap().unwrap_err();
        assert_eq!(
            err.to_string(),
            "[youtube] dQw4w9WgXcQ: Requested format is not available"
        );
    }
}

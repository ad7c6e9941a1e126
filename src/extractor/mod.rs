//! Video extraction boundary
//!
//! Everything platform specific (page parsing, signature handling, format
//! discovery) lives behind [`VideoExtractor`]. The rest of the server only
//! sees the typed records defined here.

pub mod url;
pub mod ytdlp;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use std::time::Duration;

use crate::error::ExtractError;

pub use self::url::is_valid_video_url;
pub use self::ytdlp::YtDlp;

/// Byte stream of a single encoding, produced lazily
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Thumbnail reference, ordered from smallest to largest by the extractor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub url: String,
}

/// One encoded variant of a video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFormat {
    /// Platform format identifier ("itag")
    pub id: String,
    pub has_video: bool,
    pub has_audio: bool,
    /// Container extension, e.g. `mp4` or `webm`
    pub container: String,
    /// Resolution label such as `720p` or `1080p60`
    pub quality_label: Option<String>,
    /// Size in bytes when the platform advertises it
    pub content_length: Option<u64>,
}

/// Metadata reported by the extractor for one video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawVideoInfo {
    pub title: String,
    pub thumbnails: Vec<Thumbnail>,
    pub length_seconds: u64,
    pub formats: Vec<RawFormat>,
}

/// Retry policy handed to the extractor for metadata lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub backoff_inc: Duration,
    pub backoff_max: Duration,
}

impl RetryConfig {
    /// Single attempt, no retries
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            backoff_inc: Duration::ZERO,
            backoff_max: Duration::ZERO,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_inc: Duration::from_millis(100),
            backoff_max: Duration::from_millis(1000),
        }
    }
}

/// Selection of the encoding to stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOptions {
    pub format_id: String,
    pub require_audio_and_video: bool,
}

/// Video extraction collaborator
#[async_trait]
pub trait VideoExtractor: Send + Sync {
    /// Name of the extractor (for logging)
    fn name(&self) -> &'static str;

    /// Whether `url` points at a video on the supported platform
    fn is_valid_url(&self, url: &str) -> bool {
        is_valid_video_url(url)
    }

    /// Fetch video metadata, retrying transient failures per `retry`
    async fn get_info(&self, url: &str, retry: &RetryConfig) -> Result<RawVideoInfo, ExtractError>;

    /// Open a byte stream for one encoding of the video
    async fn open_stream(
        &self,
        url: &str,
        options: &StreamOptions,
    ) -> Result<ByteStream, ExtractError>;
}

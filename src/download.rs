//! Stream setup for `/download`

use futures_util::{stream, StreamExt};
use thiserror::Error;

use crate::config::DownloadConfig;
use crate::extractor::{ByteStream, RetryConfig, StreamOptions, VideoExtractor};

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Invalid URL or format")]
    InvalidRequest,

    #[error("Error downloading video: {0}")]
    DownloadFailure(String),
}

/// An opened download, ready to be piped into a response
pub struct Download {
    pub filename: String,
    pub stream: ByteStream,
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("filename", &self.filename)
            .finish_non_exhaustive()
    }
}

/// Replace everything outside `[A-Za-z0-9]` with `_` and cap the length
pub fn sanitize_title(title: &str, max_len: usize) -> String {
    title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(max_len)
        .collect()
}

/// `<prefix>_<sanitized title>.mp4`
pub fn attachment_filename(title: &str, config: &DownloadConfig) -> String {
    format!(
        "{}_{}.mp4",
        config.filename_prefix,
        sanitize_title(title, config.max_title_len)
    )
}

/// Validate the request, name the file and open the stream.
///
/// Metadata is fetched again here, independently of any earlier `/info`
/// call. The format id is passed through without checking it against the
/// advertised list. The first chunk is awaited here so that a stream which
/// fails before producing any bytes (an unavailable format, for instance)
/// is reported as a [`DownloadError::DownloadFailure`] rather than a
/// truncated attachment.
pub async fn prepare_download(
    extractor: &dyn VideoExtractor,
    url: Option<&str>,
    itag: Option<&str>,
    config: &DownloadConfig,
) -> Result<Download, DownloadError> {
    let (url, itag) = match (url, itag) {
        (Some(url), Some(itag))
            if !url.is_empty() && !itag.is_empty() && extractor.is_valid_url(url) =>
        {
            (url, itag)
        }
        _ => {
            tracing::error!("Invalid URL or itag: url={:?} itag={:?}", url, itag);
            return Err(DownloadError::InvalidRequest);
        }
    };

    let failure = |e: crate::error::ExtractError| {
        tracing::error!("Error downloading video: {}", e);
        DownloadError::DownloadFailure(e.to_string())
    };

    let info = extractor
        .get_info(url, &RetryConfig::disabled())
        .await
        .map_err(failure)?;
    let filename = attachment_filename(&info.title, config);

    let options = StreamOptions {
        format_id: itag.to_string(),
        require_audio_and_video: true,
    };
    let mut rest = extractor.open_stream(url, &options).await.map_err(failure)?;

    let stream: ByteStream = match rest.next().await {
        Some(Ok(first)) => Box::pin(stream::once(async move { Ok(first) }).chain(rest)),
        Some(Err(e)) => {
            tracing::error!("Error downloading video: {}", e);
            return Err(DownloadError::DownloadFailure(e.to_string()));
        }
        None => Box::pin(stream::empty()),
    };

    tracing::info!("Streaming video: {}", filename);
    Ok(Download { filename, stream })
}

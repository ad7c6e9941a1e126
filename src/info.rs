//! Video metadata resolution for `/info`

use serde::Serialize;
use thiserror::Error;

use crate::duration::format_duration;
use crate::extractor::{RawFormat, RetryConfig, VideoExtractor};

/// Downloadable encoding advertised to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatSummary {
    pub itag: String,
    pub resolution: String,
    pub size: String,
}

/// `/info` response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoInfo {
    pub title: String,
    pub thumbnail: String,
    pub duration: String,
    pub formats: Vec<FormatSummary>,
}

#[derive(Error, Debug)]
pub enum InfoError {
    #[error("Invalid YouTube URL")]
    InvalidUrl,

    #[error("No downloadable formats found")]
    NoFormatsAvailable,

    #[error("Error fetching video info: {0}")]
    UpstreamExtractionFailure(String),
}

/// Leading integer of a resolution label, 0 when there is none
fn resolution_rank(label: &str) -> u32 {
    let trimmed = label.trim_start();
    let digits = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .map_or(trimmed, |end| &trimmed[..end]);
    digits.parse().unwrap_or(0)
}

fn human_size(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

/// Keep muxed mp4 formats, highest resolution first
pub fn summarize_formats(formats: &[RawFormat]) -> Vec<FormatSummary> {
    let mut summaries: Vec<FormatSummary> = formats
        .iter()
        .filter(|f| f.has_video && f.has_audio && f.container == "mp4")
        .map(|f| FormatSummary {
            itag: f.id.clone(),
            resolution: f
                .quality_label
                .clone()
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            size: f.content_length.map_or_else(|| "Unknown".to_string(), human_size),
        })
        .collect();

    // stable: equal resolutions keep extractor order
    summaries.sort_by_key(|s| std::cmp::Reverse(resolution_rank(&s.resolution)));
    summaries
}

/// Resolve `/info` for a URL
pub async fn resolve_info(
    extractor: &dyn VideoExtractor,
    url: Option<&str>,
    retry: &RetryConfig,
) -> Result<VideoInfo, InfoError> {
    let url = match url {
        Some(url) if !url.is_empty() && extractor.is_valid_url(url) => url,
        _ => {
            tracing::error!("Invalid YouTube URL: {:?}", url);
            return Err(InfoError::InvalidUrl);
        }
    };

    let info = extractor.get_info(url, retry).await.map_err(|e| {
        tracing::error!("Error fetching video info: {}", e);
        InfoError::UpstreamExtractionFailure(e.to_string())
    })?;
    tracing::info!("Video info retrieved: {}", info.title);

    let formats = summarize_formats(&info.formats);
    if formats.is_empty() {
        tracing::error!("No suitable formats found for URL: {}", url);
        return Err(InfoError::NoFormatsAvailable);
    }

    Ok(VideoInfo {
        thumbnail: info
            .thumbnails
            .last()
            .map(|t| t.url.clone())
            .unwrap_or_default(),
        duration: format_duration(info.length_seconds),
        title: info.title,
        formats,
    })
}

//! HTTP request handlers

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::download::{prepare_download, DownloadError};
use crate::info::{resolve_info, InfoError, VideoInfo};
use crate::state::AppState;

/// Query parameters for `/info`
#[derive(Debug, Deserialize)]
pub struct InfoQuery {
    pub url: Option<String>,
}

/// Query parameters for `/download`
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub url: Option<String>,
    pub itag: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for InfoError {
    fn into_response(self) -> Response {
        let status = match self {
            InfoError::InvalidUrl => StatusCode::BAD_REQUEST,
            InfoError::NoFormatsAvailable => StatusCode::NOT_FOUND,
            InfoError::UpstreamExtractionFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

// Plain text, unlike /info
impl IntoResponse for DownloadError {
    fn into_response(self) -> Response {
        let status = match self {
            DownloadError::InvalidRequest => StatusCode::BAD_REQUEST,
            DownloadError::DownloadFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub name: &'static str,
    pub version: &'static str,
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Version endpoint
pub async fn version_check() -> Json<VersionResponse> {
    Json(VersionResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Video metadata endpoint
/// GET /info?url=...
pub async fn video_info(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InfoQuery>,
) -> Result<Json<VideoInfo>, InfoError> {
    tracing::info!("Received /info request for URL: {:?}", query.url);

    let retry = state.config.extractor.retry();
    let info = resolve_info(state.extractor.as_ref(), query.url.as_deref(), &retry).await?;

    Ok(Json(info))
}

/// Video download endpoint
/// GET /download?url=...&itag=...
pub async fn download_video(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, DownloadError> {
    tracing::info!(
        "Received /download request for URL: {:?} itag: {:?}",
        query.url,
        query.itag
    );

    let download = prepare_download(
        state.extractor.as_ref(),
        query.url.as_deref(),
        query.itag.as_deref(),
        &state.config.download,
    )
    .await?;

    let disposition = format!("attachment; filename=\"{}\"", download.filename);
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|e| DownloadError::DownloadFailure(e.to_string()))?;

    // Errors after this point abort the connection mid-body
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(download.stream))
        .map_err(|e| {
            tracing::error!("Response building error in download: {}", e);
            DownloadError::DownloadFailure(e.to_string())
        })
}

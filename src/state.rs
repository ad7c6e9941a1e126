//! Application state
//!
//! Shared read-only across requests: the configuration and the extractor.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::extractor::{VideoExtractor, YtDlp};

pub struct AppState {
    pub config: ServerConfig,
    pub extractor: Arc<dyn VideoExtractor>,
}

impl AppState {
    /// State backed by the yt-dlp extractor from `config`
    pub fn new(config: ServerConfig) -> Self {
        let extractor = Arc::new(YtDlp::from_config(&config.extractor));
        Self::with_extractor(config, extractor)
    }

    pub fn with_extractor(config: ServerConfig, extractor: Arc<dyn VideoExtractor>) -> Self {
        Self { config, extractor }
    }
}

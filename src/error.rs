use thiserror::Error;

/// Main error type for the server process
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid listen address: {0}")]
    InvalidAddress(String),
}

/// Failures reported by the video extraction collaborator
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to start {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The extractor ran but reported a failure; `message` is its own text
    #[error("{message}")]
    Failed { message: String },

    #[error("malformed extractor output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("extractor output is missing `{0}`")]
    MissingField(&'static str),
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ServerError>;

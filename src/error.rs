//! Typed failures for the analysis pipeline.
//!
//! Fetch failures are classified so callers can tell a missing file from a
//! rate limit; nothing in this crate retries on their behalf.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited while fetching {0}")]
    RateLimited(String),

    #[error("HTTP {status} while fetching {path}")]
    Http { status: u16, path: String },

    #[error("network error while fetching {path}: {message}")]
    Network { path: String, message: String },
}

impl FetchError {
    /// Whether the run must stop issuing new requests.
    pub fn halts_run(&self) -> bool {
        matches!(self, FetchError::RateLimited(_))
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid configuration file {path}: {source}")]
    InvalidConfig {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} looks like binary content")]
    Binary(String),

    #[error("pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("unknown boundary: {0}")]
    UnknownBoundary(String),

    #[error("drawing surface has no area ({width}x{height})")]
    EmptySurface { width: u32, height: u32 },

    #[error("formatting failed: {0}")]
    Format(String),

    #[error("animation needs a running tokio runtime")]
    NoRuntime,
}

impl From<std::fmt::Error> for RenderError {
    fn from(err: std::fmt::Error) -> Self {
        RenderError::Format(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("directory walk failed: {0}")]
    Walk(#[from] ignore::Error),

    #[error("worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

use std::io;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("video not found or extractor rejected the url")]
    NotFound { stderr: String },
    #[error("video requires authentication to view")]
    AuthRequired { stderr: String },
    #[error("video is not available in this region")]
    GeoBlocked { stderr: String },
    #[error("no mp4 format at or below {limit}px wide")]
    NoSuitableFormat { limit: u32 },
    #[error("extractor returned no stream url for format {format_id}")]
    StreamUrlUnavailable { format_id: String },
    #[error("{tool} exited with {status}: {stderr}")]
    CommandFailure {
        tool: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("{tool} did not finish within {timeout:?}")]
    Timeout { tool: String, timeout: Duration },
    #[error("failed to spawn {tool}: {source}")]
    Io { tool: String, source: io::Error },
    #[error("unparseable extractor output: {0}")]
    InvalidOutput(String),
}

pub type ResolverResult<T> = std::result::Result<T, ResolverError>;

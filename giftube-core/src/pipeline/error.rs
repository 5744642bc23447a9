use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::duration::DurationError;
use crate::media::MediaError;
use crate::resolver::ResolverError;

/// Where in the run a failure happened. Recorded in logs and reports so an
/// operator can tell a bad request from a broken tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Validating,
    FetchingMetadata,
    SelectingFormat,
    ResolvingStreamUrl,
    Cropping,
    Watermarking,
    Verifying,
    Delivering,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Validating => "validating",
            PipelineStage::FetchingMetadata => "fetching-metadata",
            PipelineStage::SelectingFormat => "selecting-format",
            PipelineStage::ResolvingStreamUrl => "resolving-stream-url",
            PipelineStage::Cropping => "cropping",
            PipelineStage::Watermarking => "watermarking",
            PipelineStage::Verifying => "verifying",
            PipelineStage::Delivering => "delivering",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] DurationError),
    #[error("metadata lookup failed: {0}")]
    Metadata(ResolverError),
    #[error("format selection failed: {0}")]
    Format(ResolverError),
    #[error("stream resolution failed: {0}")]
    StreamUrl(ResolverError),
    #[error("transcode failed: {0}")]
    Transcode(MediaError),
    #[error("watermark embed failed: {0}")]
    Watermark(MediaError),
    #[error("produced artifact is corrupt: {0}")]
    CorruptOutput(PathBuf),
}

impl PipelineError {
    pub fn stage(&self) -> PipelineStage {
        match self {
            PipelineError::Validation(_) => PipelineStage::Validating,
            PipelineError::Metadata(_) => PipelineStage::FetchingMetadata,
            PipelineError::Format(_) => PipelineStage::SelectingFormat,
            PipelineError::StreamUrl(_) => PipelineStage::ResolvingStreamUrl,
            PipelineError::Transcode(_) => PipelineStage::Cropping,
            PipelineError::Watermark(_) => PipelineStage::Watermarking,
            PipelineError::CorruptOutput(_) => PipelineStage::Verifying,
        }
    }

    /// Fixed, user-facing phrasing per failure class. Tool stderr and io
    /// details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Validation(err) => format!("{err}. Please try again."),
            PipelineError::Metadata(ResolverError::AuthRequired { .. }) => {
                "The video requires authentication to view.".to_string()
            }
            PipelineError::Metadata(ResolverError::GeoBlocked { .. }) => {
                "The uploader has not made this video available in your country.".to_string()
            }
            PipelineError::Metadata(_) => {
                "The video does not exist! Check the url that you passed.".to_string()
            }
            PipelineError::Format(_) | PipelineError::StreamUrl(_) => {
                "Error occurred while converting the video! Please try again.".to_string()
            }
            PipelineError::Transcode(_) => "The video cannot be created properly.".to_string(),
            PipelineError::Watermark(_) => "The logo cannot be embedded.".to_string(),
            PipelineError::CorruptOutput(_) => "The video is corrupted.".to_string(),
        }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

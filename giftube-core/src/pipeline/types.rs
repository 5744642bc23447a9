use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::delivery::{ChatId, DeliveryReceipt};
use crate::duration::{ClipDuration, NormalizedRange};
use crate::fingerprint::ClipFingerprint;
use crate::resolver::VideoMetadata;

/// One incoming clip command, as parsed from a chat message or the CLI.
#[derive(Debug, Clone)]
pub struct ClipRequest {
    pub chat: ChatId,
    pub url: String,
    pub raw_start: Option<String>,
    pub raw_span: Option<String>,
    /// Attach the metadata caption to the delivered clip.
    pub show_info: bool,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_span: ClipDuration,
    pub resolution_limit: u32,
    pub scale_threshold: u32,
    pub watermark: PathBuf,
    pub caption_limit: usize,
}

impl PipelineSettings {
    pub fn from_config(config: &crate::config::GiftubeConfig) -> Self {
        Self {
            max_span: config.max_span(),
            resolution_limit: config.clip.resolution_limit,
            scale_threshold: config.clip.scale_threshold,
            watermark: config.watermark_path(),
            caption_limit: config.delivery.caption_limit,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClipReport {
    pub fingerprint: ClipFingerprint,
    pub artifact: PathBuf,
    pub range: NormalizedRange,
    pub metadata: VideoMetadata,
    /// None when the clip was produced but the upload failed.
    pub receipt: Option<DeliveryReceipt>,
    pub completed_at: DateTime<Utc>,
    #[serde(skip)]
    pub elapsed: Duration,
}

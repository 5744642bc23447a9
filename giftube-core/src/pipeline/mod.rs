mod error;
mod types;

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::delivery::{compose_caption, ChatDelivery};
use crate::duration::{
    normalize, validate_span, validate_start, ClipDuration, DurationError, NormalizedRange,
};
use crate::fingerprint::{ArtifactStage, ClipFingerprint};
use crate::media::{scale_filter, ClipEncoder};
use crate::resolver::{normalize_source_url, FormatChoice, VideoResolver};
use crate::store::{ClipLease, ClipStore};

pub use error::{PipelineError, PipelineResult, PipelineStage};
pub use types::{ClipReport, ClipRequest, PipelineSettings};

/// Walks one clip request through every stage in order, short-circuiting on
/// the first failure. Collaborators are trait objects so tests can substitute
/// scripted ones.
pub struct ClipPipeline {
    resolver: Arc<dyn VideoResolver>,
    encoder: Arc<dyn ClipEncoder>,
    delivery: Arc<dyn ChatDelivery>,
    store: Arc<ClipStore>,
    settings: PipelineSettings,
}

impl ClipPipeline {
    pub fn new(
        resolver: Arc<dyn VideoResolver>,
        encoder: Arc<dyn ClipEncoder>,
        delivery: Arc<dyn ChatDelivery>,
        store: Arc<ClipStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            resolver,
            encoder,
            delivery,
            store,
            settings,
        }
    }

    pub async fn run(&self, request: &ClipRequest) -> PipelineResult<ClipReport> {
        let started = Instant::now();

        // Canonicalize the start first ("8" becomes "00:00:08.000"), then
        // check the shape of the canonical form.
        let raw_start = request
            .raw_start
            .as_deref()
            .ok_or(DurationError::MissingParameter("start"))?;
        let start =
            ClipDuration::parse(raw_start).map_err(|_| DurationError::MalformedStart)?;
        validate_start(Some(&start.to_string()))?;
        validate_span(request.raw_span.as_deref())?;
        let span = ClipDuration::parse(request.raw_span.as_deref().unwrap_or_default())?;

        let source_url = normalize_source_url(&request.url);
        let metadata = self
            .resolver
            .metadata(&source_url)
            .await
            .map_err(PipelineError::Metadata)?;
        // Syntax was checked above; the window is only meaningful against the
        // real total duration.
        let range = normalize(metadata.total, start, span, self.settings.max_span)?;

        let format = self
            .resolver
            .suitable_format(&source_url, self.settings.resolution_limit)
            .await
            .map_err(PipelineError::Format)?;
        let stream_url = self
            .resolver
            .stream_url(&source_url, &format.format_id)
            .await
            .map_err(PipelineError::StreamUrl)?;

        let fingerprint = ClipFingerprint::new(range.start, range.span, &metadata.id);
        let lease = self
            .store
            .reserve(&fingerprint, metadata.extractor.as_deref())
            .await;
        info!(
            fingerprint = %fingerprint,
            video = %metadata.id,
            range = %range.start,
            span = %range.span,
            "producing clip"
        );

        if let Err(err) = self.produce(&lease, &stream_url, &range, &format).await {
            error!(stage = %err.stage(), error = %err, "clip production failed");
            lease.discard_all().await;
            return Err(err);
        }

        let caption = request
            .show_info
            .then(|| compose_caption(&metadata, &range, self.settings.caption_limit));
        let receipt = match self
            .delivery
            .send_video(request.chat, lease.final_path(), caption.as_deref())
            .await
        {
            Ok(receipt) => Some(receipt),
            Err(err) => {
                warn!(chat = %request.chat, error = %err, "clip delivery failed");
                None
            }
        };

        Ok(ClipReport {
            fingerprint,
            artifact: lease.final_path().to_path_buf(),
            range,
            metadata,
            receipt,
            completed_at: Utc::now(),
            elapsed: started.elapsed(),
        })
    }

    /// Crop, watermark, verify. The crop artifact is deleted once the
    /// watermark pass has consumed it, whether or not that pass succeeded.
    async fn produce(
        &self,
        lease: &ClipLease,
        stream_url: &str,
        range: &NormalizedRange,
        format: &FormatChoice,
    ) -> PipelineResult<()> {
        let scale = scale_filter(format.width, self.settings.scale_threshold);
        self.encoder
            .crop_from_url(stream_url, range.start, range.span, scale, lease.crop_path())
            .await
            .map_err(PipelineError::Transcode)?;

        let watermarked = self
            .encoder
            .embed_watermark(lease.crop_path(), &self.settings.watermark, lease.final_path())
            .await;
        lease.discard(ArtifactStage::Crop).await;
        watermarked.map_err(PipelineError::Watermark)?;

        // An unreadable final artifact counts as corrupt, same as a
        // zero-length one.
        let probed = match self.encoder.probe_duration(lease.final_path()).await {
            Ok(seconds) => seconds,
            Err(err) => {
                warn!(
                    path = %lease.final_path().display(),
                    error = %err,
                    "integrity probe failed"
                );
                0.0
            }
        };
        if probed <= 0.0 {
            lease.discard(ArtifactStage::Final).await;
            return Err(PipelineError::CorruptOutput(lease.final_path().to_path_buf()));
        }
        Ok(())
    }
}

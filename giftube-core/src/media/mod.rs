mod error;

use std::path::Path;
use std::process::Output;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::duration::ClipDuration;
use crate::exec::CommandExecutor;

pub use error::{MediaError, MediaResult};

/// Halves each axis while keeping even dimensions, which the encoder
/// requires for yuv420p output.
pub const SCALE_FILTER: &str = "scale=trunc(iw/4)*2:trunc(ih/4)*2";

/// Sources narrower than the threshold are kept at native size.
pub fn scale_filter(width: u32, threshold: u32) -> Option<&'static str> {
    if width >= threshold {
        Some(SCALE_FILTER)
    } else {
        None
    }
}

#[async_trait]
pub trait ClipEncoder: Send + Sync {
    /// Cuts `span` starting at `start` straight off the remote stream,
    /// dropping the audio track. `scale` applies the down-scale filter.
    async fn crop_from_url(
        &self,
        stream_url: &str,
        start: ClipDuration,
        span: ClipDuration,
        scale: Option<&str>,
        output: &Path,
    ) -> MediaResult<()>;

    async fn embed_watermark(
        &self,
        input: &Path,
        overlay: &Path,
        output: &Path,
    ) -> MediaResult<()>;

    /// Reported container duration in seconds. Returns 0.0 when the file
    /// cannot be probed, which callers treat as a corrupt artifact.
    async fn probe_duration(&self, path: &Path) -> MediaResult<f64>;
}

pub struct FfmpegEncoder {
    ffmpeg: String,
    ffprobe: String,
    executor: Arc<dyn CommandExecutor>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

impl FfmpegEncoder {
    pub fn new(
        ffmpeg: impl Into<String>,
        ffprobe: impl Into<String>,
        executor: Arc<dyn CommandExecutor>,
        timeout: Duration,
    ) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            executor,
            timeout,
        }
    }

    async fn invoke(&self, tool: &str, command: &mut Command) -> MediaResult<Output> {
        tokio::time::timeout(self.timeout, self.executor.run(command))
            .await
            .map_err(|_| MediaError::Timeout {
                tool: tool.to_string(),
                timeout: self.timeout,
            })?
            .map_err(|source| MediaError::Io {
                path: tool.into(),
                source,
            })
    }

    fn check(&self, tool: &str, output: Output) -> MediaResult<Output> {
        if output.status.success() {
            Ok(output)
        } else {
            Err(MediaError::CommandFailure {
                tool: tool.to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            })
        }
    }
}

#[async_trait]
impl ClipEncoder for FfmpegEncoder {
    async fn crop_from_url(
        &self,
        stream_url: &str,
        start: ClipDuration,
        span: ClipDuration,
        scale: Option<&str>,
        output: &Path,
    ) -> MediaResult<()> {
        let mut command = Command::new(&self.ffmpeg);
        command
            .arg("-hide_banner")
            .args(["-loglevel", "error"])
            .args(["-ss", &start.to_string()])
            .args(["-i", stream_url])
            .args(["-t", &span.to_string()]);
        if let Some(filter) = scale {
            command.args(["-vf", filter]);
        }
        command.arg("-an").arg("-y").arg(output);
        debug!(start = %start, span = %span, output = %output.display(), "cropping clip");
        let result = self.invoke(&self.ffmpeg, &mut command).await?;
        self.check(&self.ffmpeg, result)?;
        Ok(())
    }

    async fn embed_watermark(
        &self,
        input: &Path,
        overlay: &Path,
        output: &Path,
    ) -> MediaResult<()> {
        let mut command = Command::new(&self.ffmpeg);
        command
            .arg("-hide_banner")
            .args(["-loglevel", "error"])
            .arg("-i")
            .arg(input)
            .arg("-i")
            .arg(overlay)
            .args(["-filter_complex", "overlay=10:10"])
            .arg("-y")
            .arg(output);
        let result = self.invoke(&self.ffmpeg, &mut command).await?;
        self.check(&self.ffmpeg, result)?;
        Ok(())
    }

    async fn probe_duration(&self, path: &Path) -> MediaResult<f64> {
        let mut command = Command::new(&self.ffprobe);
        command
            .args(["-v", "quiet"])
            .args(["-print_format", "json"])
            .arg("-show_format")
            .arg(path);
        let output = self.invoke(&self.ffprobe, &mut command).await?;
        if !output.status.success() {
            return Ok(0.0);
        }
        let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;
        Ok(probe
            .format
            .duration
            .and_then(|raw| raw.parse::<f64>().ok())
            .unwrap_or(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_sources_skip_the_scale_filter() {
        assert_eq!(scale_filter(426, 640), None);
        assert_eq!(scale_filter(640, 640), Some(SCALE_FILTER));
        assert_eq!(scale_filter(1280, 640), Some(SCALE_FILTER));
    }
}

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::duration::ClipDuration;
use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GiftubeConfig {
    pub paths: PathsSection,
    pub clip: ClipSection,
    pub tools: ToolsSection,
    pub delivery: DeliverySection,
}

impl GiftubeConfig {
    pub fn watermark_path(&self) -> PathBuf {
        Path::new(&self.paths.assets_dir).join(&self.paths.watermark_image)
    }

    pub fn max_span(&self) -> ClipDuration {
        ClipDuration::from_millis(self.clip.max_span_seconds * 1000)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tools.timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    pub video_dir: String,
    pub assets_dir: String,
    pub watermark_image: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClipSection {
    /// Ceiling a requested span is clamped to, in seconds.
    pub max_span_seconds: u64,
    /// Widest acceptable source format, in pixels.
    pub resolution_limit: u32,
    /// Sources at or above this width get the fixed down-scale filter.
    pub scale_threshold: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    pub ytdl: String,
    pub ffmpeg: String,
    pub ffprobe: String,
    /// Per-invocation subprocess timeout; external tools can hang.
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliverySection {
    pub api_base: String,
    /// Transport caption ceiling the show-info caption must fit under.
    pub caption_limit: usize,
}

pub fn load_giftube_config<P: AsRef<Path>>(path: P) -> Result<GiftubeConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_fixture_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/giftube.toml");
        let config = load_giftube_config(path).expect("fixture config should parse");
        assert_eq!(config.clip.max_span_seconds, 30);
        assert_eq!(config.clip.resolution_limit, 640);
        assert_eq!(config.tools.ffmpeg, "ffmpeg");
        assert_eq!(config.delivery.caption_limit, 200);
        assert!(config
            .watermark_path()
            .to_string_lossy()
            .ends_with("logo_trans_35x31.png"));
        assert_eq!(config.max_span().as_millis(), 30_000);
    }
}

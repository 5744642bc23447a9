//! Core library for the giftube clip service: duration parsing, clip
//! fingerprinting, the artifact store, and the staged pipeline that drives
//! the external extractor and encoder tools.

pub mod config;
pub mod delivery;
pub mod duration;
pub mod error;
pub mod exec;
pub mod fingerprint;
pub mod media;
pub mod pipeline;
pub mod resolver;
pub mod store;

pub use config::{load_giftube_config, GiftubeConfig};
pub use duration::{ClipDuration, DurationError, NormalizedRange};
pub use fingerprint::{ArtifactStage, ClipFingerprint};
pub use pipeline::{ClipPipeline, ClipReport, ClipRequest, PipelineError, PipelineSettings};

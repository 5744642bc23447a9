use std::fmt;

use sha2::{Digest, Sha256};

use crate::duration::ClipDuration;

/// Pipeline stage a stored artifact belongs to. Each stage owns exactly one
/// path per fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactStage {
    Crop,
    Final,
}

impl ArtifactStage {
    pub fn suffix(&self) -> &'static str {
        match self {
            ArtifactStage::Crop => "crop",
            ArtifactStage::Final => "final",
        }
    }
}

/// Content-addressed identity of one clip request: identical
/// (start, span, video id) triples always map to the same token, so repeated
/// requests address the same artifact paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClipFingerprint {
    token: String,
}

impl ClipFingerprint {
    pub fn new(start: ClipDuration, span: ClipDuration, video_id: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(format!("{start}|{span}|{video_id}").as_bytes());
        let digest = hasher.finalize();
        // 128 bits of the digest are plenty for filename dedup.
        Self {
            token: hex::encode(&digest[..16]),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Artifact filename for one stage, optionally prefixed with the source
    /// site so extractors that reuse video ids cannot collide.
    pub fn file_name(&self, stage: ArtifactStage, site: Option<&str>) -> String {
        match site {
            Some(site) => format!("{site}_{}_{}.mp4", self.token, stage.suffix()),
            None => format!("{}_{}.mp4", self.token, stage.suffix()),
        }
    }
}

impl serde::Serialize for ClipFingerprint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.token)
    }
}

impl fmt::Display for ClipFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)
    }
}

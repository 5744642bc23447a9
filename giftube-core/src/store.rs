use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::warn;

use crate::fingerprint::{ArtifactStage, ClipFingerprint};

/// Owns the shared clip working directory. All artifact paths are derived
/// from a request's fingerprint, and a per-fingerprint lease serializes
/// concurrent identical requests; distinct fingerprints never contend.
pub struct ClipStore {
    root: PathBuf,
    leases: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ClipStore {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            leases: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Takes the per-fingerprint lease, waiting if an identical request is
    /// already building. The returned lease owns both stage paths until it
    /// is dropped.
    pub async fn reserve(&self, fingerprint: &ClipFingerprint, site: Option<&str>) -> ClipLease {
        let slot = {
            let mut leases = self.leases.lock().expect("lease map poisoned");
            leases
                .entry(fingerprint.token().to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let guard = slot.lock_owned().await;
        ClipLease {
            crop_path: self.root.join(fingerprint.file_name(ArtifactStage::Crop, site)),
            final_path: self.root.join(fingerprint.file_name(ArtifactStage::Final, site)),
            _guard: guard,
        }
    }
}

impl std::fmt::Debug for ClipStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipStore").field("root", &self.root).finish()
    }
}

/// Exclusive hold on one fingerprint's artifact paths for the duration of a
/// pipeline run.
pub struct ClipLease {
    crop_path: PathBuf,
    final_path: PathBuf,
    _guard: OwnedMutexGuard<()>,
}

impl ClipLease {
    pub fn path(&self, stage: ArtifactStage) -> &Path {
        match stage {
            ArtifactStage::Crop => &self.crop_path,
            ArtifactStage::Final => &self.final_path,
        }
    }

    pub fn crop_path(&self) -> &Path {
        &self.crop_path
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Best-effort removal of one stage's artifact. A failed delete is an
    /// operator concern, not a pipeline failure.
    pub async fn discard(&self, stage: ArtifactStage) {
        let path = self.path(stage);
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to remove clip artifact");
            }
        }
    }

    pub async fn discard_all(&self) {
        self.discard(ArtifactStage::Crop).await;
        self.discard(ArtifactStage::Final).await;
    }
}

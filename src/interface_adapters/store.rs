// Filesystem artifact store: one PNG per player slot, overwritten every round.

use crate::domain::ports::ArtifactStore;
use crate::domain::{RasterImage, Slot, StoreError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
}

impl FsArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, slot: Slot) -> PathBuf {
        self.dir
            .join(format!("player{}_drawing.png", slot.number()))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn save(&self, image: &RasterImage, slot: Slot) -> Result<PathBuf, StoreError> {
        let image = image.clone();
        let bytes = tokio::task::spawn_blocking(move || image.encode_png())
            .await
            .map_err(|e| StoreError::Encode(e.to_string()))?
            .map_err(|e| StoreError::Encode(e.to_string()))?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(slot);
        // Write then rename so readers never observe a half-written file.
        let staging = path.with_extension("png.partial");
        tokio::fs::write(&staging, &bytes).await?;
        tokio::fs::rename(&staging, &path).await?;

        debug!(path = %path.display(), bytes = bytes.len(), "sketch persisted");
        Ok(path)
    }

    async fn load(&self, path: &Path) -> Result<RasterImage, StoreError> {
        let bytes = tokio::fs::read(path).await?;
        tokio::task::spawn_blocking(move || RasterImage::decode_png(&bytes))
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

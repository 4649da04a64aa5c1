use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::domain::entities::{ResultsPayload, Slot};
use crate::domain::errors::{EngineError, StoreError};
use crate::domain::image::RasterImage;

// Port for the shared input surface both players draw on.
pub trait DrawingSurface: Send + Sync {
    fn current_raster_image(&self) -> RasterImage;
    fn clear(&self);
    fn set_input_enabled(&self, enabled: bool);
    // Disable then re-enable gesture input so in-flight strokes are dropped.
    fn pulse_input(&self);
}

// Port for durable sketch storage keyed by player slot.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn save(&self, image: &RasterImage, slot: Slot) -> Result<PathBuf, StoreError>;
    async fn load(&self, path: &Path) -> Result<RasterImage, StoreError>;
}

// Port for the top-level chrome and the results screen.
pub trait Navigator: Send + Sync {
    fn set_chrome_enabled(&self, enabled: bool);
    fn show_results(&self, payload: ResultsPayload);
}

/// Parameters for a single augmentation run.
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentConfig {
    pub prompt: String,
    pub step_count: u32,
    pub guidance_scale: f32,
    pub seed: u32,
    pub target_size: u32,
    /// How strongly the sketch constrains the output: 0 ignores it, 1 reproduces it.
    pub strength: f32,
    pub image_count: u32,
}

/// Progress callback invoked with `(step, total_steps)`.
pub type ProgressFn<'a> = &'a (dyn Fn(u32, u32) + Send + Sync);

// Port for the generative model that turns a sketch into a fuller image.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    async fn load(&self) -> Result<(), EngineError>;
    async fn augment(
        &self,
        input: &RasterImage,
        config: &AugmentConfig,
        progress: ProgressFn<'_>,
    ) -> Result<RasterImage, EngineError>;
}

// Port for perceptual distance between two images; `None` when features cannot be extracted.
pub trait SimilarityScorer: Send + Sync {
    fn distance(&self, a: &RasterImage, b: &RasterImage) -> Option<f32>;
}

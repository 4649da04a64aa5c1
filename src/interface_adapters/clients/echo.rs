use crate::domain::ports::{AugmentConfig, InferenceEngine, ProgressFn};
use crate::domain::{EngineError, RasterImage};
use async_trait::async_trait;
use std::time::Duration;

/// Offline engine that walks the step count and returns the sketch resized to the target.
///
/// Used for local play without a diffusion backend and in end-to-end tests.
#[derive(Debug, Clone, Default)]
pub struct EchoEngine {
    step_delay: Duration,
}

impl EchoEngine {
    pub fn new(step_delay: Duration) -> Self {
        Self { step_delay }
    }
}

#[async_trait]
impl InferenceEngine for EchoEngine {
    async fn load(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn augment(
        &self,
        input: &RasterImage,
        config: &AugmentConfig,
        progress: ProgressFn<'_>,
    ) -> Result<RasterImage, EngineError> {
        if input.is_empty() {
            return Err(EngineError::MissingPixels);
        }
        let total = config.step_count.max(1);
        for step in 1..=total {
            if !self.step_delay.is_zero() {
                tokio::time::sleep(self.step_delay).await;
            }
            progress(step, total);
        }
        Ok(input.resized(config.target_size, config.target_size))
    }
}

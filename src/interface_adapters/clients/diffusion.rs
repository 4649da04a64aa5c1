use crate::domain::ports::{AugmentConfig, InferenceEngine, ProgressFn};
use crate::domain::{EngineError, RasterImage};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct Img2ImgRequest<'a> {
    init_images: [String; 1],
    prompt: &'a str,
    steps: u32,
    cfg_scale: f32,
    seed: i64,
    width: u32,
    height: u32,
    denoising_strength: f32,
    batch_size: u32,
    n_iter: u32,
}

#[derive(Debug, Deserialize)]
struct Img2ImgResponse {
    #[serde(default)]
    images: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProgressResponse {
    #[serde(default)]
    state: ProgressState,
}

#[derive(Debug, Default, Deserialize)]
struct ProgressState {
    #[serde(default)]
    sampling_step: u32,
    #[serde(default)]
    sampling_steps: u32,
}

// reqwest client for a Stable Diffusion web API exposing img2img.
#[derive(Clone)]
pub struct HttpDiffusionEngine {
    http: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
}

impl HttpDiffusionEngine {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Option<Duration>,
        poll_interval: Duration,
    ) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            poll_interval: poll_interval.max(Duration::from_millis(10)),
        })
    }

    async fn poll_progress(&self) -> Option<(u32, u32)> {
        let url = format!("{}/sdapi/v1/progress?skip_current_image=true", self.base_url);
        let response = self.http.get(url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let progress = response.json::<ProgressResponse>().await.ok()?;
        let total = progress.state.sampling_steps;
        (total > 0).then(|| (progress.state.sampling_step.min(total), total))
    }
}

#[async_trait]
impl InferenceEngine for HttpDiffusionEngine {
    async fn load(&self) -> Result<(), EngineError> {
        let url = format!("{}/sdapi/v1/sd-models", self.base_url);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| EngineError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EngineError::Upstream(format!(
                "model listing returned {}",
                response.status()
            )));
        }
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
        let png = input
            .encode_png()
            .map_err(|e| EngineError::Encode(e.to_string()))?;

        let body = Img2ImgRequest {
            init_images: [STANDARD.encode(png)],
            prompt: &config.prompt,
            steps: config.step_count,
            cfg_scale: config.guidance_scale,
            seed: i64::from(config.seed),
            width: config.target_size,
            height: config.target_size,
            // The web API counts how much of the input to destroy, the inverse of strength.
            denoising_strength: (1.0 - config.strength).clamp(0.0, 1.0),
            batch_size: config.image_count.max(1),
            n_iter: 1,
        };
        let url = format!("{}/sdapi/v1/img2img", self.base_url);
        let request = self.http.post(url).json(&body).send();
        tokio::pin!(request);

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        let response = loop {
            tokio::select! {
                response = &mut request => {
                    break response.map_err(|e| EngineError::Upstream(e.to_string()))?;
                }
                _ = ticker.tick() => {
                    if let Some((step, total)) = self.poll_progress().await {
                        progress(step, total);
                    }
                }
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            warn!(%status, "img2img request rejected");
            return Err(EngineError::Upstream(format!("img2img returned {status}")));
        }

        let payload = response
            .json::<Img2ImgResponse>()
            .await
            .map_err(|e| EngineError::Decode(e.to_string()))?;
        let encoded = payload
            .images
            .into_iter()
            .next()
            .ok_or(EngineError::EmptyOutput)?;
        // Some deployments return data URLs.
        let encoded = encoded
            .split_once("base64,")
            .map_or(encoded.as_str(), |(_, data)| data);
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| EngineError::Decode(e.to_string()))?;
        let image = RasterImage::decode_png(&bytes).map_err(|e| EngineError::Decode(e.to_string()))?;

        debug!(
            width = image.width(),
            height = image.height(),
            "img2img output decoded"
        );
        progress(config.step_count, config.step_count);
        Ok(image)
    }
}

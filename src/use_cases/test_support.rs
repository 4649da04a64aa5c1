use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::ports::{
    ArtifactStore, AugmentConfig, DrawingSurface, InferenceEngine, Navigator, ProgressFn,
    SimilarityScorer,
};
use crate::domain::{
    EngineError, PlayerArtifact, RasterImage, ResultsPayload, Slot, StoreError,
};

// Shared ordered log so calls across fakes can be asserted as one sequence.
#[derive(Clone, Default)]
pub(crate) struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub(crate) fn push(&self, entry: impl Into<String>) {
        self.0.lock().expect("call log mutex poisoned").push(entry.into());
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().expect("call log mutex poisoned").clone()
    }
}

pub(crate) fn artifact(slot: Slot, size: u32) -> PlayerArtifact {
    PlayerArtifact {
        slot,
        sketch: RasterImage::blank(size, size),
        path: PathBuf::from(format!("player{}_drawing.png", slot.number())),
    }
}

pub(crate) struct RecordingSurface {
    log: CallLog,
    image: Mutex<RasterImage>,
}

impl RecordingSurface {
    pub(crate) fn new(log: CallLog) -> Self {
        Self {
            log,
            image: Mutex::new(RasterImage::blank(64, 48)),
        }
    }
}

impl DrawingSurface for RecordingSurface {
    fn current_raster_image(&self) -> RasterImage {
        self.log.push("snapshot");
        self.image.lock().expect("image mutex poisoned").clone()
    }

    fn clear(&self) {
        self.log.push("clear");
    }

    fn set_input_enabled(&self, enabled: bool) {
        self.log.push(format!("input:{enabled}"));
    }

    fn pulse_input(&self) {
        self.log.push("pulse");
    }
}

pub(crate) struct RecordingNavigator {
    log: CallLog,
    results: Mutex<Vec<ResultsPayload>>,
}

impl RecordingNavigator {
    pub(crate) fn new(log: CallLog) -> Self {
        Self {
            log,
            results: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn results(&self) -> Vec<ResultsPayload> {
        self.results.lock().expect("results mutex poisoned").clone()
    }
}

impl Navigator for RecordingNavigator {
    fn set_chrome_enabled(&self, enabled: bool) {
        self.log.push(format!("chrome:{enabled}"));
    }

    fn show_results(&self, payload: ResultsPayload) {
        self.log.push("results");
        self.results
            .lock()
            .expect("results mutex poisoned")
            .push(payload);
    }
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    files: Mutex<HashMap<PathBuf, RasterImage>>,
    saves: AtomicUsize,
    fail_saves: bool,
    log: Option<CallLog>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_saves(mut self) -> Self {
        self.fail_saves = true;
        self
    }

    pub(crate) fn with_log(mut self, log: CallLog) -> Self {
        self.log = Some(log);
        self
    }

    pub(crate) fn insert(&self, path: impl Into<PathBuf>, image: RasterImage) {
        self.files
            .lock()
            .expect("files mutex poisoned")
            .insert(path.into(), image);
    }

    pub(crate) fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn save(&self, image: &RasterImage, slot: Slot) -> Result<PathBuf, StoreError> {
        if let Some(log) = &self.log {
            log.push(format!("save:{}", slot.number()));
        }
        if self.fail_saves {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        let path = PathBuf::from(format!("player{}_drawing.png", slot.number()));
        self.insert(path.clone(), image.clone());
        Ok(path)
    }

    async fn load(&self, path: &Path) -> Result<RasterImage, StoreError> {
        self.files
            .lock()
            .expect("files mutex poisoned")
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::Io(std::io::Error::from(std::io::ErrorKind::NotFound)))
    }
}

// Engine fake that records concurrency and can script its results.
pub(crate) struct ScriptedEngine {
    delay: Duration,
    steps: u32,
    fail_load: bool,
    results: Mutex<VecDeque<Result<RasterImage, EngineError>>>,
    prompts: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedEngine {
    pub(crate) fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            steps: 2,
            fail_load: false,
            results: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn with_steps(mut self, steps: u32) -> Self {
        self.steps = steps.max(1);
        self
    }

    pub(crate) fn with_results(self, results: Vec<Result<RasterImage, EngineError>>) -> Self {
        *self.results.lock().expect("results mutex poisoned") = results.into();
        self
    }

    pub(crate) fn failing_load(mut self) -> Self {
        self.fail_load = true;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.prompts.lock().expect("prompts mutex poisoned").len()
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts mutex poisoned").clone()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceEngine for ScriptedEngine {
    async fn load(&self) -> Result<(), EngineError> {
        if self.fail_load {
            return Err(EngineError::Upstream("weights missing".to_string()));
        }
        Ok(())
    }

    async fn augment(
        &self,
        input: &RasterImage,
        config: &AugmentConfig,
        progress: ProgressFn<'_>,
    ) -> Result<RasterImage, EngineError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.prompts
            .lock()
            .expect("prompts mutex poisoned")
            .push(config.prompt.clone());

        for step in 1..=self.steps {
            progress(step, self.steps);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay / self.steps).await;
            }
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let scripted = self
            .results
            .lock()
            .expect("results mutex poisoned")
            .pop_front();
        // Default behaviour hands back a fresh copy so each result has its own buffer.
        scripted.unwrap_or_else(|| Ok(RasterImage::new(input.pixels().clone())))
    }
}

// Scorer fake returning a fixed value and counting invocations.
pub(crate) struct CountingScorer {
    value: Option<f32>,
    calls: AtomicUsize,
}

impl CountingScorer {
    pub(crate) fn returning(value: Option<f32>) -> Self {
        Self {
            value,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SimilarityScorer for CountingScorer {
    fn distance(&self, _a: &RasterImage, _b: &RasterImage) -> Option<f32> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.value
    }
}

// Augmentation job runner: one serialized worker lane shared by both player slots.

use crate::domain::ports::{AugmentConfig, InferenceEngine};
use crate::domain::{EngineState, PlayerArtifact, PromptTarget, Slot, SlotOutput, SlotOutputs};
use crate::use_cases::types::AugmentSettings;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Errors returned when a job cannot be queued.
#[derive(Debug)]
pub enum JobError {
    QueueFull,
    LaneClosed,
}

struct AugmentJob {
    job_id: u64,
    artifact: PlayerArtifact,
    config: AugmentConfig,
}

// Per-slot output map plus the id of the job allowed to write each slot.
struct OutputBoard {
    outputs_tx: watch::Sender<SlotOutputs>,
    // Latest job id per slot; 0 means no job owns the slot.
    latest: Mutex<[u64; 2]>,
}

impl OutputBoard {
    fn is_current(&self, slot: Slot, job_id: u64) -> bool {
        let latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        latest[slot.index()] == job_id
    }

    /// Publishes `output` only while `job_id` still owns `slot`.
    fn publish(&self, slot: Slot, job_id: u64, output: SlotOutput) -> bool {
        // Holding the lock across the swap keeps claim and publish ordered.
        let latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        if latest[slot.index()] != job_id {
            return false;
        }
        self.outputs_tx.send_modify(|outputs| outputs.set(slot, output));
        true
    }

    fn claim(&self, slot: Slot, job_id: u64, total: u32) {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        latest[slot.index()] = job_id;
        self.outputs_tx.send_modify(|outputs| {
            outputs.set(
                slot,
                SlotOutput::InProgress {
                    job_id,
                    step: 0,
                    total,
                },
            )
        });
    }

    fn clear(&self) {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        *latest = [0; 2];
        self.outputs_tx.send_replace(SlotOutputs::default());
    }
}

/// Runs augmentations for player slots, one at a time, and publishes per-slot status.
///
/// Resubmitting a slot while its previous job is queued or running makes the newest
/// submission the owner of the slot: the older job is not interrupted, but anything
/// it publishes afterwards is discarded. Queued jobs that were superseded before the
/// lane reached them are skipped.
pub struct AugmentationJobRunner {
    settings: AugmentSettings,
    jobs_tx: mpsc::Sender<AugmentJob>,
    board: Arc<OutputBoard>,
    engine_state_rx: watch::Receiver<EngineState>,
    next_job_id: AtomicU64,
}

impl AugmentationJobRunner {
    /// Spawns the worker lane. The engine loads on the lane before any job runs.
    pub fn spawn(engine: Arc<dyn InferenceEngine>, settings: AugmentSettings) -> Self {
        let (jobs_tx, jobs_rx) = mpsc::channel::<AugmentJob>(settings.queue_capacity.max(1));
        let (outputs_tx, _outputs_rx) = watch::channel(SlotOutputs::default());
        let (engine_state_tx, engine_state_rx) = watch::channel(EngineState::NotLoaded);
        let board = Arc::new(OutputBoard {
            outputs_tx,
            latest: Mutex::new([0; 2]),
        });

        tokio::spawn(worker_lane(engine, jobs_rx, board.clone(), engine_state_tx));

        Self {
            settings,
            jobs_tx,
            board,
            engine_state_rx,
            next_job_id: AtomicU64::new(1),
        }
    }

    /// Queues an augmentation of `artifact` and returns its job id.
    pub fn submit(&self, artifact: PlayerArtifact, prompt: PromptTarget) -> Result<u64, JobError> {
        let job_id = self.next_job_id.fetch_add(1, Ordering::Relaxed);
        let slot = artifact.slot;
        let config = self.settings.config_for(prompt);
        self.board.claim(slot, job_id, config.step_count);

        let queued = self.jobs_tx.try_send(AugmentJob {
            job_id,
            artifact,
            config,
        });
        match queued {
            Ok(()) => {
                debug!(slot = slot.number(), job_id, "augmentation queued");
                Ok(job_id)
            }
            Err(e) => {
                self.board.publish(slot, job_id, SlotOutput::Failed { job_id });
                match e {
                    mpsc::error::TrySendError::Full(_) => {
                        warn!(slot = slot.number(), job_id, "augmentation queue full");
                        Err(JobError::QueueFull)
                    }
                    mpsc::error::TrySendError::Closed(_) => {
                        error!(slot = slot.number(), job_id, "augmentation lane closed");
                        Err(JobError::LaneClosed)
                    }
                }
            }
        }
    }

    /// Resets both slots to `NotStarted`; in-flight jobs lose ownership of their slot.
    pub fn reset(&self) {
        self.board.clear();
    }

    pub fn subscribe(&self) -> watch::Receiver<SlotOutputs> {
        self.board.outputs_tx.subscribe()
    }

    pub fn outputs(&self) -> SlotOutputs {
        self.board.outputs_tx.borrow().clone()
    }

    pub fn engine_state(&self) -> watch::Receiver<EngineState> {
        self.engine_state_rx.clone()
    }
}

async fn worker_lane(
    engine: Arc<dyn InferenceEngine>,
    mut jobs_rx: mpsc::Receiver<AugmentJob>,
    board: Arc<OutputBoard>,
    engine_state_tx: watch::Sender<EngineState>,
) {
    engine_state_tx.send_replace(EngineState::Loading);
    info!("loading inference engine");
    let state = match engine.load().await {
        Ok(()) => {
            info!("inference engine loaded");
            EngineState::Loaded
        }
        Err(e) => {
            error!(error = ?e, "inference engine failed to load");
            EngineState::Failed
        }
    };
    engine_state_tx.send_replace(state);

    // Jobs run strictly one after another in submission order.
    while let Some(job) = jobs_rx.recv().await {
        run_job(engine.as_ref(), job, &board, state == EngineState::Loaded).await;
    }

    debug!("augmentation lane exiting");
}

async fn run_job(engine: &dyn InferenceEngine, job: AugmentJob, board: &OutputBoard, ready: bool) {
    let AugmentJob {
        job_id,
        artifact,
        config,
    } = job;
    let slot = artifact.slot;

    if !board.is_current(slot, job_id) {
        debug!(slot = slot.number(), job_id, "skipping superseded augmentation");
        return;
    }

    if !ready {
        warn!(slot = slot.number(), job_id, "inference engine unavailable");
        board.publish(slot, job_id, SlotOutput::Failed { job_id });
        return;
    }

    if artifact.sketch.is_empty() {
        warn!(slot = slot.number(), job_id, "sketch has no pixels");
        board.publish(slot, job_id, SlotOutput::Failed { job_id });
        return;
    }

    info!(slot = slot.number(), job_id, seed = config.seed, "augmentation started");
    let started = Instant::now();
    let report = |step: u32, total: u32| {
        board.publish(slot, job_id, SlotOutput::InProgress { job_id, step, total });
    };

    let output = match engine.augment(&artifact.sketch, &config, &report).await {
        Ok(image) if !image.is_empty() => {
            info!(
                slot = slot.number(),
                job_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "augmentation finished"
            );
            SlotOutput::Finished {
                job_id,
                image,
                sketch_path: artifact.path,
            }
        }
        Ok(_) => {
            warn!(slot = slot.number(), job_id, "augmentation returned an empty image");
            SlotOutput::Failed { job_id }
        }
        Err(e) => {
            warn!(slot = slot.number(), job_id, error = ?e, "augmentation failed");
            SlotOutput::Failed { job_id }
        }
    };

    if !board.publish(slot, job_id, output) {
        debug!(slot = slot.number(), job_id, "discarding superseded augmentation result");
    }
}

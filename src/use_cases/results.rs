// Results aggregator: scores a finished pair of slot outputs exactly once.

use crate::domain::ports::{ArtifactStore, SimilarityScorer};
use crate::domain::{FinishedSlot, RasterImage, ScoreDistances, ScoreResult, ScoringMode, SlotOutputs};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

struct Scoring {
    mode: ScoringMode,
    scorer: Arc<dyn SimilarityScorer>,
    store: Arc<dyn ArtifactStore>,
}

/// Observes slot outputs and publishes a score once both slots are finished.
///
/// A given `(job 1, job 2)` pair is scored on its first observation only; later
/// updates that leave the pair unchanged are ignored unless `recompute` is called.
/// A failed slot or a scorer that yields nothing leaves the result pending.
pub struct ResultsAggregator {
    score_rx: watch::Receiver<Option<ScoreResult>>,
    recompute_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl ResultsAggregator {
    pub fn spawn(
        outputs_rx: watch::Receiver<SlotOutputs>,
        scorer: Arc<dyn SimilarityScorer>,
        store: Arc<dyn ArtifactStore>,
        mode: ScoringMode,
    ) -> Self {
        let (score_tx, score_rx) = watch::channel(None);
        let (recompute_tx, recompute_rx) = mpsc::channel(1);
        let scoring = Scoring {
            mode,
            scorer,
            store,
        };
        let task = tokio::spawn(aggregate(outputs_rx, recompute_rx, scoring, score_tx));

        Self {
            score_rx,
            recompute_tx,
            task,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<ScoreResult>> {
        self.score_rx.clone()
    }

    pub fn latest(&self) -> Option<ScoreResult> {
        self.score_rx.borrow().clone()
    }

    /// Requests a fresh computation for the current finished pair, if any.
    pub fn recompute(&self) {
        // A full queue means a recompute is already pending.
        let _ = self.recompute_tx.try_send(());
    }
}

impl Drop for ResultsAggregator {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn aggregate(
    mut outputs_rx: watch::Receiver<SlotOutputs>,
    mut recompute_rx: mpsc::Receiver<()>,
    scoring: Scoring,
    score_tx: watch::Sender<Option<ScoreResult>>,
) {
    // Evaluate the value present at subscription time too.
    outputs_rx.mark_changed();
    let mut scored: Option<(u64, u64)> = None;

    loop {
        let forced = tokio::select! {
            changed = outputs_rx.changed() => {
                if changed.is_err() {
                    debug!("slot outputs closed; aggregator exiting");
                    break;
                }
                false
            }
            request = recompute_rx.recv() => match request {
                Some(()) => true,
                None => break,
            },
        };

        let outputs = outputs_rx.borrow_and_update().clone();
        let Some((one, two)) = outputs.finished_pair() else {
            if scored.take().is_some() {
                debug!("finished pair replaced; clearing score");
                score_tx.send_replace(None);
            }
            continue;
        };

        let pair = (one.job_id, two.job_id);
        if scored == Some(pair) && !forced {
            continue;
        }
        scored = Some(pair);

        match scoring.score(one, two).await {
            Some(_) if current_pair(&outputs_rx) != Some(pair) => {
                // A reset or resubmission landed while scoring; the next iteration handles it.
                debug!(jobs = ?pair, "finished pair replaced while scoring; dropping score");
            }
            Some(result) => {
                info!(jobs = ?pair, distances = ?result.distances, "score computed");
                score_tx.send_replace(Some(result));
            }
            None => warn!(jobs = ?pair, "score unavailable"),
        }
    }
}

fn current_pair(outputs_rx: &watch::Receiver<SlotOutputs>) -> Option<(u64, u64)> {
    outputs_rx
        .borrow()
        .finished_pair()
        .map(|(one, two)| (one.job_id, two.job_id))
}

impl Scoring {
    async fn score(&self, one: FinishedSlot<'_>, two: FinishedSlot<'_>) -> Option<ScoreResult> {
        let scorer = self.scorer.clone();
        let distances = match self.mode {
            ScoringMode::BetweenPlayers => {
                let (a, b) = (one.image.clone(), two.image.clone());
                let distance = off_lane(move || scorer.distance(&a, &b)).await?;
                ScoreDistances::Between(distance)
            }
            ScoringMode::SketchVsAugmented => {
                // Sketches come back through their persisted paths, not from memory.
                let sketch_one = self.load(one.sketch_path).await?;
                let sketch_two = self.load(two.sketch_path).await?;
                let (aug_one, aug_two) = (one.image.clone(), two.image.clone());
                let (d1, d2) = off_lane(move || {
                    let d1 = scorer.distance(&sketch_one, &aug_one)?;
                    let d2 = scorer.distance(&sketch_two, &aug_two)?;
                    Some((d1, d2))
                })
                .await?;
                ScoreDistances::PerPlayer { one: d1, two: d2 }
            }
        };

        let finite = match distances {
            ScoreDistances::Between(d) => d.is_finite(),
            ScoreDistances::PerPlayer { one, two } => one.is_finite() && two.is_finite(),
        };
        if !finite {
            warn!(?distances, "scorer returned a non-finite distance");
            return None;
        }

        Some(ScoreResult {
            mode: self.mode,
            distances,
            jobs: (one.job_id, two.job_id),
            sketches: (one.sketch_path.clone(), two.sketch_path.clone()),
        })
    }

    async fn load(&self, path: &Path) -> Option<RasterImage> {
        self.store
            .load(path)
            .await
            .inspect_err(|e| warn!(path = %path.display(), error = ?e, "failed to load sketch"))
            .ok()
    }
}

// Feature extraction is CPU-bound; keep it off the async workers.
async fn off_lane<T, F>(work: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> Option<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(value) => value,
        Err(e) => {
            error!(error = ?e, "scoring task failed");
            None
        }
    }
}

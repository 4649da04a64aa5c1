// Round sequencer: the timed two-player turn state machine.

use crate::domain::ports::{ArtifactStore, DrawingSurface, Navigator};
use crate::domain::{PlayerArtifact, PromptTarget, ResultsPayload, RoundPhase, RoundState, Slot};
use crate::use_cases::augmentation::AugmentationJobRunner;
use crate::use_cases::countdown;
use crate::use_cases::types::{RoundEvent, RoundSettings};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{Instrument, debug, info, info_span, warn};

/// Drives `Ready -> Countdown -> Interrupted` for each player, then `Complete`.
///
/// Each game runs on its own task. Starting a new game aborts the previous task,
/// and every state write is fenced by `game_id`, so a stale timer can never touch
/// the state of a newer game.
pub struct RoundSequencer<D, A, N> {
    inner: Arc<Sequencer<D, A, N>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct Sequencer<D, A, N> {
    settings: RoundSettings,
    surface: Arc<D>,
    store: Arc<A>,
    navigator: Arc<N>,
    runner: Arc<AugmentationJobRunner>,
    state_tx: watch::Sender<Option<RoundState>>,
    events_tx: broadcast::Sender<RoundEvent>,
    next_game_id: AtomicU64,
}

impl<D, A, N> RoundSequencer<D, A, N>
where
    D: DrawingSurface + 'static,
    A: ArtifactStore + 'static,
    N: Navigator + 'static,
{
    pub fn new(
        settings: RoundSettings,
        surface: Arc<D>,
        store: Arc<A>,
        navigator: Arc<N>,
        runner: Arc<AugmentationJobRunner>,
    ) -> Self {
        let (state_tx, _state_rx) = watch::channel(None);
        let (events_tx, _events_rx) = broadcast::channel(settings.event_capacity.max(1));
        Self {
            inner: Arc::new(Sequencer {
                settings,
                surface,
                store,
                navigator,
                runner,
                state_tx,
                events_tx,
                next_game_id: AtomicU64::new(1),
            }),
            task: Mutex::new(None),
        }
    }

    /// Starts a new game, replacing any game in progress. Returns the new game id.
    pub fn start(&self, prompt: PromptTarget) -> u64 {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = task.take() {
            previous.abort();
        }

        let game_id = self.inner.next_game_id.fetch_add(1, Ordering::Relaxed);
        self.inner.runner.reset();
        // Install the new generation before the task exists so stale writers are fenced.
        self.inner.state_tx.send_replace(Some(RoundState {
            game_id,
            current_player: Slot::One,
            seconds_remaining: self.inner.settings.round_duration,
            phase: RoundPhase::Ready,
            prompt,
        }));

        let inner = self.inner.clone();
        let span = info_span!("game", game_id);
        *task = Some(tokio::spawn(
            async move {
                if inner.play(game_id, prompt).await.is_none() {
                    debug!("game superseded");
                }
            }
            .instrument(span),
        ));
        game_id
    }

    pub fn state(&self) -> Option<RoundState> {
        self.inner.state_tx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<Option<RoundState>> {
        self.inner.state_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<RoundEvent> {
        self.inner.events_tx.subscribe()
    }

    pub fn settings(&self) -> &RoundSettings {
        &self.inner.settings
    }
}

impl<D, A, N> Drop for RoundSequencer<D, A, N> {
    fn drop(&mut self) {
        let task = self.task.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = task.take() {
            task.abort();
        }
    }
}

impl<D, A, N> Sequencer<D, A, N>
where
    D: DrawingSurface,
    A: ArtifactStore,
    N: Navigator,
{
    // Returns None as soon as the game stops owning the round state.
    async fn play(&self, game_id: u64, prompt: PromptTarget) -> Option<()> {
        info!(prompt = prompt.name(), players = self.settings.players, "game started");
        let last = self.settings.last_slot();
        let mut player = Slot::One;
        let mut artifacts = Vec::new();

        loop {
            self.ready(game_id, player).await?;
            self.countdown(game_id, player).await?;
            self.interrupt(game_id, player, prompt, &mut artifacts).await?;

            match player.next() {
                Some(next) if next <= last => player = next,
                _ => break,
            }
        }

        self.complete(game_id, player, prompt, artifacts)
    }

    async fn ready(&self, game_id: u64, player: Slot) -> Option<()> {
        self.enter(game_id, player, RoundPhase::Ready, self.settings.round_duration)?;
        self.emit(game_id, RoundEvent::GetReady { game_id, player });

        // Every round starts blank, including the first one of a restarted game.
        self.surface.clear();
        self.surface.set_input_enabled(true);
        self.navigator.set_chrome_enabled(true);

        tokio::time::sleep(self.time_unit() * self.settings.pre_round_delay).await;
        self.guard(game_id)
    }

    async fn countdown(&self, game_id: u64, player: Slot) -> Option<()> {
        let duration = self.settings.round_duration;
        self.enter(game_id, player, RoundPhase::Countdown, duration)?;
        self.emit(
            game_id,
            RoundEvent::CountdownStarted {
                game_id,
                player,
                seconds: duration,
            },
        );

        let unit = self.time_unit();
        let started = Instant::now();
        let mut ticker = tokio::time::interval_at(started + unit, unit);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut remaining = duration;
        while remaining > 0 {
            ticker.tick().await;
            let next = countdown::remaining_units(duration, started.elapsed(), unit);
            let step = countdown::advance(remaining, next, &self.settings.warning_thresholds);
            self.update(game_id, |state| state.seconds_remaining = step.seconds_left)?;

            for seconds_left in step.warnings {
                debug!(player = player.number(), seconds_left, "countdown warning");
                self.emit(
                    game_id,
                    RoundEvent::Warning {
                        game_id,
                        player,
                        seconds_left,
                    },
                );
            }
            remaining = step.seconds_left;
        }

        Some(())
    }

    async fn interrupt(
        &self,
        game_id: u64,
        player: Slot,
        prompt: PromptTarget,
        artifacts: &mut Vec<PlayerArtifact>,
    ) -> Option<()> {
        self.enter(game_id, player, RoundPhase::Interrupted, 0)?;
        info!(player = player.number(), "time up");

        self.surface.pulse_input();
        self.surface.set_input_enabled(false);
        self.navigator.set_chrome_enabled(false);

        let size = self.settings.snapshot_size;
        let sketch = self.surface.current_raster_image().resized(size, size);
        let saved = self.store.save(&sketch, player).await;
        self.guard(game_id)?;

        match saved {
            Ok(path) => {
                self.emit(
                    game_id,
                    RoundEvent::ArtifactSaved {
                        game_id,
                        player,
                        path: path.clone(),
                    },
                );
                let artifact = PlayerArtifact {
                    slot: player,
                    sketch,
                    path,
                };
                if let Err(e) = self.runner.submit(artifact.clone(), prompt) {
                    warn!(player = player.number(), error = ?e, "failed to queue augmentation");
                }
                artifacts.push(artifact);
            }
            Err(e) => {
                // Without a durable sketch the slot is never submitted.
                warn!(player = player.number(), error = ?e, "failed to persist sketch");
                self.emit(game_id, RoundEvent::ArtifactFailed { game_id, player });
            }
        }

        Some(())
    }

    fn complete(
        &self,
        game_id: u64,
        player: Slot,
        prompt: PromptTarget,
        artifacts: Vec<PlayerArtifact>,
    ) -> Option<()> {
        self.enter(game_id, player, RoundPhase::Complete, 0)?;
        self.navigator.set_chrome_enabled(true);
        self.emit(game_id, RoundEvent::GameOver { game_id });
        info!(artifacts = artifacts.len(), "game over");
        self.navigator.show_results(ResultsPayload {
            game_id,
            prompt,
            artifacts,
        });
        Some(())
    }

    fn enter(&self, game_id: u64, player: Slot, phase: RoundPhase, seconds: u32) -> Option<()> {
        self.update(game_id, |state| {
            state.current_player = player;
            state.phase = phase;
            state.seconds_remaining = seconds;
        })?;
        debug!(player = player.number(), ?phase, "phase changed");
        self.emit(
            game_id,
            RoundEvent::Phase {
                game_id,
                player,
                phase,
            },
        );
        Some(())
    }

    fn update(&self, game_id: u64, apply: impl FnOnce(&mut RoundState)) -> Option<()> {
        self.state_tx
            .send_if_modified(|state| match state {
                Some(state) if state.game_id == game_id => {
                    apply(state);
                    true
                }
                _ => false,
            })
            .then_some(())
    }

    fn guard(&self, game_id: u64) -> Option<()> {
        let current = self.state_tx.borrow().as_ref().map(|state| state.game_id);
        (current == Some(game_id)).then_some(())
    }

    fn emit(&self, game_id: u64, event: RoundEvent) {
        if self.guard(game_id).is_some() {
            // No subscribers is not an error.
            let _ = self.events_tx.send(event);
        }
    }

    fn time_unit(&self) -> Duration {
        self.settings.time_unit().max(Duration::from_millis(1))
    }
}

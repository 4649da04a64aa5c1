use crate::domain::{Player, Slot};
use crate::interface_adapters::canvas::RemoteCanvas;
use crate::interface_adapters::navigator::ResultsBoard;
use crate::interface_adapters::store::FsArtifactStore;
use crate::use_cases::{AugmentationJobRunner, ResultsAggregator, RoundSequencer};
use std::sync::Arc;
use tokio::sync::RwLock;

pub type GameSequencer = RoundSequencer<RemoteCanvas, FsArtifactStore, ResultsBoard>;

pub struct AppState {
    // Owns round timing and the shared canvas during a game.
    pub sequencer: Arc<GameSequencer>,
    // Serial augmentation lane and the per-slot outputs it publishes.
    pub runner: Arc<AugmentationJobRunner>,
    pub aggregator: Arc<ResultsAggregator>,
    pub canvas: Arc<RemoteCanvas>,
    pub board: Arc<ResultsBoard>,
    // Identities captured at login, indexed by slot.
    pub players: RwLock<[Player; 2]>,
}

impl AppState {
    pub fn new(
        sequencer: Arc<GameSequencer>,
        runner: Arc<AugmentationJobRunner>,
        aggregator: Arc<ResultsAggregator>,
        canvas: Arc<RemoteCanvas>,
        board: Arc<ResultsBoard>,
    ) -> Self {
        Self {
            sequencer,
            runner,
            aggregator,
            canvas,
            board,
            players: RwLock::new(Slot::ALL.map(Player::unnamed)),
        }
    }
}

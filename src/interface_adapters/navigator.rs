// Results board: chrome visibility and the results handoff, observable by clients.

use crate::domain::ResultsPayload;
use crate::domain::ports::Navigator;
use tokio::sync::watch;
use tracing::info;

pub struct ResultsBoard {
    chrome_tx: watch::Sender<bool>,
    results_tx: watch::Sender<Option<ResultsPayload>>,
}

impl ResultsBoard {
    pub fn new() -> Self {
        let (chrome_tx, _chrome_rx) = watch::channel(true);
        let (results_tx, _results_rx) = watch::channel(None);
        Self {
            chrome_tx,
            results_tx,
        }
    }

    pub fn subscribe_chrome(&self) -> watch::Receiver<bool> {
        self.chrome_tx.subscribe()
    }

    pub fn subscribe_results(&self) -> watch::Receiver<Option<ResultsPayload>> {
        self.results_tx.subscribe()
    }

    pub fn chrome_enabled(&self) -> bool {
        *self.chrome_tx.borrow()
    }

    pub fn results(&self) -> Option<ResultsPayload> {
        self.results_tx.borrow().clone()
    }

    /// Withdraws the results action ahead of a new game.
    pub fn reset(&self) {
        self.results_tx.send_replace(None);
    }
}

impl Default for ResultsBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator for ResultsBoard {
    fn set_chrome_enabled(&self, enabled: bool) {
        self.chrome_tx.send_if_modified(|current| {
            let changed = *current != enabled;
            *current = enabled;
            changed
        });
    }

    fn show_results(&self, payload: ResultsPayload) {
        info!(
            game_id = payload.game_id,
            artifacts = payload.artifacts.len(),
            "results available"
        );
        self.results_tx.send_replace(Some(payload));
    }
}

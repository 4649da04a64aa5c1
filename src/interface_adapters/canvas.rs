// Drawing surface backed by a remote touchscreen client.

use crate::domain::RasterImage;
use crate::domain::ports::DrawingSurface;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::debug;

/// Commands the client canvas must apply locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanvasCommand {
    Clear,
    SetInputEnabled(bool),
    // Toggle the gesture recognizer off and on so a stroke in progress is dropped.
    FlushGestures,
}

/// Holds the latest raster uploaded by the client and relays canvas commands to it.
pub struct RemoteCanvas {
    size: u32,
    latest: Mutex<RasterImage>,
    input_enabled: AtomicBool,
    commands_tx: broadcast::Sender<CanvasCommand>,
}

impl RemoteCanvas {
    pub fn new(size: u32, command_capacity: usize) -> Self {
        let (commands_tx, _commands_rx) = broadcast::channel(command_capacity.max(1));
        Self {
            size,
            latest: Mutex::new(RasterImage::blank(size, size)),
            input_enabled: AtomicBool::new(false),
            commands_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CanvasCommand> {
        self.commands_tx.subscribe()
    }

    pub fn input_enabled(&self) -> bool {
        self.input_enabled.load(Ordering::Acquire)
    }

    /// Stores a client snapshot. Uploads that arrive while input is disabled are dropped.
    pub fn accept_upload(&self, image: RasterImage) -> bool {
        if !self.input_enabled() {
            debug!("canvas upload ignored while input is disabled");
            return false;
        }
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = image;
        true
    }

    fn send(&self, command: CanvasCommand) {
        // Nobody connected is fine; the next client gets state on connect.
        let _ = self.commands_tx.send(command);
    }
}

impl DrawingSurface for RemoteCanvas {
    fn current_raster_image(&self) -> RasterImage {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn clear(&self) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) =
            RasterImage::blank(self.size, self.size);
        self.send(CanvasCommand::Clear);
    }

    fn set_input_enabled(&self, enabled: bool) {
        self.input_enabled.store(enabled, Ordering::Release);
        self.send(CanvasCommand::SetInputEnabled(enabled));
    }

    fn pulse_input(&self) {
        self.send(CanvasCommand::FlushGestures);
    }
}

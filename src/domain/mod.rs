// Domain layer: game entities, raster images and the ports the pipeline depends on.

pub mod entities;
pub mod errors;
pub mod image;
pub mod ports;

pub use entities::{
    EngineState, FinishedSlot, Player, PlayerArtifact, PromptTarget, ResultsPayload, RoundPhase,
    RoundState, ScoreDistances, ScoreResult, ScoringMode, Slot, SlotOutput, SlotOutputs,
};
pub use errors::{EngineError, StoreError};
pub use image::RasterImage;

// Domain-level game entities: player slots, round state and pipeline outputs.

use super::image::RasterImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A player's position in the game; the key for all per-player state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Slot {
    One,
    Two,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::One, Slot::Two];

    /// One-based player number as shown to players and used in file names.
    pub fn number(self) -> u8 {
        match self {
            Slot::One => 1,
            Slot::Two => 2,
        }
    }

    pub fn from_number(number: u8) -> Option<Slot> {
        match number {
            1 => Some(Slot::One),
            2 => Some(Slot::Two),
            _ => None,
        }
    }

    pub(crate) fn index(self) -> usize {
        usize::from(self.number() - 1)
    }

    pub fn next(self) -> Option<Slot> {
        Slot::from_number(self.number() + 1)
    }
}

impl From<Slot> for u8 {
    fn from(slot: Slot) -> Self {
        slot.number()
    }
}

impl TryFrom<u8> for Slot {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Slot::from_number(value).ok_or_else(|| format!("invalid player slot {value}"))
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

// Player identity captured at login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub slot: Slot,
    pub display_name: String,
    pub avatar: Option<String>,
}

impl Player {
    pub fn unnamed(slot: Slot) -> Self {
        Self {
            slot,
            display_name: format!("Player {slot}"),
            avatar: None,
        }
    }
}

/// The secret object both players have to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptTarget {
    Shark,
    Bird,
    Turtle,
}

impl PromptTarget {
    pub const ALL: [PromptTarget; 3] = [PromptTarget::Shark, PromptTarget::Bird, PromptTarget::Turtle];

    pub fn random() -> Self {
        Self::ALL[fastrand::usize(..Self::ALL.len())]
    }

    pub fn name(self) -> &'static str {
        match self {
            PromptTarget::Shark => "shark",
            PromptTarget::Bird => "bird",
            PromptTarget::Turtle => "turtle",
        }
    }

    /// Fills `{target}` in the template with the object name.
    pub fn render(self, template: &str) -> String {
        template.replace("{target}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    Ready,
    Countdown,
    Interrupted,
    Complete,
}

/// Authoritative round state; written only by the round sequencer.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundState {
    // Generation of the game that owns this state.
    pub game_id: u64,
    pub current_player: Slot,
    pub seconds_remaining: u32,
    pub phase: RoundPhase,
    pub prompt: PromptTarget,
}

/// Durable record of a finished sketch.
#[derive(Debug, Clone)]
pub struct PlayerArtifact {
    pub slot: Slot,
    pub sketch: RasterImage,
    pub path: PathBuf,
}

/// Per-slot augmentation status. Overwritten on every update.
#[derive(Debug, Clone, Default)]
pub enum SlotOutput {
    #[default]
    NotStarted,
    InProgress {
        job_id: u64,
        step: u32,
        total: u32,
    },
    Finished {
        job_id: u64,
        image: RasterImage,
        sketch_path: PathBuf,
    },
    Failed {
        job_id: u64,
    },
}

impl SlotOutput {
    pub fn job_id(&self) -> Option<u64> {
        match self {
            SlotOutput::NotStarted => None,
            SlotOutput::InProgress { job_id, .. }
            | SlotOutput::Finished { job_id, .. }
            | SlotOutput::Failed { job_id } => Some(*job_id),
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, SlotOutput::Finished { .. })
    }
}

/// Both slot outputs, swapped as one value on every publish.
#[derive(Debug, Clone, Default)]
pub struct SlotOutputs {
    slots: [SlotOutput; 2],
}

/// Borrowed view of a slot whose augmentation finished.
#[derive(Debug, Clone, Copy)]
pub struct FinishedSlot<'a> {
    pub job_id: u64,
    pub image: &'a RasterImage,
    pub sketch_path: &'a PathBuf,
}

impl SlotOutputs {
    pub fn get(&self, slot: Slot) -> &SlotOutput {
        &self.slots[slot.index()]
    }

    pub fn set(&mut self, slot: Slot, output: SlotOutput) {
        self.slots[slot.index()] = output;
    }

    pub fn finished(&self, slot: Slot) -> Option<FinishedSlot<'_>> {
        match self.get(slot) {
            SlotOutput::Finished {
                job_id,
                image,
                sketch_path,
            } => Some(FinishedSlot {
                job_id: *job_id,
                image,
                sketch_path,
            }),
            _ => None,
        }
    }

    /// Both slots when both are finished.
    pub fn finished_pair(&self) -> Option<(FinishedSlot<'_>, FinishedSlot<'_>)> {
        Some((self.finished(Slot::One)?, self.finished(Slot::Two)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    /// One distance between the two players' augmented images.
    #[default]
    BetweenPlayers,
    /// One distance per player: original sketch against its own augmentation.
    SketchVsAugmented,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreDistances {
    Between(f32),
    PerPlayer { one: f32, two: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResult {
    pub mode: ScoringMode,
    pub distances: ScoreDistances,
    // Job ids of the (slot 1, slot 2) outputs that were scored.
    pub jobs: (u64, u64),
    pub sketches: (PathBuf, PathBuf),
}

impl ScoreResult {
    pub fn distance_for(&self, slot: Slot) -> f32 {
        match (self.distances, slot) {
            (ScoreDistances::Between(distance), _) => distance,
            (ScoreDistances::PerPlayer { one, .. }, Slot::One) => one,
            (ScoreDistances::PerPlayer { two, .. }, Slot::Two) => two,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    #[default]
    NotLoaded,
    Loading,
    Loaded,
    Failed,
}

/// Handed to the navigator once the last round completes.
#[derive(Debug, Clone)]
pub struct ResultsPayload {
    pub game_id: u64,
    pub prompt: PromptTarget,
    pub artifacts: Vec<PlayerArtifact>,
}

// Use-case level settings and events for the round driver and the augmentation lane.

use crate::domain::ports::AugmentConfig;
use crate::domain::{PromptTarget, RoundPhase, Slot};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Timing for the two-player round sequence, in abstract time units.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoundSettings {
    pub players: u8,
    pub round_duration: u32,
    pub pre_round_delay: u32,
    pub warning_thresholds: Vec<u32>,
    /// Length of one time unit.
    pub time_unit_ms: u64,
    /// Sketches are resampled to this square size before persisting.
    pub snapshot_size: u32,
    pub event_capacity: usize,
}

impl Default for RoundSettings {
    fn default() -> Self {
        Self {
            players: 2,
            round_duration: 30,
            pre_round_delay: 3,
            warning_thresholds: vec![10, 3, 2, 1],
            time_unit_ms: 1000,
            snapshot_size: 512,
            event_capacity: 64,
        }
    }
}

impl RoundSettings {
    pub fn time_unit(&self) -> Duration {
        Duration::from_millis(self.time_unit_ms)
    }

    pub fn last_slot(&self) -> Slot {
        Slot::from_number(self.players).unwrap_or(Slot::Two)
    }
}

/// Fixed inference parameters applied to every submission.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AugmentSettings {
    pub prompt_template: String,
    pub step_count: u32,
    pub guidance_scale: f32,
    pub target_size: u32,
    /// How closely the output follows the sketch, in `[0, 1]`; 1 reproduces the input.
    /// The HTTP engine sends `1 - strength` as the web API's `denoising_strength`, so the
    /// default of 0.67 goes over the wire as 0.33.
    pub strength: f32,
    pub image_count: u32,
    /// Fixed seed; a random one is drawn per submission when absent.
    pub seed: Option<u32>,
    pub queue_capacity: usize,
}

impl Default for AugmentSettings {
    fn default() -> Self {
        Self {
            prompt_template: "sketch drawing of a {target}".to_string(),
            step_count: 20,
            guidance_scale: 30.0,
            target_size: 512,
            strength: 0.67,
            image_count: 1,
            seed: None,
            queue_capacity: 16,
        }
    }
}

impl AugmentSettings {
    pub fn config_for(&self, prompt: PromptTarget) -> AugmentConfig {
        AugmentConfig {
            prompt: prompt.render(&self.prompt_template),
            step_count: self.step_count,
            guidance_scale: self.guidance_scale,
            seed: self.seed.unwrap_or_else(|| fastrand::u32(..)),
            target_size: self.target_size,
            strength: self.strength,
            image_count: self.image_count,
        }
    }
}

/// Notifications emitted by the round sequencer for presentation observers.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundEvent {
    Phase {
        game_id: u64,
        player: Slot,
        phase: RoundPhase,
    },
    GetReady {
        game_id: u64,
        player: Slot,
    },
    CountdownStarted {
        game_id: u64,
        player: Slot,
        seconds: u32,
    },
    Warning {
        game_id: u64,
        player: Slot,
        seconds_left: u32,
    },
    ArtifactSaved {
        game_id: u64,
        player: Slot,
        path: PathBuf,
    },
    ArtifactFailed {
        game_id: u64,
        player: Slot,
    },
    GameOver {
        game_id: u64,
    },
}

impl RoundEvent {
    pub fn game_id(&self) -> u64 {
        match self {
            RoundEvent::Phase { game_id, .. }
            | RoundEvent::GetReady { game_id, .. }
            | RoundEvent::CountdownStarted { game_id, .. }
            | RoundEvent::Warning { game_id, .. }
            | RoundEvent::ArtifactSaved { game_id, .. }
            | RoundEvent::ArtifactFailed { game_id, .. }
            | RoundEvent::GameOver { game_id } => *game_id,
        }
    }
}

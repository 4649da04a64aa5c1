// Wire protocol DTOs and conversions for the drawing client and HTTP API.

use crate::domain::{
    EngineState, Player, PlayerArtifact, PromptTarget, ResultsPayload, RoundPhase, RoundState,
    ScoreResult, ScoringMode, Slot, SlotOutput, SlotOutputs,
};
use crate::interface_adapters::canvas::CanvasCommand;
use crate::use_cases::RoundEvent;
use serde::{Deserialize, Serialize};

/// Messages the server pushes to connected clients over the WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    // Authoritative round state after every transition and countdown tick.
    Round(RoundStateDto),
    // One-shot notifications: phases, warnings, persistence outcomes.
    Event(RoundEventDto),
    // Instructions for the local canvas.
    Canvas(CanvasCommandDto),
    Chrome { enabled: bool },
    Outputs(Vec<SlotStatusDto>),
    Score(Option<ScoreDto>),
    Engine { state: EngineState },
    // Sent once the last round completes; the client may open the results screen.
    ResultsReady(ResultsDto),
}

/// Messages the client sends to the server over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    // Latest canvas raster, PNG encoded.
    Canvas(CanvasUploadDto),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CanvasUploadDto {
    pub png_base64: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoundStateDto {
    pub game_id: u64,
    pub current_player: Slot,
    pub seconds_remaining: u32,
    pub phase: RoundPhase,
    pub prompt: PromptTarget,
}

impl From<&RoundState> for RoundStateDto {
    fn from(state: &RoundState) -> Self {
        Self {
            game_id: state.game_id,
            current_player: state.current_player,
            seconds_remaining: state.seconds_remaining,
            phase: state.phase,
            prompt: state.prompt,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoundEventKindDto {
    Phase { player: Slot, phase: RoundPhase },
    GetReady { player: Slot },
    CountdownStarted { player: Slot, seconds: u32 },
    Warning { player: Slot, seconds_left: u32 },
    ArtifactSaved { player: Slot, path: String },
    ArtifactFailed { player: Slot },
    GameOver,
}

/// Round event with the banner text a client shows for it, if any.
#[derive(Debug, Clone, Serialize)]
pub struct RoundEventDto {
    pub game_id: u64,
    #[serde(flatten)]
    pub kind: RoundEventKindDto,
    pub toast: Option<String>,
}

impl From<&RoundEvent> for RoundEventDto {
    fn from(event: &RoundEvent) -> Self {
        let kind = match event {
            RoundEvent::Phase { player, phase, .. } => RoundEventKindDto::Phase {
                player: *player,
                phase: *phase,
            },
            RoundEvent::GetReady { player, .. } => RoundEventKindDto::GetReady { player: *player },
            RoundEvent::CountdownStarted {
                player, seconds, ..
            } => RoundEventKindDto::CountdownStarted {
                player: *player,
                seconds: *seconds,
            },
            RoundEvent::Warning {
                player,
                seconds_left,
                ..
            } => RoundEventKindDto::Warning {
                player: *player,
                seconds_left: *seconds_left,
            },
            RoundEvent::ArtifactSaved { player, path, .. } => RoundEventKindDto::ArtifactSaved {
                player: *player,
                path: path.display().to_string(),
            },
            RoundEvent::ArtifactFailed { player, .. } => {
                RoundEventKindDto::ArtifactFailed { player: *player }
            }
            RoundEvent::GameOver { .. } => RoundEventKindDto::GameOver,
        };
        Self {
            game_id: event.game_id(),
            kind,
            toast: toast_text(event),
        }
    }
}

fn toast_text(event: &RoundEvent) -> Option<String> {
    match event {
        RoundEvent::GetReady { player, .. } => Some(format!("Player {player}, get ready!")),
        RoundEvent::CountdownStarted { seconds, .. } => {
            Some(format!("{seconds} seconds remaining"))
        }
        RoundEvent::Warning { seconds_left, .. } if *seconds_left > 3 => {
            Some(format!("{seconds_left} seconds remaining"))
        }
        RoundEvent::Warning { seconds_left, .. } => Some(seconds_left.to_string()),
        RoundEvent::ArtifactFailed { player, .. } => {
            Some(format!("Could not save player {player}'s drawing"))
        }
        RoundEvent::GameOver { .. } => Some("Time's up!".to_string()),
        RoundEvent::Phase { .. } | RoundEvent::ArtifactSaved { .. } => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum CanvasCommandDto {
    Clear,
    SetInputEnabled { enabled: bool },
    FlushGestures,
}

impl From<CanvasCommand> for CanvasCommandDto {
    fn from(command: CanvasCommand) -> Self {
        match command {
            CanvasCommand::Clear => CanvasCommandDto::Clear,
            CanvasCommand::SetInputEnabled(enabled) => {
                CanvasCommandDto::SetInputEnabled { enabled }
            }
            CanvasCommand::FlushGestures => CanvasCommandDto::FlushGestures,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SlotOutputDto {
    NotStarted,
    InProgress { job_id: u64, step: u32, total: u32 },
    // Image bytes are served separately from `/outputs/{slot}`.
    Finished { job_id: u64, sketch_path: String },
    Failed { job_id: u64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotStatusDto {
    pub slot: Slot,
    #[serde(flatten)]
    pub output: SlotOutputDto,
}

impl From<&SlotOutput> for SlotOutputDto {
    fn from(output: &SlotOutput) -> Self {
        match output {
            SlotOutput::NotStarted => SlotOutputDto::NotStarted,
            SlotOutput::InProgress {
                job_id,
                step,
                total,
            } => SlotOutputDto::InProgress {
                job_id: *job_id,
                step: *step,
                total: *total,
            },
            SlotOutput::Finished {
                job_id,
                sketch_path,
                ..
            } => SlotOutputDto::Finished {
                job_id: *job_id,
                sketch_path: sketch_path.display().to_string(),
            },
            SlotOutput::Failed { job_id } => SlotOutputDto::Failed { job_id: *job_id },
        }
    }
}

pub fn slot_statuses(outputs: &SlotOutputs) -> Vec<SlotStatusDto> {
    Slot::ALL
        .into_iter()
        .map(|slot| SlotStatusDto {
            slot,
            output: outputs.get(slot).into(),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotScoreDto {
    pub slot: Slot,
    pub distance: f32,
    pub sketch_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreDto {
    pub mode: ScoringMode,
    pub scores: Vec<SlotScoreDto>,
}

impl From<&ScoreResult> for ScoreDto {
    fn from(score: &ScoreResult) -> Self {
        let sketch = |slot: Slot| match slot {
            Slot::One => score.sketches.0.display().to_string(),
            Slot::Two => score.sketches.1.display().to_string(),
        };
        Self {
            mode: score.mode,
            scores: Slot::ALL
                .into_iter()
                .map(|slot| SlotScoreDto {
                    slot,
                    distance: score.distance_for(slot),
                    sketch_path: sketch(slot),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactDto {
    pub slot: Slot,
    pub path: String,
}

impl From<&PlayerArtifact> for ArtifactDto {
    fn from(artifact: &PlayerArtifact) -> Self {
        Self {
            slot: artifact.slot,
            path: artifact.path.display().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultsDto {
    pub game_id: u64,
    pub prompt: PromptTarget,
    pub artifacts: Vec<ArtifactDto>,
}

impl From<&ResultsPayload> for ResultsDto {
    fn from(payload: &ResultsPayload) -> Self {
        Self {
            game_id: payload.game_id,
            prompt: payload.prompt,
            artifacts: payload.artifacts.iter().map(ArtifactDto::from).collect(),
        }
    }
}

/// Response body for `GET /results`.
#[derive(Debug, Clone, Serialize)]
pub struct ResultsResponse {
    // Set once the last round of the current game completed.
    pub results: Option<ResultsDto>,
    pub outputs: Vec<SlotStatusDto>,
    pub score: Option<ScoreDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerUpdateRequest {
    pub display_name: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerDto {
    pub slot: Slot,
    pub display_name: String,
    pub avatar: Option<String>,
}

impl From<&Player> for PlayerDto {
    fn from(player: &Player) -> Self {
        Self {
            slot: player.slot,
            display_name: player.display_name.clone(),
            avatar: player.avatar.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartGameRequest {
    // Random when omitted.
    #[serde(default)]
    pub prompt: Option<PromptTarget>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartGameResponse {
    pub game_id: u64,
    pub prompt: PromptTarget,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineResponse {
    pub state: EngineState,
}

use crate::domain::{Player, PromptTarget, Slot};
use crate::interface_adapters::http::error_response;
use crate::interface_adapters::protocol::{
    EngineResponse, PlayerDto, PlayerUpdateRequest, ResultsDto, ResultsResponse, RoundStateDto,
    ScoreDto, StartGameRequest, StartGameResponse, slot_statuses,
};
use crate::interface_adapters::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{info, warn};

const MAX_DISPLAY_NAME_LEN: usize = 32;

fn parse_slot(slot: u8) -> Result<Slot, Response> {
    Slot::from_number(slot)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "unknown player slot"))
}

pub async fn put_player(
    State(state): State<Arc<AppState>>,
    Path(slot): Path<u8>,
    Json(payload): Json<PlayerUpdateRequest>,
) -> Response {
    let slot = match parse_slot(slot) {
        Ok(slot) => slot,
        Err(response) => return response,
    };
    let display_name = payload.display_name.trim();
    if display_name.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "display_name is required");
    }
    if display_name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return error_response(StatusCode::BAD_REQUEST, "display_name is too long");
    }

    let player = Player {
        slot,
        display_name: display_name.to_string(),
        avatar: payload.avatar.filter(|avatar| !avatar.trim().is_empty()),
    };
    info!(player = %slot, display_name = %player.display_name, "player signed in");
    let dto = PlayerDto::from(&player);
    state.players.write().await[slot.index()] = player;
    (StatusCode::OK, Json(dto)).into_response()
}

pub async fn list_players(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let players = state.players.read().await;
    Json(players.iter().map(PlayerDto::from).collect::<Vec<_>>())
}

pub async fn start_game(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<StartGameRequest>>,
) -> impl IntoResponse {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let prompt = request.prompt.unwrap_or_else(PromptTarget::random);

    state.board.reset();
    let game_id = state.sequencer.start(prompt);
    info!(game_id, prompt = prompt.name(), "game started");
    (
        StatusCode::CREATED,
        Json(StartGameResponse { game_id, prompt }),
    )
}

pub async fn get_game(State(state): State<Arc<AppState>>) -> Response {
    match state.sequencer.state() {
        Some(round) => Json(RoundStateDto::from(&round)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "no game started"),
    }
}

pub async fn get_results(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let outputs = state.runner.outputs();
    Json(ResultsResponse {
        results: state.board.results().as_ref().map(ResultsDto::from),
        outputs: slot_statuses(&outputs),
        score: state.aggregator.latest().as_ref().map(ScoreDto::from),
    })
}

pub async fn recompute_results(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.aggregator.recompute();
    StatusCode::ACCEPTED
}

pub async fn get_output_image(
    State(state): State<Arc<AppState>>,
    Path(slot): Path<u8>,
) -> Response {
    let slot = match parse_slot(slot) {
        Ok(slot) => slot,
        Err(response) => return response,
    };
    let Some(image) = state
        .runner
        .outputs()
        .finished(slot)
        .map(|finished| finished.image.clone())
    else {
        return error_response(StatusCode::NOT_FOUND, "output not ready");
    };

    match tokio::task::spawn_blocking(move || image.encode_png()).await {
        Ok(Ok(bytes)) => ([(header::CONTENT_TYPE, "image/png")], bytes).into_response(),
        Ok(Err(e)) => {
            warn!(player = %slot, error = %e, "failed to encode output image");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to encode image")
        }
        Err(e) => {
            warn!(player = %slot, error = %e, "output encoder task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to encode image")
        }
    }
}

pub async fn get_engine(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let engine_state = *state.runner.engine_state().borrow();
    Json(EngineResponse {
        state: engine_state,
    })
}

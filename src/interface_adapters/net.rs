// WebSocket adapter for the drawing client: pushes game state, accepts canvas uploads.

use crate::domain::{EngineState, RasterImage, ResultsPayload, RoundState, ScoreResult, SlotOutputs};
use crate::interface_adapters::canvas::CanvasCommand;
use crate::interface_adapters::protocol::{
    ClientMessage, RoundEventDto, RoundStateDto, ScoreDto, ServerMessage, slot_statuses,
};
use crate::interface_adapters::state::AppState;
use crate::use_cases::RoundEvent;

use axum::{
    Error,
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use futures_util::SinkExt;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

#[derive(Debug)]
enum NetError {
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    EventsClosed,
    CanvasClosed,
}

enum LoopControl {
    Continue,
    Disconnect,
}

const MAX_INVALID_MESSAGES: u32 = 10;
// Uploads are full-canvas PNGs; anything larger is not a sketch.
const MAX_UPLOAD_BYTES: usize = 8 * 1024 * 1024;

struct ConnCtx {
    state: Arc<AppState>,
    round_rx: watch::Receiver<Option<RoundState>>,
    events_rx: broadcast::Receiver<RoundEvent>,
    canvas_rx: broadcast::Receiver<CanvasCommand>,
    chrome_rx: watch::Receiver<bool>,
    outputs_rx: watch::Receiver<SlotOutputs>,
    score_rx: watch::Receiver<Option<ScoreResult>>,
    engine_rx: watch::Receiver<EngineState>,
    results_rx: watch::Receiver<Option<ResultsPayload>>,

    msgs_in: u64,
    msgs_out: u64,
    uploads_accepted: u64,
    invalid_messages: u32,
    close_frame: Option<CloseFrame>,
}

impl ConnCtx {
    fn new(state: Arc<AppState>) -> Self {
        Self {
            round_rx: state.sequencer.subscribe_state(),
            events_rx: state.sequencer.subscribe_events(),
            canvas_rx: state.canvas.subscribe(),
            chrome_rx: state.board.subscribe_chrome(),
            outputs_rx: state.runner.subscribe(),
            score_rx: state.aggregator.subscribe(),
            engine_rx: state.runner.engine_state(),
            results_rx: state.board.subscribe_results(),
            state,
            msgs_in: 0,
            msgs_out: 0,
            uploads_accepted: 0,
            invalid_messages: 0,
            close_frame: None,
        }
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        let conn_id = Uuid::new_v4().to_string();
        handle_socket(socket, state).instrument(info_span!("conn", %conn_id))
    })
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let mut ctx = ConnCtx::new(state);
    info!("client connected");

    if let Err(e) = send_snapshot(&mut socket, &mut ctx).await {
        warn!(error = ?e, "failed to send initial snapshot");
        return;
    }

    if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
        warn!(error = ?e, "client loop exited with error");
    }

    debug!(
        msgs_in = ctx.msgs_in,
        msgs_out = ctx.msgs_out,
        uploads = ctx.uploads_accepted,
        invalid = ctx.invalid_messages,
        "connection stats"
    );
    info!("client disconnected");
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<(), NetError> {
    let txt = serde_json::to_string(msg).map_err(NetError::Serialization)?;
    socket
        .send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)
}

// Late joiners get the current value of every observable before any deltas.
async fn send_snapshot(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let mut messages = Vec::with_capacity(6);
    if let Some(round) = ctx.round_rx.borrow_and_update().as_ref() {
        messages.push(ServerMessage::Round(RoundStateDto::from(round)));
    }
    messages.push(ServerMessage::Chrome {
        enabled: *ctx.chrome_rx.borrow_and_update(),
    });
    messages.push(ServerMessage::Outputs(slot_statuses(
        &ctx.outputs_rx.borrow_and_update(),
    )));
    messages.push(ServerMessage::Score(
        ctx.score_rx.borrow_and_update().as_ref().map(ScoreDto::from),
    ));
    messages.push(ServerMessage::Engine {
        state: *ctx.engine_rx.borrow_and_update(),
    });
    if let Some(results) = ctx.results_rx.borrow_and_update().as_ref() {
        messages.push(ServerMessage::ResultsReady(results.into()));
    }
    messages.push(input_state(&ctx.state));

    for message in &messages {
        send_message(socket, message).await?;
        ctx.msgs_out += 1;
    }
    Ok(())
}

fn input_state(state: &AppState) -> ServerMessage {
    ServerMessage::Canvas(CanvasCommand::SetInputEnabled(state.canvas.input_enabled()).into())
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    // Split borrows so `tokio::select!` can hold them concurrently.
    let ConnCtx {
        state,
        round_rx,
        events_rx,
        canvas_rx,
        chrome_rx,
        outputs_rx,
        score_rx,
        engine_rx,
        results_rx,
        msgs_in,
        msgs_out,
        uploads_accepted,
        invalid_messages,
        close_frame,
    } = ctx;

    let mut fatal: Option<NetError> = None;

    loop {
        let outgoing: Option<ServerMessage> = tokio::select! {
            incoming = socket.recv() => {
                match handle_incoming_ws(
                    incoming,
                    state,
                    msgs_in,
                    uploads_accepted,
                    invalid_messages,
                    close_frame,
                ).await {
                    LoopControl::Continue => None,
                    LoopControl::Disconnect => break,
                }
            }

            event = events_rx.recv() => {
                match event {
                    Ok(event) => Some(ServerMessage::Event(RoundEventDto::from(&event))),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Round state is a watch, so the client still converges on the latest phase.
                        warn!(missed = n, "round events lagged");
                        None
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::EventsClosed);
                        break;
                    }
                }
            }

            command = canvas_rx.recv() => {
                match command {
                    Ok(command) => Some(ServerMessage::Canvas(command.into())),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "canvas commands lagged; resending input state");
                        Some(input_state(state))
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::CanvasClosed);
                        break;
                    }
                }
            }

            Ok(()) = round_rx.changed() => {
                round_rx
                    .borrow_and_update()
                    .as_ref()
                    .map(|round| ServerMessage::Round(round.into()))
            }

            Ok(()) = chrome_rx.changed() => {
                Some(ServerMessage::Chrome { enabled: *chrome_rx.borrow_and_update() })
            }

            Ok(()) = outputs_rx.changed() => {
                Some(ServerMessage::Outputs(slot_statuses(&outputs_rx.borrow_and_update())))
            }

            Ok(()) = score_rx.changed() => {
                Some(ServerMessage::Score(score_rx.borrow_and_update().as_ref().map(ScoreDto::from)))
            }

            Ok(()) = engine_rx.changed() => {
                Some(ServerMessage::Engine { state: *engine_rx.borrow_and_update() })
            }

            Ok(()) = results_rx.changed() => {
                results_rx
                    .borrow_and_update()
                    .as_ref()
                    .map(|results| ServerMessage::ResultsReady(results.into()))
            }
        };

        if let Some(message) = outgoing {
            if let Err(e) = send_message(socket, &message).await {
                debug!(error = ?e, "failed to push message; disconnecting");
                break;
            }
            *msgs_out += 1;
        }
    }

    if let Some(frame) = close_frame.take() {
        let _ = socket.send(Message::Close(Some(frame))).await;
    }
    if let Err(err) = socket.close().await {
        debug!(error = ?err, "socket close error");
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    state: &AppState,
    msgs_in: &mut u64,
    uploads_accepted: &mut u64,
    invalid_messages: &mut u32,
    close_frame: &mut Option<CloseFrame>,
) -> LoopControl {
    let message = match incoming {
        Some(Ok(message)) => message,
        Some(Err(e)) => {
            debug!(error = ?e, "websocket receive error");
            return LoopControl::Disconnect;
        }
        None => return LoopControl::Disconnect,
    };
    *msgs_in += 1;

    let png = match message {
        Message::Text(text) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
            Ok(ClientMessage::Canvas(upload)) => STANDARD.decode(upload.png_base64).ok(),
            Err(_) => None,
        },
        // Raw PNG bytes are accepted as a canvas upload too.
        Message::Binary(bytes) => Some(bytes.to_vec()),
        Message::Ping(_) | Message::Pong(_) => return LoopControl::Continue,
        Message::Close(_) => return LoopControl::Disconnect,
    };

    let decoded = match png {
        Some(bytes) if bytes.len() <= MAX_UPLOAD_BYTES => {
            tokio::task::spawn_blocking(move || RasterImage::decode_png(&bytes))
                .await
                .ok()
                .and_then(Result::ok)
        }
        _ => None,
    };

    match decoded {
        Some(image) => {
            if state.canvas.accept_upload(image) {
                *uploads_accepted += 1;
            }
            LoopControl::Continue
        }
        None => {
            *invalid_messages += 1;
            debug!(count = *invalid_messages, "invalid client message");
            if *invalid_messages >= MAX_INVALID_MESSAGES {
                *close_frame = Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: "too many invalid messages".into(),
                });
                return LoopControl::Disconnect;
            }
            LoopControl::Continue
        }
    }
}

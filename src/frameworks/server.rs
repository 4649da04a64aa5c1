// Framework bootstrap for the drawing game server runtime.

use crate::domain::ports::InferenceEngine;
use crate::frameworks::config::{self, CANVAS_COMMAND_CAPACITY, EngineKind, GameConfig};
use crate::interface_adapters::canvas::RemoteCanvas;
use crate::interface_adapters::clients::{EchoEngine, HttpDiffusionEngine};
use crate::interface_adapters::navigator::ResultsBoard;
use crate::interface_adapters::routes::app;
use crate::interface_adapters::scorer::FeaturePrintScorer;
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::store::FsArtifactStore;
use crate::use_cases::{AugmentationJobRunner, ResultsAggregator, RoundSequencer};

use std::net::SocketAddr;
use std::{io::Result, sync::Arc};

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: tokio::net::TcpListener, config: GameConfig) -> Result<()> {
    let address = listener.local_addr()?;
    let state = build_state(&config)?;
    let app = app(state);

    tracing::info!(%address, "listening");

    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let config = config::load().map_err(|e| {
        tracing::error!(error = %e, "failed to load configuration");
        std::io::Error::other(e)
    })?;
    let address = SocketAddr::new(config.server.host, config.server.port);

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener, config).await
}

pub(crate) fn build_state(config: &GameConfig) -> Result<Arc<AppState>> {
    let engine: Arc<dyn InferenceEngine> = match config.engine.kind {
        EngineKind::Http => {
            let engine = HttpDiffusionEngine::new(
                config.engine.base_url.clone(),
                config.engine.request_timeout(),
                config.engine.progress_poll_interval(),
            )
            .map_err(|e| {
                std::io::Error::other(format!("failed to initialize diffusion client: {e}"))
            })?;
            tracing::debug!(
                base_url = %config.engine.base_url,
                poll_ms = config.engine.progress_poll_ms,
                "diffusion engine configured"
            );
            Arc::new(engine)
        }
        EngineKind::Echo => {
            tracing::warn!("echo engine configured; outputs are resized sketches");
            Arc::new(EchoEngine::new(config.engine.echo_step_delay()))
        }
    };

    // The runner owns the single worker lane; the engine loads there first.
    let runner = Arc::new(AugmentationJobRunner::spawn(engine, config.augment.clone()));

    let store = Arc::new(FsArtifactStore::new(config.server.artifact_dir.clone()));
    let canvas = Arc::new(RemoteCanvas::new(
        config.round.snapshot_size,
        CANVAS_COMMAND_CAPACITY,
    ));
    let board = Arc::new(ResultsBoard::new());

    let aggregator = Arc::new(ResultsAggregator::spawn(
        runner.subscribe(),
        Arc::new(FeaturePrintScorer::default()),
        store.clone(),
        config.scoring.mode,
    ));
    tracing::debug!(mode = ?config.scoring.mode, "results aggregator started");

    let sequencer = Arc::new(RoundSequencer::new(
        config.round.clone(),
        canvas.clone(),
        store,
        board.clone(),
        runner.clone(),
    ));

    Ok(Arc::new(AppState::new(
        sequencer, runner, aggregator, canvas, board,
    )))
}

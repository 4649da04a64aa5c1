// Shared primitives for one-time server bootstrapping across integration tests.
use doodle_duel::GameConfig;
use doodle_duel::frameworks::config::EngineKind;
use std::{
    path::PathBuf,
    sync::{Arc, OnceLock},
    time::Duration,
};

// Global base URL used by all tests after the server publishes its bound address.
static SERVER_URL: OnceLock<String> = OnceLock::new();
// One-time guard that ensures the server bootstrap path runs only once.
static SERVER_READY: OnceLock<()> = OnceLock::new();
static ARTIFACT_DIR: OnceLock<PathBuf> = OnceLock::new();

// Fast rounds and the offline engine so a full game finishes in well under a second.
fn test_config() -> GameConfig {
    let mut config = GameConfig::default();
    config.round.time_unit_ms = 10;
    config.round.pre_round_delay = 2;
    config.round.round_duration = 5;
    config.round.warning_thresholds = vec![3, 1];
    config.engine.kind = EngineKind::Echo;
    config.engine.echo_step_delay_ms = 0;
    config.augment.step_count = 4;
    config.augment.target_size = 64;
    config.server.artifact_dir = artifact_dir().to_path_buf();
    config
}

pub fn artifact_dir() -> &'static PathBuf {
    ARTIFACT_DIR.get_or_init(|| {
        std::env::temp_dir().join(format!("doodle-it-{}", uuid::Uuid::new_v4()))
    })
}

// Ensure the test server is running and return the shared base URL.
pub fn ensure_server() -> &'static str {
    ensure_server_with(|_| {})
}

// Same as `ensure_server`, letting a test binary adjust the config before the first start.
pub fn ensure_server_with(tune: impl FnOnce(&mut GameConfig)) -> &'static str {
    SERVER_READY.get_or_init(|| {
        let mut config = test_config();
        tune(&mut config);
        let published_url = Arc::new(OnceLock::<String>::new());
        let published_url_thread = Arc::clone(&published_url);
        // Spawn an OS thread so the server outlives individual `#[tokio::test]` runtimes.
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                // Bind to an ephemeral port to avoid collisions with local services.
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let _ = published_url_thread.set(format!("http://{}", addr));
                doodle_duel::run(listener, config)
                    .await
                    .expect("server failed");
            });
        });
        wait_for_server_url_and_readiness(published_url);
    });

    SERVER_URL
        .get()
        .expect("server url should be initialized")
        .as_str()
}

// Wait for URL publication and then wait for the server socket to accept TCP connections.
fn wait_for_server_url_and_readiness(published_url: Arc<OnceLock<String>>) {
    let base_url = loop {
        if let Some(url) = published_url.get() {
            break url.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };

    let _ = SERVER_URL.set(base_url.clone());

    let addr = base_url
        .strip_prefix("http://")
        .expect("base url should use http://");

    for _ in 0..100 {
        if std::net::TcpStream::connect(addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    panic!("server did not become ready in time");
}

use crate::domain::ScoringMode;
use crate::use_cases::{AugmentSettings, RoundSettings};
use serde::Deserialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fmt, io};

// Runtime/server configuration. Gameplay tuning lives in `RoundSettings` and `AugmentSettings`.

pub const CONFIG_PATH_VAR: &str = "DOODLE_CONFIG";
pub const CANVAS_COMMAND_CAPACITY: usize = 32;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub server: ServerConfig,
    pub round: RoundSettings,
    pub augment: AugmentSettings,
    pub engine: EngineConfig,
    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    // Where finished sketches are written, one file per slot.
    pub artifact_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3001,
            artifact_dir: PathBuf::from("artifacts"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Http,
    Echo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub kind: EngineKind,
    pub base_url: String,
    // Transport timeout for diffusion requests; none by default.
    pub request_timeout_ms: Option<u64>,
    pub progress_poll_ms: u64,
    // Per-step delay for the echo engine.
    pub echo_step_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::Http,
            base_url: "http://127.0.0.1:7860".to_string(),
            request_timeout_ms: None,
            progress_poll_ms: 500,
            echo_step_delay_ms: 50,
        }
    }
}

impl EngineConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn progress_poll_interval(&self) -> Duration {
        Duration::from_millis(self.progress_poll_ms)
    }

    pub fn echo_step_delay(&self) -> Duration {
        Duration::from_millis(self.echo_step_delay_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub mode: ScoringMode,
}

#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: io::Error },
    Parse(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            ConfigError::Parse(e) => write!(f, "failed to parse config: {e}"),
            ConfigError::Invalid(reason) => write!(f, "invalid config: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Loads the optional TOML file named by `DOODLE_CONFIG`, then applies environment overrides.
pub fn load() -> Result<GameConfig, ConfigError> {
    let mut config = match env::var(CONFIG_PATH_VAR) {
        Ok(path) => GameConfig::from_file(Path::new(&path))?,
        Err(_) => GameConfig::default(),
    };
    config.apply_overrides(|key| env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

impl GameConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(ConfigError::Parse)
    }

    /// Applies `DOODLE_PORT`, `ARTIFACT_DIR`, `DIFFUSION_URL` and `SCORING_MODE`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(port) = lookup("DOODLE_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("DOODLE_PORT is not a port: {port}")))?;
        }
        if let Some(dir) = lookup("ARTIFACT_DIR") {
            self.server.artifact_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("DIFFUSION_URL") {
            self.engine.kind = EngineKind::Http;
            self.engine.base_url = url;
        }
        if let Some(mode) = lookup("SCORING_MODE") {
            self.scoring.mode = match mode.trim() {
                "between_players" => ScoringMode::BetweenPlayers,
                "sketch_vs_augmented" => ScoringMode::SketchVsAugmented,
                other => {
                    return Err(ConfigError::Invalid(format!(
                        "SCORING_MODE must be between_players or sketch_vs_augmented, got {other}"
                    )));
                }
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| Err(ConfigError::Invalid(reason.to_string()));
        let round = &self.round;
        if !(1..=2).contains(&round.players) {
            return invalid("round.players must be 1 or 2");
        }
        if round.round_duration == 0 {
            return invalid("round.round_duration must be positive");
        }
        if round.time_unit_ms == 0 {
            return invalid("round.time_unit_ms must be positive");
        }
        if round.snapshot_size == 0 {
            return invalid("round.snapshot_size must be positive");
        }

        let augment = &self.augment;
        if !augment.prompt_template.contains("{target}") {
            return invalid("augment.prompt_template must contain {target}");
        }
        if augment.step_count == 0 {
            return invalid("augment.step_count must be positive");
        }
        if !(0.0..=1.0).contains(&augment.strength) {
            return invalid("augment.strength must be within [0, 1]");
        }
        if augment.target_size == 0 || augment.image_count == 0 {
            return invalid("augment.target_size and augment.image_count must be positive");
        }
        if augment.queue_capacity == 0 {
            return invalid("augment.queue_capacity must be positive");
        }

        if self.engine.kind == EngineKind::Http && self.engine.base_url.trim().is_empty() {
            return invalid("engine.base_url is required for the http engine");
        }
        Ok(())
    }
}

/// CLI configuration
use cadence_engine_sim::EngineConfig;
use cadence_playback::{PlaybackConfig, PlaybackError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file, used when present in the working directory
const DEFAULT_CONFIG_FILE: &str = "cadence.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<PlaybackError> for ConfigError {
    fn from(err: PlaybackError) -> Self {
        ConfigError::Invalid(err.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CliConfig {
    /// Controller settings
    pub playback: PlaybackConfig,

    /// Simulated engine settings
    pub engine: EngineConfig,
}

impl CliConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist; otherwise `cadence.toml` is read if
    /// present. Environment variables override both, e.g.
    /// `CADENCE__PLAYBACK__PROGRESS_INTERVAL_MS=100`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("CADENCE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.playback.validate()?;

        if self.engine.tick_ms == 0 {
            return Err(ConfigError::Invalid(
                "engine.tick_ms must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

//! TOML configuration file loading
//!
//! Supports `~/.config/ember/config.toml` as a persistent config source.
//! All fields are optional — the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

use super::Config;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct EmberConfigFile {
    /// Robot/capability settings
    #[serde(default)]
    pub robot: RobotFileConfig,

    /// Wake detection settings
    #[serde(default)]
    pub wake: WakeFileConfig,

    /// Conversation backend settings
    #[serde(default)]
    pub backend: BackendFileConfig,

    /// Session limits
    #[serde(default)]
    pub session: SessionFileConfig,

    /// Reconnection backoff settings
    #[serde(default)]
    pub reconnect: ReconnectFileConfig,

    /// Cost and budget settings
    #[serde(default)]
    pub cost: CostFileConfig,

    /// Conversation profile
    #[serde(default)]
    pub profile: ProfileFileConfig,

    /// Data directory override
    pub data_dir: Option<PathBuf>,
}

/// Robot settings
#[derive(Debug, Default, Deserialize)]
pub struct RobotFileConfig {
    /// Run without physical hardware
    pub simulate: Option<bool>,

    /// Expression choreography speed multiplier
    pub expression_speed: Option<f64>,
}

/// Wake detection settings
#[derive(Debug, Default, Deserialize)]
pub struct WakeFileConfig {
    /// Minimum confidence to accept a wake candidate
    pub confidence_threshold: Option<f32>,

    /// Trigger suppression window in seconds
    pub refractory_sec: Option<f64>,
}

/// Backend settings
#[derive(Debug, Default, Deserialize)]
pub struct BackendFileConfig {
    /// Backend kind (e.g. "simulated")
    pub kind: Option<String>,

    /// Model identifier
    pub model: Option<String>,

    /// Voice identifier
    pub voice: Option<String>,
}

/// Session limit settings
#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    pub max_duration_sec: Option<u64>,
    pub silence_timeout_sec: Option<u64>,
    pub cooldown_sec: Option<u64>,
}

/// Reconnection backoff settings
#[derive(Debug, Default, Deserialize)]
pub struct ReconnectFileConfig {
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub max_attempts: Option<u32>,
}

/// Cost and budget settings
#[derive(Debug, Default, Deserialize)]
pub struct CostFileConfig {
    /// Daily spend ceiling in USD
    pub daily_budget_usd: Option<f64>,

    /// Per-session admission estimate in USD
    pub session_estimate_usd: Option<f64>,

    /// Input audio price per million tokens
    pub input_audio_per_million: Option<f64>,

    /// Output audio price per million tokens
    pub output_audio_per_million: Option<f64>,
}

/// Conversation profile settings
#[derive(Debug, Default, Deserialize)]
pub struct ProfileFileConfig {
    /// Profile name
    pub name: Option<String>,

    /// Allowed tool names (allow-list)
    pub tools: Option<Vec<String>>,

    /// Instruction payload sent to the backend
    pub instructions: Option<String>,
}

impl EmberConfigFile {
    /// Overlay the file's values onto `config`
    pub fn apply(self, config: &mut Config) {
        if let Some(v) = self.robot.simulate {
            config.robot.simulate = v;
        }
        if let Some(v) = self.robot.expression_speed {
            config.robot.expression_speed = v;
        }
        if let Some(v) = self.wake.confidence_threshold {
            config.wake.confidence_threshold = v;
        }
        if let Some(v) = self.wake.refractory_sec {
            config.wake.refractory_sec = v;
        }
        if let Some(v) = self.backend.kind {
            config.backend.kind = v;
        }
        if let Some(v) = self.backend.model {
            config.backend.model = v;
        }
        if let Some(v) = self.backend.voice {
            config.backend.voice = v;
        }
        if let Some(v) = self.session.max_duration_sec {
            config.session.max_duration_sec = v;
        }
        if let Some(v) = self.session.silence_timeout_sec {
            config.session.silence_timeout_sec = v;
        }
        if let Some(v) = self.session.cooldown_sec {
            config.session.cooldown_sec = v;
        }
        if let Some(v) = self.reconnect.base_delay_ms {
            config.reconnect.base_delay_ms = v;
        }
        if let Some(v) = self.reconnect.max_delay_ms {
            config.reconnect.max_delay_ms = v;
        }
        if let Some(v) = self.reconnect.max_attempts {
            config.reconnect.max_attempts = v;
        }
        if let Some(v) = self.cost.daily_budget_usd {
            config.cost.daily_budget_usd = v;
        }
        if let Some(v) = self.cost.session_estimate_usd {
            config.cost.session_estimate_usd = v;
        }
        if let Some(v) = self.cost.input_audio_per_million {
            config.cost.pricing.input_audio_per_million = v;
        }
        if let Some(v) = self.cost.output_audio_per_million {
            config.cost.pricing.output_audio_per_million = v;
        }
        if let Some(v) = self.profile.name {
            config.profile.name = v;
        }
        if let Some(v) = self.profile.tools {
            config.profile.allowed_tools = v;
        }
        if let Some(v) = self.profile.instructions {
            config.profile.instructions = v;
        }
        if let Some(v) = self.data_dir {
            config.data_dir = v;
        }
    }
}

/// Load the TOML config file from the standard path
///
/// Returns `EmberConfigFile::default()` if the file doesn't exist or can't be
/// parsed.
#[must_use]
pub fn load_config_file() -> EmberConfigFile {
    let Some(path) = config_file_path() else {
        return EmberConfigFile::default();
    };

    if !path.exists() {
        return EmberConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                EmberConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            EmberConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/ember/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("ember").join("config.toml"))
}

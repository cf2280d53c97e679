//! Configuration for the Ember companion
//!
//! Defaults are compiled in; a TOML file overlays them field by field; the API
//! key comes from the environment. Loading is plain values only — no network,
//! no prompts.

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cost::Pricing;
use crate::session::reconnect::ReconnectPolicy;
use crate::tools::Profile;
use crate::{Error, Result};

/// Environment variable holding the backend API key
pub const API_KEY_ENV: &str = "EMBER_API_KEY";

/// Full companion configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Robot/capability configuration
    pub robot: RobotConfig,

    /// Wake detection configuration
    pub wake: WakeConfig,

    /// Conversation backend configuration
    pub backend: BackendConfig,

    /// Session limits
    pub session: SessionConfig,

    /// Reconnection backoff configuration
    pub reconnect: ReconnectConfig,

    /// Cost tracking and budget configuration
    pub cost: CostConfig,

    /// Selected conversation profile
    pub profile: Profile,

    /// Backend API key (from `EMBER_API_KEY`)
    pub api_key: Option<String>,

    /// Data directory (cost ledger lives here)
    pub data_dir: PathBuf,
}

/// Robot capability configuration
#[derive(Debug, Clone)]
pub struct RobotConfig {
    /// Run without physical hardware; all actions are logged no-ops
    pub simulate: bool,

    /// Speed multiplier applied to expression choreography
    pub expression_speed: f64,
}

/// Wake detection configuration
#[derive(Debug, Clone)]
pub struct WakeConfig {
    /// Minimum confidence to accept a wake candidate
    pub confidence_threshold: f32,

    /// Seconds after a trigger during which new triggers are suppressed
    pub refractory_sec: f64,
}

/// Conversation backend configuration
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Backend kind, resolved through the backend registry
    pub kind: String,

    /// Model identifier passed to the backend
    pub model: String,

    /// Voice identifier passed to the backend
    pub voice: String,
}

/// Session limits
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Absolute session ceiling in seconds
    pub max_duration_sec: u64,

    /// Silence window in seconds before the session is ended
    pub silence_timeout_sec: u64,

    /// Cooldown in seconds before the companion may re-wake
    pub cooldown_sec: u64,
}

/// Reconnection backoff configuration
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Base backoff delay in milliseconds
    pub base_delay_ms: u64,

    /// Backoff ceiling in milliseconds
    pub max_delay_ms: u64,

    /// Give up after this many attempts within one failure episode
    pub max_attempts: u32,
}

impl ReconnectConfig {
    /// Build the pure reconnection policy from these values
    #[must_use]
    pub const fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_attempts: self.max_attempts,
        }
    }
}

/// Cost tracking and budget configuration
#[derive(Debug, Clone)]
pub struct CostConfig {
    /// Daily spend ceiling in USD
    pub daily_budget_usd: f64,

    /// Per-session cost estimate used for admission control
    pub session_estimate_usd: f64,

    /// Audio token pricing
    pub pricing: Pricing,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            robot: RobotConfig {
                simulate: false,
                expression_speed: 1.0,
            },
            wake: WakeConfig {
                confidence_threshold: 0.7,
                refractory_sec: 3.0,
            },
            backend: BackendConfig {
                kind: "simulated".to_string(),
                model: "ember-audio-1".to_string(),
                voice: "aria".to_string(),
            },
            session: SessionConfig {
                max_duration_sec: 300,
                silence_timeout_sec: 15,
                cooldown_sec: 5,
            },
            reconnect: ReconnectConfig {
                base_delay_ms: 500,
                max_delay_ms: 30_000,
                max_attempts: 5,
            },
            cost: CostConfig {
                daily_budget_usd: 1.00,
                session_estimate_usd: 0.10,
                pricing: Pricing::default(),
            },
            profile: Profile::default(),
            api_key: None,
            data_dir: default_data_dir(),
        }
    }
}

impl Config {
    /// Load configuration: defaults, then the TOML overlay, then env secrets.
    ///
    /// `path` overrides the standard config file location
    /// (`~/.config/ember/config.toml`).
    ///
    /// # Errors
    ///
    /// Returns error if an explicitly given config file cannot be read or
    /// parsed. The standard-location file is best-effort like the rest of the
    /// overlay.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let overlay = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p).map_err(|e| {
                    Error::Config(format!("cannot read config {}: {e}", p.display()))
                })?;
                toml::from_str(&content)?
            }
            None => file::load_config_file(),
        };

        let mut config = Self::default();
        overlay.apply(&mut config);

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                config.api_key = Some(key);
            }
        }

        Ok(config)
    }

    /// Validate startup invariants.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` describing the first violated invariant. A
    /// missing API key is only an error for non-simulated backends.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.wake.confidence_threshold) {
            return Err(Error::Config(format!(
                "wake.confidence_threshold must be in [0, 1], got {}",
                self.wake.confidence_threshold
            )));
        }
        if self.session.max_duration_sec == 0 {
            return Err(Error::Config(
                "session.max_duration_sec must be positive".to_string(),
            ));
        }
        if self.session.silence_timeout_sec > self.session.max_duration_sec {
            return Err(Error::Config(
                "session.silence_timeout_sec exceeds session.max_duration_sec".to_string(),
            ));
        }
        if self.cost.daily_budget_usd <= 0.0 {
            return Err(Error::Config(
                "cost.daily_budget_usd must be positive".to_string(),
            ));
        }
        if self.reconnect.max_attempts == 0 {
            return Err(Error::Config(
                "reconnect.max_attempts must be positive".to_string(),
            ));
        }
        if self.backend.kind != "simulated" && self.api_key.is_none() {
            return Err(Error::Config(format!(
                "backend '{}' requires {API_KEY_ENV} to be set",
                self.backend.kind
            )));
        }
        Ok(())
    }
}

/// Default data directory: `~/.local/share/ember` (platform equivalent)
fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("data"),
        |dirs| dirs.data_dir().join("ember"),
    )
}

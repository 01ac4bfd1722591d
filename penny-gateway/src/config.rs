//! Gateway configuration, read from a TOML file.
//!
//! ```toml
//! bind = "127.0.0.1:8080"
//! max_sessions = 10000
//! session_idle_secs = 3600
//! default_profile = "personal"
//!
//! [fleet.personal]
//! base_url = "http://heart-personal:31009"
//! token = "..."
//!
//! [engine]
//! write_delay_ms = 50
//! retry_budget_ms = 2000
//! duplicate_types = "report"
//! ```

use penny_fleet::FleetConfig;
use penny_ontology::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 3_600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Socket address the HTTP API listens on.
    pub bind: String,
    /// Most caller sessions remembered at once.
    pub max_sessions: usize,
    /// Seconds after which an unused session falls back to the default profile.
    pub session_idle_secs: u64,
    #[serde(flatten)]
    pub fleet: FleetConfig,
    pub engine: EngineConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            max_sessions: DEFAULT_MAX_SESSIONS,
            session_idle_secs: DEFAULT_SESSION_IDLE_SECS,
            fleet: FleetConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Loads the file at `path`. Without a path, or when the file does not
    /// exist, the built-in three-profile fleet is used.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            info!("No configuration file given, using defaults");
            return Ok(Self::default());
        };
        if !path.exists() {
            info!("No configuration file found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        info!(
            "Loaded configuration from {:?} ({} profiles)",
            path,
            config.fleet.profiles.len()
        );
        Ok(config)
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }
}

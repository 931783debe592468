// Client configuration file.
//
// Global config: `~/.folio/config.toml`. Every field has a default, so an
// empty or missing file is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::EngineConfig;

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";

const DEFAULT_LOCAL_SAVE_MS: u64 = 500;
const MIN_LOCAL_SAVE_MS: u64 = 100;
const MAX_LOCAL_SAVE_MS: u64 = 5_000;

const DEFAULT_REMOTE_PUSH_MS: u64 = 2_000;
const MIN_REMOTE_PUSH_MS: u64 = 500;
const MAX_REMOTE_PUSH_MS: u64 = 60_000;

const DEFAULT_MAX_PARALLEL_PUSHES: usize = 4;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Root directory for Folio client state: `~/.folio/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".folio"))
}

/// Path to the client config file: `~/.folio/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the Folio server.
    pub server_url: String,
    /// Draft database location. Defaults to `~/.folio/drafts.db`.
    pub drafts_db: Option<PathBuf>,
    /// Quiet period after the last edit before the draft is persisted.
    pub local_save_delay_ms: u64,
    /// Quiet period after a local save before the draft is pushed.
    pub remote_push_delay_ms: u64,
    /// Upper bound on concurrent pushes when reconnecting.
    pub max_parallel_pushes: usize,
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.into(),
            drafts_db: None,
            local_save_delay_ms: DEFAULT_LOCAL_SAVE_MS,
            remote_push_delay_ms: DEFAULT_REMOTE_PUSH_MS,
            max_parallel_pushes: DEFAULT_MAX_PARALLEL_PUSHES,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Load from `~/.folio/config.toml`. Returns defaults if the file
    /// doesn't exist or can't be parsed.
    pub fn load() -> Self {
        global_config_path().and_then(|p| Self::load_from(&p).ok()).unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Resolved draft database path, falling back to `~/.folio/drafts.db`
    /// and then to the working directory when no home is known.
    pub fn drafts_db_path(&self) -> PathBuf {
        self.drafts_db
            .clone()
            .or_else(|| global_dir().map(|d| d.join("drafts.db")))
            .unwrap_or_else(|| PathBuf::from(".folio-drafts.db"))
    }

    pub fn local_save_delay(&self) -> Duration {
        Duration::from_millis(self.local_save_delay_ms.clamp(MIN_LOCAL_SAVE_MS, MAX_LOCAL_SAVE_MS))
    }

    pub fn remote_push_delay(&self) -> Duration {
        Duration::from_millis(
            self.remote_push_delay_ms.clamp(MIN_REMOTE_PUSH_MS, MAX_REMOTE_PUSH_MS),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            local_save_delay: self.local_save_delay(),
            remote_push_delay: self.remote_push_delay(),
            max_parallel_pushes: self.max_parallel_pushes.max(1),
        }
    }
}

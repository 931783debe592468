// Server configuration.
//
// Centralizes environment variable parsing with defaults for local
// development. The data directory holds three sibling trees: the documents
// root, the asset root and the recovery area.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_GC_INTERVAL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_TRASH_RETENTION_DAYS: i64 = 30;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Core server configuration.
///
/// Constructed via [`ServerConfig::from_env`] which reads environment
/// variables and falls back to development defaults.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (host:port).
    pub listen_addr: SocketAddr,
    /// Root of all persisted state.
    pub data_dir: PathBuf,
    /// Comma-separated CORS origins (or `"*"` for any).
    pub cors_origins: Option<String>,
    /// Log filter directive (e.g. `info`, `folio_server=debug`).
    pub log_filter: String,
    /// Delay between scheduled collector passes.
    pub gc_interval: Duration,
    /// How long trashed documents and quarantined assets stay recoverable.
    pub trash_retention: chrono::Duration,
    /// Upper bound for request bodies and asset uploads.
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Parse configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `FOLIO_SERVER_HOST` | `0.0.0.0` |
    /// | `FOLIO_SERVER_PORT` | `8080` |
    /// | `FOLIO_DATA_DIR` | `./folio-data` |
    /// | `FOLIO_CORS_ORIGINS` | *(none: any loopback origin)* |
    /// | `FOLIO_SERVER_LOG_FILTER` | `info` |
    /// | `FOLIO_GC_INTERVAL_SECS` | `86400` |
    /// | `FOLIO_TRASH_RETENTION_DAYS` | `30` |
    /// | `FOLIO_MAX_UPLOAD_BYTES` | `26214400` |
    pub fn from_env() -> Self {
        Self::from_env_fn(|key| std::env::var(key))
    }

    /// Testable constructor that accepts an environment lookup function.
    fn from_env_fn<F>(env: F) -> Self
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let host = env("FOLIO_SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 =
            env("FOLIO_SERVER_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8080);
        let listen_addr = format!("{host}:{port}")
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)));

        let data_dir =
            env("FOLIO_DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| "./folio-data".into());
        let cors_origins = env("FOLIO_CORS_ORIGINS").ok();
        let log_filter = env("FOLIO_SERVER_LOG_FILTER").unwrap_or_else(|_| "info".into());

        let gc_interval_secs = env("FOLIO_GC_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_GC_INTERVAL_SECS);
        let retention_days = env("FOLIO_TRASH_RETENTION_DAYS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|days| *days >= 0)
            .unwrap_or(DEFAULT_TRASH_RETENTION_DAYS);
        let max_upload_bytes = env("FOLIO_MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|bytes| *bytes > 0)
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        Self {
            listen_addr,
            data_dir,
            cors_origins,
            log_filter,
            gc_interval: Duration::from_secs(gc_interval_secs),
            trash_retention: chrono::Duration::days(retention_days),
            max_upload_bytes,
        }
    }

    /// Configuration rooted at `data_dir` with every other value at its default.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::from_env_fn(|_| Err(std::env::VarError::NotPresent));
        config.data_dir = data_dir.into();
        config
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.data_dir.join("documents")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.data_dir.join("assets")
    }

    pub fn trash_dir(&self) -> PathBuf {
        self.data_dir.join(".trash")
    }
}

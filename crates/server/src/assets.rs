// Asset uploads: binary blobs stored under a date-partitioned directory with
// a random file name, addressed by a stable `/assets/...` URL path.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Utc};
use folio_common::protocol::routes::ASSET_URL_PREFIX;
use thiserror::Error;
use tokio::fs;
use tracing::info;
use uuid::Uuid;

const MAX_EXTENSION_CHARS: usize = 10;
const FALLBACK_EXTENSION: &str = "bin";

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset body is empty")]
    Empty,

    #[error("asset exceeds the {limit} byte upload limit")]
    TooLarge { limit: usize },

    #[error("invalid asset name: {0}")]
    InvalidName(String),

    #[error("failed to store asset: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
    max_bytes: usize,
}

impl AssetStore {
    pub fn open(root: impl Into<PathBuf>, max_bytes: usize) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root, max_bytes })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stores `bytes` and returns its URL path, e.g. `/assets/2024/01/01/<uuid>.png`.
    pub async fn upload(
        &self,
        original_name: &str,
        bytes: &[u8],
        now: DateTime<Utc>,
    ) -> Result<String, AssetError> {
        if bytes.is_empty() {
            return Err(AssetError::Empty);
        }
        if bytes.len() > self.max_bytes {
            return Err(AssetError::TooLarge { limit: self.max_bytes });
        }
        if original_name.trim().is_empty() || original_name.contains('\0') {
            return Err(AssetError::InvalidName(original_name.to_string()));
        }

        let relative = format!(
            "{:04}/{:02}/{:02}/{}.{}",
            now.year(),
            now.month(),
            now.day(),
            Uuid::new_v4(),
            sanitized_extension(original_name)
        );
        let destination = self.root.join(&relative);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&destination, bytes).await?;

        info!(asset = %relative, bytes = bytes.len(), "stored asset");
        Ok(format!("{ASSET_URL_PREFIX}{relative}"))
    }
}

/// Lowercased ASCII-alphanumeric extension, or `bin`.
fn sanitized_extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_CHARS
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

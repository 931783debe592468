// Server file store: sandboxed document CRUD with optimistic-concurrency
// patching and soft delete into the recovery area.

pub mod locks;
pub mod sandbox;
pub mod trash;
pub mod walk;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use folio_common::diff::TextPatch;
use folio_common::fingerprint::{fingerprint, Fingerprint};
use folio_common::path::{DocPath, PathError};
use folio_common::protocol::http::{EntryKind, TreeEntry};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use self::locks::PathLocks;
use self::sandbox::Sandbox;
use self::trash::Trash;
use self::walk::TreeWalker;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),

    #[error("path `{0}` resolves outside the storage root")]
    OutsideRoot(String),

    #[error("`{0}` does not exist")]
    NotFound(String),

    #[error("`{0}` is not a file")]
    NotAFile(String),

    #[error("`{0}` already exists")]
    AlreadyExists(String),

    #[error("destination `{0}` already exists")]
    DestinationExists(String),

    #[error("base fingerprint does not match current content")]
    VersionConflict { current_content: String },

    #[error("patch could not be applied: {reason}")]
    PatchApplyFailed { reason: String, current_content: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }
}

/// A document as read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSnapshot {
    pub content: String,
    pub last_modified: DateTime<Utc>,
    pub fingerprint: Fingerprint,
}

/// Result of a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub last_modified: DateTime<Utc>,
    pub fingerprint: Fingerprint,
}

#[derive(Debug)]
pub struct FileStore {
    sandbox: Sandbox,
    trash: Trash,
    locks: PathLocks,
}

impl FileStore {
    pub fn open(documents_root: &Path, trash: Trash) -> io::Result<Self> {
        Ok(Self {
            sandbox: Sandbox::open(documents_root)?,
            trash,
            locks: PathLocks::new(),
        })
    }

    pub fn root(&self) -> &Path {
        self.sandbox.root()
    }

    pub fn trash(&self) -> &Trash {
        &self.trash
    }

    pub async fn read(&self, path: &str) -> Result<DocumentSnapshot, StoreError> {
        let (doc, abs) = self.sandbox.resolve(path)?;
        let _guard = self.locks.lock(&doc).await;

        let (content, modified) = read_document(&doc, &abs).await?;
        let fingerprint = fingerprint(content.as_bytes());
        Ok(DocumentSnapshot { content, last_modified: modified.into(), fingerprint })
    }

    pub async fn create(&self, path: &str, kind: EntryKind) -> Result<(), StoreError> {
        let (doc, abs) = self.sandbox.resolve(path)?;
        let _guard = self.locks.lock(&doc).await;

        if exists(&abs).await {
            return Err(StoreError::AlreadyExists(doc.to_string()));
        }
        match kind {
            EntryKind::Directory => fs::create_dir_all(&abs)
                .await
                .map_err(|e| StoreError::io(format!("failed to create directory `{doc}`"), e))?,
            EntryKind::File => {
                create_parent_dirs(&doc, &abs).await?;
                fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&abs)
                    .await
                    .map_err(|e| match e.kind() {
                        io::ErrorKind::AlreadyExists => StoreError::AlreadyExists(doc.to_string()),
                        _ => StoreError::io(format!("failed to create `{doc}`"), e),
                    })?;
            }
        }

        info!(path = %doc, ?kind, "created entry");
        Ok(())
    }

    /// Unconditional overwrite: the conflict-resolution path, never rejected
    /// for a stale base. Missing files and parent directories are created.
    pub async fn full_update(&self, path: &str, content: &str) -> Result<WriteOutcome, StoreError> {
        let (doc, abs) = self.sandbox.resolve(path)?;
        let _guard = self.locks.lock(&doc).await;

        if is_dir(&abs).await {
            return Err(StoreError::NotAFile(doc.to_string()));
        }
        create_parent_dirs(&doc, &abs).await?;
        let outcome = self.write_document(&doc, &abs, content).await?;
        info!(path = %doc, fingerprint = %outcome.fingerprint, "full update");
        Ok(outcome)
    }

    /// Conditional update: applies `wire_patch` only when the current content
    /// still matches `base_fingerprint` and every hunk applies.
    pub async fn patch(
        &self,
        path: &str,
        wire_patch: &str,
        base_fingerprint: &str,
    ) -> Result<WriteOutcome, StoreError> {
        let (doc, abs) = self.sandbox.resolve(path)?;
        let _guard = self.locks.lock(&doc).await;

        let (current, _) = read_document(&doc, &abs).await?;
        if fingerprint(current.as_bytes()) != base_fingerprint {
            debug!(path = %doc, "patch base is stale");
            return Err(StoreError::VersionConflict { current_content: current });
        }

        let patch = match TextPatch::from_wire(wire_patch) {
            Ok(patch) => patch,
            Err(e) => {
                return Err(StoreError::PatchApplyFailed {
                    reason: e.to_string(),
                    current_content: current,
                })
            }
        };
        let applied = patch.apply(&current);
        if !applied.is_clean() {
            let reason = format!("hunks {:?} did not apply", applied.failed_hunks());
            return Err(StoreError::PatchApplyFailed { reason, current_content: current });
        }

        let outcome = self.write_document(&doc, &abs, &applied.text).await?;
        info!(path = %doc, hunks = patch.hunks().len(), fingerprint = %outcome.fingerprint, "patch applied");
        Ok(outcome)
    }

    /// Moves a file or directory into the recovery area.
    pub async fn soft_delete(&self, path: &str, now: DateTime<Utc>) -> Result<PathBuf, StoreError> {
        let (doc, abs) = self.sandbox.resolve(path)?;
        let _guard = self.locks.lock(&doc).await;

        if !exists(&abs).await {
            return Err(StoreError::NotFound(doc.to_string()));
        }

        let short_id = Uuid::new_v4().simple().to_string()[..8].to_string();
        let batch = Trash::batch_name(&format!("deleted-{short_id}"), now);
        let trash = self.trash.clone();
        let (source, relative) = (abs.clone(), doc.to_string());
        let destination = tokio::task::spawn_blocking(move || trash.relocate(&source, &batch, &relative))
            .await
            .map_err(|e| StoreError::io("trash relocation task failed", io::Error::other(e)))?
            .map_err(|e| StoreError::io(format!("failed to move `{doc}` to trash"), e))?;

        info!(path = %doc, trash = %destination.display(), "soft deleted");
        Ok(destination)
    }

    /// Renames within the existing tree; the destination's parent must exist.
    pub async fn rename(&self, old_path: &str, new_path: &str) -> Result<(), StoreError> {
        self.relocate(old_path, new_path, false).await
    }

    /// Moves anywhere in the tree, creating intermediate directories.
    pub async fn move_to(&self, old_path: &str, new_path: &str) -> Result<(), StoreError> {
        self.relocate(old_path, new_path, true).await
    }

    /// Every file and directory under the root, sorted by path.
    pub async fn list(&self) -> Result<Vec<TreeEntry>, StoreError> {
        let root = self.sandbox.root().to_path_buf();
        let entries = tokio::task::spawn_blocking(move || {
            TreeWalker::new(root)
                .map(|entry| {
                    entry.map(|e| TreeEntry {
                        path: e.relative,
                        kind: e.kind,
                        size: if e.kind == EntryKind::File { e.metadata.len() } else { 0 },
                        last_modified: e
                            .metadata
                            .modified()
                            .map(DateTime::<Utc>::from)
                            .unwrap_or_else(|_| Utc::now()),
                    })
                })
                .collect::<io::Result<Vec<_>>>()
        })
        .await
        .map_err(|e| StoreError::io("tree walk task failed", io::Error::other(e)))?
        .map_err(|e| StoreError::io("failed to list documents", e))?;

        let mut entries = entries;
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    async fn relocate(
        &self,
        old_path: &str,
        new_path: &str,
        create_parents: bool,
    ) -> Result<(), StoreError> {
        let (old_doc, old_abs) = self.sandbox.resolve(old_path)?;
        let (new_doc, new_abs) = self.sandbox.resolve(new_path)?;
        let _guard = self.locks.lock_pair(&old_doc, &new_doc).await;

        if !exists(&old_abs).await {
            return Err(StoreError::NotFound(old_doc.to_string()));
        }
        if exists(&new_abs).await {
            return Err(StoreError::DestinationExists(new_doc.to_string()));
        }
        if new_doc.starts_with(&old_doc) {
            return Err(StoreError::InvalidPath(PathError::InvalidComponent(format!(
                "cannot move `{old_doc}` inside itself"
            ))));
        }

        if create_parents {
            create_parent_dirs(&new_doc, &new_abs).await?;
        } else if let Some(parent) = new_doc.parent() {
            let parent_abs = self.sandbox.resolve_doc_path(&parent)?;
            if !is_dir(&parent_abs).await {
                return Err(StoreError::NotFound(parent.to_string()));
            }
        }

        fs::rename(&old_abs, &new_abs)
            .await
            .map_err(|e| StoreError::io(format!("failed to move `{old_doc}` to `{new_doc}`"), e))?;

        info!(from = %old_doc, to = %new_doc, "relocated entry");
        Ok(())
    }

    /// Writes via a reserved temp file and rename so readers never see a torn file.
    async fn write_document(
        &self,
        doc: &DocPath,
        abs: &Path,
        content: &str,
    ) -> Result<WriteOutcome, StoreError> {
        let parent = abs.parent().unwrap_or_else(|| self.sandbox.root());
        let temp = parent.join(format!(".folio.tmp-{}", Uuid::new_v4().simple()));

        if let Err(e) = fs::write(&temp, content.as_bytes()).await {
            let _ = fs::remove_file(&temp).await;
            return Err(StoreError::io(format!("failed to write `{doc}`"), e));
        }
        if let Err(e) = fs::rename(&temp, abs).await {
            let _ = fs::remove_file(&temp).await;
            return Err(StoreError::io(format!("failed to replace `{doc}`"), e));
        }

        let modified = modified_of(doc, abs).await?;
        let fingerprint = fingerprint(content.as_bytes());
        Ok(WriteOutcome { last_modified: modified.into(), fingerprint })
    }
}

async fn read_document(doc: &DocPath, abs: &Path) -> Result<(String, SystemTime), StoreError> {
    let modified = modified_of(doc, abs).await?;
    let bytes = fs::read(abs).await.map_err(|e| not_found_or_io(doc, e))?;
    let content = String::from_utf8(bytes).map_err(|e| {
        StoreError::io(
            format!("`{doc}` is not valid UTF-8"),
            io::Error::new(io::ErrorKind::InvalidData, e),
        )
    })?;
    Ok((content, modified))
}

async fn modified_of(doc: &DocPath, abs: &Path) -> Result<SystemTime, StoreError> {
    let metadata = fs::metadata(abs).await.map_err(|e| not_found_or_io(doc, e))?;
    if !metadata.is_file() {
        return Err(StoreError::NotAFile(doc.to_string()));
    }
    metadata
        .modified()
        .map_err(|e| StoreError::io(format!("no modification time for `{doc}`"), e))
}

async fn create_parent_dirs(doc: &DocPath, abs: &Path) -> Result<(), StoreError> {
    if let Some(parent) = abs.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(format!("failed to create parents of `{doc}`"), e))?;
    }
    Ok(())
}

fn not_found_or_io(doc: &DocPath, e: io::Error) -> StoreError {
    if e.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound(doc.to_string())
    } else {
        StoreError::io(format!("failed to read `{doc}`"), e)
    }
}

async fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).await.is_ok()
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

/// Shared handle used by the HTTP layer.
pub type SharedStore = Arc<FileStore>;

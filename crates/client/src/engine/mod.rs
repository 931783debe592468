// Sync engine: turns editor changes into durable drafts and pushes them to
// the server as shadow-copy patches, falling back to a full overwrite when
// the server rejects a patch.

pub mod schedule;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use folio_common::diff::TextPatch;
use folio_common::fingerprint::Fingerprint;
use folio_common::path::DocPath;
use folio_common::protocol::http::WriteResponse;
use futures_util::stream::{self, StreamExt};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::remote::{RemoteError, RemoteFiles};
use crate::store::drafts::{Draft, DraftStore, DraftStoreError};
use schedule::{DocSchedule, DueAction, ScheduleConfig};

/// Shown when a document is opened from the draft cache alone.
pub const OFFLINE_NOTICE: &str = "using offline copy";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub local_save_delay: Duration,
    pub remote_push_delay: Duration,
    pub max_parallel_pushes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            local_save_delay: Duration::from_millis(500),
            remote_push_delay: Duration::from_millis(2_000),
            max_parallel_pushes: 4,
        }
    }
}

impl EngineConfig {
    fn schedule(&self) -> ScheduleConfig {
        ScheduleConfig {
            local_save_delay: self.local_save_delay,
            remote_push_delay: self.remote_push_delay,
        }
    }
}

/// Result of one push. `last_modified` and `fingerprint` are only set on
/// success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub success: bool,
    pub last_modified: Option<DateTime<Utc>>,
    pub fingerprint: Option<Fingerprint>,
    pub error: Option<String>,
}

impl SyncOutcome {
    fn synced(response: WriteResponse) -> Self {
        Self {
            success: true,
            last_modified: Some(response.last_modified),
            fingerprint: Some(response.fingerprint),
            error: None,
        }
    }

    fn unchanged(draft: Option<&Draft>) -> Self {
        Self {
            success: true,
            last_modified: draft.and_then(|d| d.server_last_modified),
            fingerprint: draft.and_then(|d| d.shadow_fingerprint.clone()),
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()), ..Self::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocStatus {
    Saved,
    Unsaved,
    Saving,
    Offline,
    Error(String),
}

impl fmt::Display for DocStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Saved => f.write_str("saved"),
            Self::Unsaved => f.write_str("unsaved"),
            Self::Saving => f.write_str("saving"),
            Self::Offline => f.write_str("offline"),
            Self::Error(message) => write!(f, "error: {message}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Server,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    pub content: String,
    pub source: LoadSource,
    pub notice: Option<&'static str>,
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("document not found")]
    NotFound,
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Drafts(#[from] DraftStoreError),
}

impl SyncError {
    fn status(&self) -> DocStatus {
        match self {
            Self::Remote(RemoteError::Unreachable(_)) => DocStatus::Offline,
            other => DocStatus::Error(other.to_string()),
        }
    }
}

#[derive(Debug, Default)]
struct DocEntry {
    schedule: DocSchedule,
    /// Latest editor text not yet written to the draft store.
    pending: Option<String>,
    status: Option<DocStatus>,
}

pub struct SyncEngine<R> {
    remote: R,
    drafts: Arc<DraftStore>,
    config: EngineConfig,
    online: AtomicBool,
    docs: Mutex<HashMap<DocPath, DocEntry>>,
    push_locks: Mutex<HashMap<DocPath, Arc<tokio::sync::Mutex<()>>>>,
    wake: Notify,
}

impl<R: RemoteFiles> SyncEngine<R> {
    pub fn new(remote: R, drafts: Arc<DraftStore>, config: EngineConfig) -> Self {
        Self {
            remote,
            drafts,
            config,
            online: AtomicBool::new(true),
            docs: Mutex::new(HashMap::new()),
            push_locks: Mutex::new(HashMap::new()),
            wake: Notify::new(),
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn drafts(&self) -> &DraftStore {
        &self.drafts
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    // ── Editor surface ─────────────────────────────────────────────

    /// Record the editor's current text. Never blocks on I/O; the draft is
    /// persisted once the local-save timer fires.
    pub fn edit(&self, path: &DocPath, content: impl Into<String>) {
        let now = Instant::now();
        {
            let mut docs = self.docs();
            let entry = docs.entry(path.clone()).or_default();
            entry.pending = Some(content.into());
            entry.schedule.on_edit(now, &self.config.schedule());
            entry.status = Some(DocStatus::Unsaved);
        }
        self.wake.notify_one();
    }

    /// Cancel both timers, persist any pending edit and push right away.
    pub async fn force_save(&self, path: &DocPath) -> SyncOutcome {
        if let Some(entry) = self.docs().get_mut(path) {
            entry.schedule.cancel();
        }
        if let Err(err) = self.persist_pending(path) {
            let err = SyncError::from(err);
            self.set_status(path, err.status());
            return SyncOutcome::failed(err.to_string());
        }
        self.sync_file(path).await
    }

    /// Persist every pending edit and push every dirty draft. Used when the
    /// editor goes away.
    pub async fn flush_all(&self) -> Vec<(DocPath, SyncOutcome)> {
        let pending: Vec<DocPath> = {
            let mut docs = self.docs();
            for entry in docs.values_mut() {
                entry.schedule.cancel();
            }
            docs.iter().filter(|(_, e)| e.pending.is_some()).map(|(p, _)| p.clone()).collect()
        };
        for path in &pending {
            if let Err(err) = self.persist_pending(path) {
                warn!(path = %path, error = %err, "failed to persist draft during flush");
            }
        }
        self.sync_all_dirty().await
    }

    /// Current save state for display.
    pub fn status(&self, path: &DocPath) -> DocStatus {
        let tracked = self.docs().get(path).and_then(|e| e.status.clone());
        let status = match tracked {
            Some(status) => status,
            None => match self.drafts.get(path) {
                Ok(Some(draft)) if draft.dirty => DocStatus::Unsaved,
                Ok(_) => DocStatus::Saved,
                Err(err) => DocStatus::Error(err.to_string()),
            },
        };
        match status {
            DocStatus::Unsaved | DocStatus::Saving if !self.is_online() => DocStatus::Offline,
            other => other,
        }
    }

    // ── Push ───────────────────────────────────────────────────────

    /// Push the draft for `path` if it is dirty. At most one push per path
    /// runs at a time; callers queue behind it.
    pub async fn sync_file(&self, path: &DocPath) -> SyncOutcome {
        let lock = self.push_lock(path);
        let _guard = lock.lock().await;

        match self.push(path).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(path = %path, error = %err, "push failed; draft stays dirty");
                self.set_status(path, err.status());
                SyncOutcome::failed(err.to_string())
            }
        }
    }

    async fn push(&self, path: &DocPath) -> Result<SyncOutcome, SyncError> {
        let Some(draft) = self.drafts.get(path)? else {
            return Ok(SyncOutcome::unchanged(None));
        };
        if !draft.dirty {
            self.set_status(path, DocStatus::Saved);
            return Ok(SyncOutcome::unchanged(Some(&draft)));
        }
        if !self.is_online() {
            return Err(RemoteError::Unreachable("client is offline".into()).into());
        }

        self.set_status(path, DocStatus::Saving);
        let response = self.send(path, &draft).await?;
        let updated = self.drafts.mark_clean(
            path,
            response.last_modified,
            &response.fingerprint,
            &draft.content,
        )?;

        let still_dirty = updated.is_some_and(|d| d.dirty);
        self.set_status(path, if still_dirty { DocStatus::Unsaved } else { DocStatus::Saved });
        info!(path = %path, fingerprint = %response.fingerprint, still_dirty, "draft pushed");
        Ok(SyncOutcome::synced(response))
    }

    async fn send(&self, path: &DocPath, draft: &Draft) -> Result<WriteResponse, RemoteError> {
        let Some((shadow, base_fingerprint)) = draft.shadow() else {
            debug!(path = %path, "no shadow copy; sending full content");
            return self.remote.full_update(path, &draft.content).await;
        };

        let patch = TextPatch::build(shadow, &draft.content);
        match self.remote.patch(path, &patch.to_wire(), base_fingerprint).await {
            Ok(response) => Ok(response),
            Err(err) if err.falls_back_to_overwrite() => {
                info!(path = %path, error = %err, "patch rejected; overwriting with local content");
                self.remote.full_update(path, &draft.content).await
            }
            Err(err) => Err(err),
        }
    }

    /// Push every dirty draft, each independently, at most
    /// `max_parallel_pushes` at a time.
    pub async fn sync_all_dirty(&self) -> Vec<(DocPath, SyncOutcome)> {
        if !self.is_online() {
            debug!("offline; deferring dirty drafts");
            return Vec::new();
        }
        let dirty = match self.drafts.list_dirty() {
            Ok(dirty) => dirty,
            Err(err) => {
                warn!(error = %err, "failed to list dirty drafts");
                return Vec::new();
            }
        };

        stream::iter(dirty.into_iter().map(|draft| draft.path))
            .map(|path| async move {
                let outcome = self.sync_file(&path).await;
                (path, outcome)
            })
            .buffer_unordered(self.config.max_parallel_pushes.max(1))
            .collect()
            .await
    }

    /// Going offline only defers pushes. Coming online pushes every dirty
    /// draft.
    pub async fn set_online(&self, online: bool) -> Vec<(DocPath, SyncOutcome)> {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if was_online != online {
            info!(online, "connectivity changed");
        }
        if online {
            self.sync_all_dirty().await
        } else {
            Vec::new()
        }
    }

    // ── Load ───────────────────────────────────────────────────────

    /// Open a document, reconciling the server copy with the local draft.
    pub async fn load(&self, path: &DocPath) -> Result<LoadedDocument, SyncError> {
        let (server, local) = tokio::join!(self.remote.read(path), async { self.drafts.get(path) });
        let local = local?;
        let server = match server {
            Ok(content) => Some(content),
            Err(RemoteError::NotFound) => None,
            Err(err) if local.is_some() => {
                warn!(path = %path, error = %err, "server read failed; using draft");
                if matches!(err, RemoteError::Unreachable(_)) {
                    self.set_status(path, DocStatus::Offline);
                }
                None
            }
            Err(err) => return Err(err.into()),
        };

        match (server, local) {
            (None, None) => Err(SyncError::NotFound),
            (None, Some(draft)) => Ok(LoadedDocument {
                content: draft.content,
                source: LoadSource::Local,
                notice: Some(OFFLINE_NOTICE),
            }),
            (Some(_), Some(draft)) if draft.dirty => {
                debug!(path = %path, "local draft is newer; scheduling push");
                self.request_push(path);
                Ok(LoadedDocument { content: draft.content, source: LoadSource::Local, notice: None })
            }
            (Some(server), _) => {
                self.drafts.init_shadow(
                    path,
                    &server.content,
                    &server.fingerprint,
                    server.last_modified,
                )?;
                self.set_status(path, DocStatus::Saved);
                Ok(LoadedDocument { content: server.content, source: LoadSource::Server, notice: None })
            }
        }
    }

    // ── File tree ──────────────────────────────────────────────────

    pub async fn delete_document(&self, path: &DocPath) -> Result<(), SyncError> {
        match self.remote.delete(path).await {
            Ok(()) | Err(RemoteError::NotFound) => {}
            Err(err) => return Err(err.into()),
        }
        let removed = self.drafts.remove(path)?;
        self.docs().retain(|key, _| !key.starts_with(path));
        debug!(path = %path, removed, "drafts removed");
        Ok(())
    }

    pub async fn rename_document(&self, old: &DocPath, new: &DocPath) -> Result<(), SyncError> {
        self.remote.rename(old, new).await?;
        self.follow_move(old, new)
    }

    pub async fn move_document(&self, old: &DocPath, new: &DocPath) -> Result<(), SyncError> {
        self.remote.move_to(old, new).await?;
        self.follow_move(old, new)
    }

    fn follow_move(&self, old: &DocPath, new: &DocPath) -> Result<(), SyncError> {
        let moved = self.drafts.move_to(old, new)?;

        let mut docs = self.docs();
        let keys: Vec<DocPath> = docs.keys().filter(|k| k.starts_with(old)).cloned().collect();
        for key in keys {
            let Some(entry) = docs.remove(&key) else { continue };
            let suffix = &key.as_str()[old.as_str().len()..];
            match DocPath::parse(&format!("{}{}", new.as_str(), suffix)) {
                Ok(target) => {
                    docs.insert(target, entry);
                }
                Err(err) => warn!(path = %key, error = %err, "dropping schedule for moved draft"),
            }
        }
        debug!(old = %old, new = %new, moved, "drafts moved");
        Ok(())
    }

    // ── Internals ──────────────────────────────────────────────────

    fn docs(&self) -> MutexGuard<'_, HashMap<DocPath, DocEntry>> {
        self.docs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push_lock(&self, path: &DocPath) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.push_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(path.clone()).or_default())
    }

    fn set_status(&self, path: &DocPath, status: DocStatus) {
        self.docs().entry(path.clone()).or_default().status = Some(status);
    }

    fn request_push(&self, path: &DocPath) {
        {
            let mut docs = self.docs();
            let entry = docs.entry(path.clone()).or_default();
            entry.schedule.push_now(Instant::now());
            entry.status = Some(DocStatus::Unsaved);
        }
        self.wake.notify_one();
    }

    /// Write the pending editor text, if any, to the draft store.
    fn persist_pending(&self, path: &DocPath) -> Result<Option<Draft>, DraftStoreError> {
        let pending = self.docs().get_mut(path).and_then(|e| e.pending.take());
        let Some(content) = pending else {
            return Ok(None);
        };
        match self.drafts.save(path, &content) {
            Ok(draft) => {
                debug!(path = %path, bytes = content.len(), "draft saved");
                Ok(Some(draft))
            }
            Err(err) => {
                if let Some(entry) = self.docs().get_mut(path) {
                    entry.pending.get_or_insert(content);
                }
                Err(err)
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.docs().values().filter_map(|e| e.schedule.deadline()).min()
    }
}

impl<R: RemoteFiles + 'static> SyncEngine<R> {
    /// Drive the timers until `shutdown` resolves, then flush everything.
    pub async fn run<F>(self: Arc<Self>, shutdown: F) -> Vec<(DocPath, SyncOutcome)>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            let deadline = self.next_deadline();
            let sleep = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::select! {
                _ = &mut shutdown => break,
                _ = self.wake.notified() => {}
                _ = sleep => {}
            }
            self.process_due(Instant::now());
        }

        info!("sync engine stopping; flushing drafts");
        self.flush_all().await
    }

    fn process_due(self: &Arc<Self>, now: Instant) {
        let due: Vec<(DocPath, DueAction)> = self
            .docs()
            .iter()
            .filter_map(|(path, e)| e.schedule.due_action(now).map(|a| (path.clone(), a)))
            .collect();

        let schedule = self.config.schedule();
        for (path, action) in due {
            match action {
                DueAction::LocalSave => {
                    if let Err(err) = self.persist_pending(&path) {
                        warn!(path = %path, error = %err, "failed to save draft");
                        let mut docs = self.docs();
                        if let Some(entry) = docs.get_mut(&path) {
                            entry.schedule.cancel();
                            entry.status = Some(DocStatus::Error(err.to_string()));
                        }
                        continue;
                    }
                    if let Some(entry) = self.docs().get_mut(&path) {
                        entry.schedule.on_local_saved(now, &schedule);
                    }
                }
                DueAction::RemotePush => {
                    {
                        let mut docs = self.docs();
                        let Some(entry) = docs.get_mut(&path) else { continue };
                        if !self.is_online() {
                            entry.schedule.cancel();
                            entry.status = Some(DocStatus::Offline);
                            continue;
                        }
                        entry.schedule.begin_push();
                    }
                    let engine = Arc::clone(self);
                    tokio::spawn(async move {
                        let outcome = engine.sync_file(&path).await;
                        engine.finish_push(&path, &outcome);
                    });
                }
            }
        }
    }

    fn finish_push(&self, path: &DocPath, outcome: &SyncOutcome) {
        let still_dirty =
            outcome.success && matches!(self.drafts.get(path), Ok(Some(draft)) if draft.dirty);
        let now = Instant::now();
        let schedule = self.config.schedule();
        if let Some(entry) = self.docs().get_mut(path) {
            if !outcome.success && entry.status == Some(DocStatus::Offline) {
                let delay = entry.schedule.retry_push(now, &schedule);
                debug!(
                    path = %path,
                    retry_in_ms = delay.as_millis() as u64,
                    "server unreachable; push will be retried"
                );
            } else {
                entry.schedule.finish_push(now, still_dirty, &schedule);
            }
        }
        self.wake.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use folio_common::fingerprint::fingerprint_str;
    use folio_common::protocol::http::{ContentResponse, EntryKind};

    use super::*;

    type FileMap = HashMap<String, (String, DateTime<Utc>)>;
    type WriteHook = Box<dyn FnOnce() + Send>;

    /// In-memory server double that records every call.
    #[derive(Default)]
    struct MockRemote {
        files: Mutex<FileMap>,
        calls: Mutex<Vec<&'static str>>,
        unreachable: AtomicBool,
        before_write: Mutex<Option<WriteHook>>,
    }

    impl MockRemote {
        fn with_file(path: &str, content: &str) -> Self {
            let remote = Self::default();
            remote.put(path, content);
            remote
        }

        fn put(&self, path: &str, content: &str) {
            let stamp = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().expect("valid time");
            self.files.lock().expect("files lock").insert(path.into(), (content.into(), stamp));
        }

        fn content(&self, path: &str) -> Option<String> {
            self.files.lock().expect("files lock").get(path).map(|(c, _)| c.clone())
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().expect("calls lock").clone()
        }

        fn record(&self, call: &'static str) -> Result<(), RemoteError> {
            if self.unreachable.load(Ordering::SeqCst) {
                return Err(RemoteError::Unreachable("connection refused".into()));
            }
            self.calls.lock().expect("calls lock").push(call);
            Ok(())
        }

        fn store(&self, path: &DocPath, content: String) -> WriteResponse {
            if let Some(hook) = self.before_write.lock().expect("hook lock").take() {
                hook();
            }
            let now = Utc::now();
            let fingerprint = fingerprint_str(&content);
            self.files.lock().expect("files lock").insert(path.to_string(), (content, now));
            WriteResponse { success: true, last_modified: now, fingerprint }
        }
    }

    impl RemoteFiles for MockRemote {
        async fn read(&self, path: &DocPath) -> Result<ContentResponse, RemoteError> {
            self.record("read")?;
            let files = self.files.lock().expect("files lock");
            let (content, last_modified) = files.get(path.as_str()).ok_or(RemoteError::NotFound)?;
            Ok(ContentResponse {
                content: content.clone(),
                last_modified: *last_modified,
                fingerprint: fingerprint_str(content),
            })
        }

        async fn full_update(
            &self,
            path: &DocPath,
            content: &str,
        ) -> Result<WriteResponse, RemoteError> {
            self.record("full_update")?;
            Ok(self.store(path, content.to_string()))
        }

        async fn patch(
            &self,
            path: &DocPath,
            patch: &str,
            base_fingerprint: &str,
        ) -> Result<WriteResponse, RemoteError> {
            self.record("patch")?;
            let current = self.content(path.as_str()).ok_or(RemoteError::NotFound)?;
            if fingerprint_str(&current) != base_fingerprint {
                return Err(RemoteError::VersionConflict { current_content: Some(current) });
            }
            let applied = TextPatch::from_wire(patch)
                .map_err(|_| RemoteError::PatchApplyFailed { current_content: None })?
                .apply(&current);
            if !applied.is_clean() {
                return Err(RemoteError::PatchApplyFailed { current_content: Some(current) });
            }
            Ok(self.store(path, applied.text))
        }

        async fn create(&self, path: &DocPath, _kind: EntryKind) -> Result<(), RemoteError> {
            self.record("create")?;
            self.put(path.as_str(), "");
            Ok(())
        }

        async fn delete(&self, path: &DocPath) -> Result<(), RemoteError> {
            self.record("delete")?;
            self.files.lock().expect("files lock").remove(path.as_str());
            Ok(())
        }

        async fn rename(&self, old: &DocPath, new: &DocPath) -> Result<(), RemoteError> {
            self.record("rename")?;
            let mut files = self.files.lock().expect("files lock");
            let entry = files.remove(old.as_str()).ok_or(RemoteError::NotFound)?;
            files.insert(new.to_string(), entry);
            Ok(())
        }

        async fn move_to(&self, old: &DocPath, new: &DocPath) -> Result<(), RemoteError> {
            self.rename(old, new).await
        }
    }

    fn doc(path: &str) -> DocPath {
        DocPath::parse(path).expect("test path should be valid")
    }

    fn engine(remote: MockRemote) -> SyncEngine<MockRemote> {
        let drafts = DraftStore::open_in_memory().expect("draft store should open");
        SyncEngine::new(remote, Arc::new(drafts), EngineConfig::default())
    }

    // ── sync_file ──────────────────────────────────────────────────

    #[tokio::test]
    async fn sync_without_draft_is_a_noop() {
        let engine = engine(MockRemote::default());
        let outcome = engine.sync_file(&doc("a.md")).await;

        assert!(outcome.success);
        assert!(engine.remote().calls().is_empty());
    }

    #[tokio::test]
    async fn first_push_without_shadow_is_full_overwrite() {
        let engine = engine(MockRemote::default());
        let path = doc("new.md");
        engine.drafts().save(&path, "fresh").expect("save should succeed");

        let outcome = engine.sync_file(&path).await;

        assert!(outcome.success, "{outcome:?}");
        assert_eq!(outcome.fingerprint.as_deref(), Some(fingerprint_str("fresh").as_str()));
        assert!(outcome.last_modified.is_some());
        assert_eq!(engine.remote().calls(), vec!["full_update"]);
        assert_eq!(engine.remote().content("new.md").as_deref(), Some("fresh"));
        let draft = engine.drafts().get(&path).expect("get").expect("draft exists");
        assert!(!draft.dirty);
        assert_eq!(draft.shadow_content.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn clean_sync_is_idempotent_without_network() {
        let engine = engine(MockRemote::default());
        let path = doc("a.md");
        engine.drafts().save(&path, "x").expect("save should succeed");

        assert!(engine.sync_file(&path).await.success);
        let calls_after_first = engine.remote().calls().len();
        let second = engine.sync_file(&path).await;
        let third = engine.sync_file(&path).await;

        assert!(second.success && third.success);
        assert_eq!(second.fingerprint.as_deref(), Some(fingerprint_str("x").as_str()));
        assert_eq!(engine.remote().calls().len(), calls_after_first);
        assert_eq!(engine.status(&path), DocStatus::Saved);
    }

    #[tokio::test]
    async fn edit_against_current_base_is_sent_as_patch() {
        let engine = engine(MockRemote::with_file("a.md", "line one\nline two\n"));
        let path = doc("a.md");
        engine.load(&path).await.expect("load should succeed");
        engine.drafts().save(&path, "line one\nline 2\n").expect("save should succeed");

        let outcome = engine.sync_file(&path).await;

        assert!(outcome.success, "{outcome:?}");
        assert_eq!(engine.remote().calls(), vec!["read", "patch"]);
        assert_eq!(engine.remote().content("a.md").as_deref(), Some("line one\nline 2\n"));
        let draft = engine.drafts().get(&path).expect("get").expect("draft exists");
        assert!(!draft.dirty);
        assert_eq!(draft.shadow_content.as_deref(), Some("line one\nline 2\n"));
    }

    #[tokio::test]
    async fn stale_base_falls_back_to_full_overwrite() {
        let engine = engine(MockRemote::with_file("a.md", "A"));
        let path = doc("a.md");
        engine.load(&path).await.expect("load should succeed");
        engine.remote().put("a.md", "A2 from elsewhere");
        engine.drafts().save(&path, "B").expect("save should succeed");

        let outcome = engine.sync_file(&path).await;

        assert!(outcome.success, "{outcome:?}");
        assert_eq!(engine.remote().calls(), vec!["read", "patch", "full_update"]);
        assert_eq!(engine.remote().content("a.md").as_deref(), Some("B"));
        assert!(!engine.drafts().get(&path).expect("get").expect("draft exists").dirty);
    }

    #[tokio::test]
    async fn unreachable_server_keeps_draft_dirty() {
        let remote = MockRemote::default();
        remote.unreachable.store(true, Ordering::SeqCst);
        let engine = engine(remote);
        let path = doc("a.md");
        engine.drafts().save(&path, "offline edit").expect("save should succeed");

        let outcome = engine.sync_file(&path).await;

        assert!(!outcome.success);
        assert!(outcome.error.is_some());
        assert!(outcome.fingerprint.is_none());
        assert!(engine.drafts().get(&path).expect("get").expect("draft exists").dirty);
        assert_eq!(engine.status(&path), DocStatus::Offline);
    }

    #[tokio::test]
    async fn edit_during_push_keeps_draft_dirty() {
        let drafts = Arc::new(DraftStore::open_in_memory().expect("draft store should open"));
        let remote = MockRemote::default();
        let path = doc("a.md");
        let hook_drafts = Arc::clone(&drafts);
        let hook_path = path.clone();
        *remote.before_write.lock().expect("hook lock") = Some(Box::new(move || {
            hook_drafts.save(&hook_path, "v1 plus more").expect("in-flight save should succeed");
        }));
        let engine = SyncEngine::new(remote, Arc::clone(&drafts), EngineConfig::default());
        drafts.save(&path, "v1").expect("save should succeed");

        let outcome = engine.sync_file(&path).await;

        assert!(outcome.success);
        let draft = drafts.get(&path).expect("get").expect("draft exists");
        assert!(draft.dirty);
        assert_eq!(draft.content, "v1 plus more");
        assert_eq!(draft.shadow_content.as_deref(), Some("v1"));
        assert_eq!(engine.status(&path), DocStatus::Unsaved);

        let second = engine.sync_file(&path).await;
        assert!(second.success);
        assert_eq!(engine.remote().calls(), vec!["full_update", "patch"]);
        assert_eq!(engine.remote().content("a.md").as_deref(), Some("v1 plus more"));
    }

    // ── load ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn load_missing_everywhere_is_not_found() {
        let engine = engine(MockRemote::default());
        let err = engine.load(&doc("ghost.md")).await.expect_err("load should fail");
        assert!(matches!(err, SyncError::NotFound));
    }

    #[tokio::test]
    async fn load_only_local_uses_offline_copy() {
        let engine = engine(MockRemote::default());
        let path = doc("a.md");
        engine.drafts().save(&path, "draft only").expect("save should succeed");

        let loaded = engine.load(&path).await.expect("load should succeed");
        assert_eq!(loaded.content, "draft only");
        assert_eq!(loaded.source, LoadSource::Local);
        assert_eq!(loaded.notice, Some(OFFLINE_NOTICE));
    }

    #[tokio::test]
    async fn load_only_server_seeds_shadow() {
        let engine = engine(MockRemote::with_file("a.md", "server text"));
        let path = doc("a.md");

        let loaded = engine.load(&path).await.expect("load should succeed");
        assert_eq!(loaded.content, "server text");
        assert_eq!(loaded.source, LoadSource::Server);

        let draft = engine.drafts().get(&path).expect("get").expect("draft exists");
        assert!(!draft.dirty);
        assert_eq!(draft.shadow(), Some(("server text", fingerprint_str("server text").as_str())));
    }

    #[tokio::test]
    async fn load_clean_draft_prefers_server() {
        let engine = engine(MockRemote::with_file("a.md", "new server"));
        let path = doc("a.md");
        engine
            .drafts()
            .init_shadow(&path, "old", &fingerprint_str("old"), Utc::now())
            .expect("seed should succeed");

        let loaded = engine.load(&path).await.expect("load should succeed");
        assert_eq!(loaded.content, "new server");
        let draft = engine.drafts().get(&path).expect("get").expect("draft exists");
        assert_eq!(draft.content, "new server");
    }

    #[tokio::test]
    async fn load_dirty_draft_wins_and_schedules_push() {
        let engine = engine(MockRemote::with_file("a.md", "server"));
        let path = doc("a.md");
        engine.drafts().save(&path, "local edits").expect("save should succeed");

        let loaded = engine.load(&path).await.expect("load should succeed");
        assert_eq!(loaded.content, "local edits");
        assert_eq!(loaded.source, LoadSource::Local);
        assert_eq!(loaded.notice, None);
        assert!(engine.next_deadline().is_some_and(|at| at <= Instant::now()));
        assert_eq!(engine.remote().content("a.md").as_deref(), Some("server"));
    }

    #[tokio::test]
    async fn load_offline_with_draft_falls_back_to_draft() {
        let remote = MockRemote::with_file("a.md", "server");
        remote.unreachable.store(true, Ordering::SeqCst);
        let engine = engine(remote);
        let path = doc("a.md");
        engine.drafts().save(&path, "cached").expect("save should succeed");

        let loaded = engine.load(&path).await.expect("load should succeed");
        assert_eq!(loaded.content, "cached");
        assert_eq!(loaded.notice, Some(OFFLINE_NOTICE));
    }

    #[tokio::test]
    async fn load_offline_without_draft_surfaces_error() {
        let remote = MockRemote::default();
        remote.unreachable.store(true, Ordering::SeqCst);
        let engine = engine(remote);

        let err = engine.load(&doc("a.md")).await.expect_err("load should fail");
        assert!(matches!(err, SyncError::Remote(RemoteError::Unreachable(_))));
    }

    // ── Connectivity ───────────────────────────────────────────────

    #[tokio::test]
    async fn offline_defers_and_reconnect_pushes_everything() {
        let engine = engine(MockRemote::default());
        engine.set_online(false).await;
        for name in ["a.md", "b.md", "c.md"] {
            engine.drafts().save(&doc(name), name).expect("save should succeed");
        }

        let deferred = engine.sync_file(&doc("a.md")).await;
        assert!(!deferred.success);
        assert!(engine.remote().calls().is_empty());
        assert_eq!(engine.status(&doc("a.md")), DocStatus::Offline);

        let mut outcomes = engine.set_online(true).await;
        outcomes.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|(_, o)| o.success));
        assert_eq!(engine.remote().calls().len(), 3);
        assert!(engine.drafts().list_dirty().expect("list_dirty").is_empty());
    }

    #[tokio::test]
    async fn sync_all_dirty_failure_is_per_document() {
        let engine = engine(MockRemote::default());
        engine.drafts().save(&doc("good.md"), "fine").expect("save should succeed");
        engine.drafts().save(&doc("other.md"), "also fine").expect("save should succeed");

        let outcomes = engine.sync_all_dirty().await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|(_, o)| o.success));
    }

    // ── Editor surface ─────────────────────────────────────────────

    #[tokio::test]
    async fn force_save_persists_and_pushes_immediately() {
        let engine = engine(MockRemote::default());
        let path = doc("a.md");
        engine.edit(&path, "typed");
        assert!(engine.drafts().get(&path).expect("get").is_none());

        let outcome = engine.force_save(&path).await;

        assert!(outcome.success);
        assert_eq!(engine.remote().content("a.md").as_deref(), Some("typed"));
        assert_eq!(engine.next_deadline(), None);
        assert_eq!(engine.status(&path), DocStatus::Saved);
    }

    #[tokio::test]
    async fn flush_all_persists_and_pushes_every_document() {
        let engine = engine(MockRemote::default());
        engine.edit(&doc("a.md"), "one");
        engine.edit(&doc("b.md"), "two");

        let outcomes = engine.flush_all().await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(engine.remote().content("a.md").as_deref(), Some("one"));
        assert_eq!(engine.remote().content("b.md").as_deref(), Some("two"));
        assert_eq!(engine.next_deadline(), None);
    }

    #[tokio::test]
    async fn flush_while_offline_still_persists_drafts() {
        let engine = engine(MockRemote::default());
        engine.set_online(false).await;
        engine.edit(&doc("a.md"), "kept locally");

        let outcomes = engine.flush_all().await;

        assert!(outcomes.is_empty());
        let draft = engine.drafts().get(&doc("a.md")).expect("get").expect("draft exists");
        assert!(draft.dirty);
        assert_eq!(draft.content, "kept locally");
    }

    #[tokio::test(start_paused = true)]
    async fn driver_saves_then_pushes_on_timers() {
        let engine = Arc::new(engine(MockRemote::default()));
        let path = doc("a.md");
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let driver = tokio::spawn(Arc::clone(&engine).run(async move {
            let _ = stop_rx.await;
        }));

        engine.edit(&path, "hello");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(engine.drafts().get(&path).expect("get").is_none());

        tokio::time::sleep(Duration::from_millis(500)).await;
        let draft = engine.drafts().get(&path).expect("get").expect("draft saved");
        assert!(draft.dirty);
        assert!(engine.remote().calls().is_empty());

        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert_eq!(engine.remote().calls(), vec!["full_update"]);
        assert!(!engine.drafts().get(&path).expect("get").expect("draft exists").dirty);

        stop_tx.send(()).expect("driver should be listening");
        let flushed = driver.await.expect("driver should exit cleanly");
        assert!(flushed.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn driver_flushes_pending_edit_on_shutdown() {
        let engine = Arc::new(engine(MockRemote::default()));
        let path = doc("a.md");
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let driver = tokio::spawn(Arc::clone(&engine).run(async move {
            let _ = stop_rx.await;
        }));

        engine.edit(&path, "unsaved at exit");
        stop_tx.send(()).expect("driver should be listening");
        let flushed = driver.await.expect("driver should exit cleanly");

        assert_eq!(flushed.len(), 1);
        assert!(flushed[0].1.success);
        assert_eq!(engine.remote().content("a.md").as_deref(), Some("unsaved at exit"));
    }

    #[tokio::test(start_paused = true)]
    async fn driver_retries_push_after_outage_ends() {
        let remote = MockRemote::default();
        remote.unreachable.store(true, Ordering::SeqCst);
        let engine = Arc::new(engine(remote));
        let path = doc("a.md");
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let driver = tokio::spawn(Arc::clone(&engine).run(async move {
            let _ = stop_rx.await;
        }));

        engine.edit(&path, "hello");
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(engine.status(&path), DocStatus::Offline);
        assert!(engine.drafts().get(&path).expect("get").expect("draft saved").dirty);
        assert!(engine.next_deadline().is_some(), "a retry should be scheduled");

        engine.remote().unreachable.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3_600)).await;

        assert_eq!(engine.remote().calls(), vec!["full_update"]);
        assert_eq!(engine.remote().content("a.md").as_deref(), Some("hello"));
        assert!(!engine.drafts().get(&path).expect("get").expect("draft exists").dirty);
        assert_eq!(engine.status(&path), DocStatus::Saved);
        assert_eq!(engine.next_deadline(), None);

        stop_tx.send(()).expect("driver should be listening");
        driver.await.expect("driver should exit cleanly");
    }

    // ── File tree ──────────────────────────────────────────────────

    #[tokio::test]
    async fn rename_moves_draft_with_document() {
        let engine = engine(MockRemote::with_file("old.md", "text"));
        let old = doc("old.md");
        let new = doc("new.md");
        engine.load(&old).await.expect("load should succeed");

        engine.rename_document(&old, &new).await.expect("rename should succeed");

        assert!(engine.drafts().get(&old).expect("get").is_none());
        let moved = engine.drafts().get(&new).expect("get").expect("draft moved");
        assert_eq!(moved.content, "text");
        assert_eq!(engine.remote().content("new.md").as_deref(), Some("text"));
    }

    #[tokio::test]
    async fn failed_move_leaves_draft_in_place() {
        let engine = engine(MockRemote::default());
        let old = doc("missing.md");
        engine.drafts().save(&old, "local").expect("save should succeed");

        let err = engine
            .move_document(&old, &doc("dest/missing.md"))
            .await
            .expect_err("move of unknown remote file should fail");

        assert!(matches!(err, SyncError::Remote(RemoteError::NotFound)));
        assert!(engine.drafts().get(&old).expect("get").is_some());
    }

    #[tokio::test]
    async fn delete_removes_draft_even_when_server_copy_is_gone() {
        let engine = engine(MockRemote::default());
        let path = doc("a.md");
        engine.drafts().save(&path, "bye").expect("save should succeed");

        engine.delete_document(&path).await.expect("delete should succeed");

        assert!(engine.drafts().get(&path).expect("get").is_none());
        assert_eq!(engine.remote().calls(), vec!["delete"]);
    }
}

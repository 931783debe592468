// Drafts written before a restart are pushed by a fresh engine as patches
// against the shadow copy that was persisted with them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use folio_client::{DraftStore, EngineConfig, RemoteError, RemoteFiles, SyncEngine};
use folio_common::diff::patch::TextPatch;
use folio_common::fingerprint::fingerprint_str;
use folio_common::path::DocPath;
use folio_common::protocol::http::{ContentResponse, EntryKind, WriteResponse};

#[derive(Clone, Default)]
struct ServerDouble {
    files: Arc<Mutex<HashMap<String, String>>>,
    patches: Arc<Mutex<usize>>,
    overwrites: Arc<Mutex<usize>>,
}

impl ServerDouble {
    fn with_file(path: &str, content: &str) -> Self {
        let server = Self::default();
        server.files.lock().expect("lock").insert(path.into(), content.into());
        server
    }

    fn content(&self, path: &str) -> Option<String> {
        self.files.lock().expect("lock").get(path).cloned()
    }

    fn store(&self, path: &DocPath, content: String) -> WriteResponse {
        let fingerprint = fingerprint_str(&content);
        self.files.lock().expect("lock").insert(path.to_string(), content);
        WriteResponse { success: true, last_modified: Utc::now(), fingerprint }
    }
}

impl RemoteFiles for ServerDouble {
    async fn read(&self, path: &DocPath) -> Result<ContentResponse, RemoteError> {
        let content = self.content(path.as_str()).ok_or(RemoteError::NotFound)?;
        Ok(ContentResponse {
            fingerprint: fingerprint_str(&content),
            content,
            last_modified: Utc::now(),
        })
    }

    async fn full_update(&self, path: &DocPath, content: &str) -> Result<WriteResponse, RemoteError> {
        *self.overwrites.lock().expect("lock") += 1;
        Ok(self.store(path, content.to_string()))
    }

    async fn patch(
        &self,
        path: &DocPath,
        patch: &str,
        base_fingerprint: &str,
    ) -> Result<WriteResponse, RemoteError> {
        let current = self.content(path.as_str()).ok_or(RemoteError::NotFound)?;
        if fingerprint_str(&current) != base_fingerprint {
            return Err(RemoteError::VersionConflict { current_content: Some(current) });
        }
        let patch = TextPatch::from_wire(patch)
            .map_err(|_| RemoteError::PatchApplyFailed { current_content: None })?;
        let applied = patch.apply(&current);
        if !applied.is_clean() {
            return Err(RemoteError::PatchApplyFailed { current_content: Some(current) });
        }
        *self.patches.lock().expect("lock") += 1;
        Ok(self.store(path, applied.text))
    }

    async fn create(&self, _path: &DocPath, _kind: EntryKind) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn delete(&self, _path: &DocPath) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn rename(&self, _old: &DocPath, _new: &DocPath) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn move_to(&self, _old: &DocPath, _new: &DocPath) -> Result<(), RemoteError> {
        Ok(())
    }
}

fn path(raw: &str) -> DocPath {
    DocPath::parse(raw).expect("valid path")
}

#[tokio::test]
async fn dirty_draft_survives_restart_and_is_pushed_as_patch() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let db = dir.path().join("state").join("drafts.db");
    let doc = path("notes/plan.md");
    let server = ServerDouble::with_file("notes/plan.md", "line one\nline two\n");

    {
        let engine = SyncEngine::new(
            server.clone(),
            Arc::new(DraftStore::open(&db).expect("drafts should open")),
            EngineConfig::default(),
        );
        engine.load(&doc).await.expect("document should load");
        engine.set_online(false).await;
        engine.edit(&doc, "line one\nline two, edited offline\n");
        let outcome = engine.force_save(&doc).await;
        assert!(!outcome.success, "offline push should not succeed");
    }

    let store = Arc::new(DraftStore::open(&db).expect("drafts should reopen"));
    let dirty = store.list_dirty().expect("dirty drafts should list");
    assert_eq!(dirty.len(), 1);
    assert_eq!(dirty[0].shadow_content.as_deref(), Some("line one\nline two\n"));

    let engine = SyncEngine::new(server.clone(), store, EngineConfig::default());
    let outcomes = engine.sync_all_dirty().await;

    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].1.success, "push should succeed: {:?}", outcomes[0].1.error);
    assert_eq!(
        server.content("notes/plan.md").as_deref(),
        Some("line one\nline two, edited offline\n")
    );
    assert_eq!(*server.patches.lock().expect("lock"), 1);
    assert_eq!(*server.overwrites.lock().expect("lock"), 0);
    assert!(engine.drafts().list_dirty().expect("dirty drafts should list").is_empty());
}

#[tokio::test]
async fn stale_shadow_after_restart_falls_back_to_overwrite() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let db = dir.path().join("drafts.db");
    let doc = path("a.md");
    let server = ServerDouble::with_file("a.md", "A1");

    {
        let store = DraftStore::open(&db).expect("drafts should open");
        store
            .init_shadow(&doc, "A1", &fingerprint_str("A1"), Utc::now())
            .expect("shadow should seed");
        store.save(&doc, "A1 local").expect("draft should save");
    }
    server.files.lock().expect("lock").insert("a.md".into(), "A2 from elsewhere".into());

    let engine = SyncEngine::new(
        server.clone(),
        Arc::new(DraftStore::open(&db).expect("drafts should reopen")),
        EngineConfig::default(),
    );
    let outcome = engine.sync_file(&doc).await;

    assert!(outcome.success);
    assert_eq!(server.content("a.md").as_deref(), Some("A1 local"));
    assert_eq!(*server.overwrites.lock().expect("lock"), 1);
    assert_eq!(outcome.fingerprint.as_deref(), Some(fingerprint_str("A1 local").as_str()));
}

// Draft cache: the client's durable copy of every document it has touched.
//
// Each row holds the latest local text plus the shadow copy, which is the
// text the server is believed to hold. Patches are always built from the
// shadow to the draft.

use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use folio_common::fingerprint::{self, Fingerprint};
use folio_common::path::DocPath;
use rusqlite::{params, Connection, OptionalExtension, Row};

const MIGRATION_V1_SQL: &str = r#"
CREATE TABLE drafts (
    path                TEXT PRIMARY KEY,
    content             TEXT NOT NULL,
    updated_at_ms       INTEGER NOT NULL,
    dirty               INTEGER NOT NULL,
    shadow_content      TEXT NULL,
    shadow_fingerprint  TEXT NULL,
    CHECK ((shadow_content IS NULL) = (shadow_fingerprint IS NULL))
);

CREATE INDEX drafts_dirty_idx
    ON drafts (dirty);
"#;

const MIGRATION_V2_SQL: &str = r#"
ALTER TABLE drafts ADD COLUMN server_modified_ms INTEGER NULL;
"#;

const MIGRATIONS: &[(i64, &str)] = &[(1, MIGRATION_V1_SQL), (2, MIGRATION_V2_SQL)];

const DRAFT_COLUMNS: &str = "path, content, updated_at_ms, dirty, shadow_content, \
                             shadow_fingerprint, server_modified_ms";

#[derive(Debug, thiserror::Error)]
pub enum DraftStoreError {
    #[error("failed to prepare draft database directory `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("draft database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to apply draft migration v{version}: {source}")]
    Migration {
        version: i64,
        #[source]
        source: rusqlite::Error,
    },
    #[error("shadow fingerprint does not match shadow content for `{0}`")]
    ShadowMismatch(String),
    #[error("stored draft `{path}` is corrupt: {reason}")]
    Corrupt { path: String, reason: String },
    #[error("draft store lock poisoned")]
    Poisoned,
}

/// Locally cached document state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub path: DocPath,
    pub content: String,
    /// Advanced on every content change, strictly increasing per path.
    pub timestamp: DateTime<Utc>,
    /// True when `content` has changes the server has not acknowledged.
    pub dirty: bool,
    pub shadow_content: Option<String>,
    pub shadow_fingerprint: Option<Fingerprint>,
    pub server_last_modified: Option<DateTime<Utc>>,
}

impl Draft {
    /// The shadow text and its fingerprint, when both are known.
    pub fn shadow(&self) -> Option<(&str, &str)> {
        match (&self.shadow_content, &self.shadow_fingerprint) {
            (Some(content), Some(fp)) => Some((content.as_str(), fp.as_str())),
            _ => None,
        }
    }
}

/// SQLite-backed draft store. All mutations are durable on return.
#[derive(Debug)]
pub struct DraftStore {
    conn: Mutex<Connection>,
}

impl DraftStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DraftStoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| DraftStoreError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, DraftStoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self, DraftStoreError> {
        ensure_migration_table(&conn)?;
        apply_pending_migrations(&mut conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn schema_version(&self) -> Result<i64, DraftStoreError> {
        current_schema_version(&*self.lock()?)
    }

    pub fn get(&self, path: &DocPath) -> Result<Option<Draft>, DraftStoreError> {
        let conn = self.lock()?;
        select_one(&conn, path)
    }

    /// Record new local content. The draft becomes dirty; the shadow is kept.
    pub fn save(&self, path: &DocPath, content: &str) -> Result<Draft, DraftStoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO drafts (path, content, updated_at_ms, dirty)
             VALUES (?1, ?2, ?3, 1)
             ON CONFLICT(path) DO UPDATE SET
                content = excluded.content,
                updated_at_ms = MAX(excluded.updated_at_ms, drafts.updated_at_ms + 1),
                dirty = 1",
            params![path.as_str(), content, now_ms()],
        )?;
        require_row(&conn, path)
    }

    /// Seed a clean draft from freshly loaded server content.
    pub fn init_shadow(
        &self,
        path: &DocPath,
        content: &str,
        fingerprint: &str,
        server_last_modified: DateTime<Utc>,
    ) -> Result<Draft, DraftStoreError> {
        check_shadow(path, content, fingerprint)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO drafts (path, content, updated_at_ms, dirty, shadow_content,
                                 shadow_fingerprint, server_modified_ms)
             VALUES (?1, ?2, ?3, 0, ?2, ?4, ?5)
             ON CONFLICT(path) DO UPDATE SET
                content = excluded.content,
                updated_at_ms = MAX(excluded.updated_at_ms, drafts.updated_at_ms + 1),
                dirty = 0,
                shadow_content = excluded.shadow_content,
                shadow_fingerprint = excluded.shadow_fingerprint,
                server_modified_ms = excluded.server_modified_ms",
            params![
                path.as_str(),
                content,
                now_ms(),
                fingerprint,
                server_last_modified.timestamp_millis()
            ],
        )?;
        require_row(&conn, path)
    }

    /// Record that the server acknowledged `sent_content`.
    ///
    /// The shadow always advances to `sent_content`. The draft is only
    /// cleared when its content is still exactly what was sent; an edit that
    /// landed while the request was in flight keeps it dirty. Returns the
    /// updated draft, or `None` if it was removed in the meantime.
    pub fn mark_clean(
        &self,
        path: &DocPath,
        server_last_modified: DateTime<Utc>,
        fingerprint: &str,
        sent_content: &str,
    ) -> Result<Option<Draft>, DraftStoreError> {
        check_shadow(path, sent_content, fingerprint)?;
        let conn = self.lock()?;
        conn.execute(
            "UPDATE drafts SET
                dirty = CASE WHEN content = ?2 THEN 0 ELSE 1 END,
                shadow_content = ?2,
                shadow_fingerprint = ?3,
                server_modified_ms = ?4
             WHERE path = ?1",
            params![path.as_str(), sent_content, fingerprint, server_last_modified.timestamp_millis()],
        )?;
        select_one(&conn, path)
    }

    /// Remove the draft for `path` and for anything beneath it.
    pub fn remove(&self, path: &DocPath) -> Result<usize, DraftStoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut removed = 0;
        for key in keys_under(&tx, path)? {
            removed += tx.execute("DELETE FROM drafts WHERE path = ?1", [key.as_str()])?;
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Re-key the draft for `old` (and anything beneath it) under `new`,
    /// keeping every field. Existing drafts at the destination are replaced.
    pub fn move_to(&self, old: &DocPath, new: &DocPath) -> Result<usize, DraftStoreError> {
        if old == new {
            return Ok(0);
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut moved = 0;
        for key in keys_under(&tx, old)? {
            let suffix = &key.as_str()[old.as_str().len()..];
            let target = format!("{}{}", new.as_str(), suffix);
            tx.execute("DELETE FROM drafts WHERE path = ?1", [target.as_str()])?;
            moved += tx.execute(
                "UPDATE drafts SET path = ?2 WHERE path = ?1",
                params![key.as_str(), target],
            )?;
        }
        tx.commit()?;
        Ok(moved)
    }

    pub fn list(&self) -> Result<Vec<Draft>, DraftStoreError> {
        let conn = self.lock()?;
        select_many(&conn, &format!("SELECT {DRAFT_COLUMNS} FROM drafts ORDER BY path"))
    }

    pub fn list_dirty(&self) -> Result<Vec<Draft>, DraftStoreError> {
        let conn = self.lock()?;
        select_many(
            &conn,
            &format!("SELECT {DRAFT_COLUMNS} FROM drafts WHERE dirty = 1 ORDER BY path"),
        )
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DraftStoreError> {
        self.conn.lock().map_err(|_| DraftStoreError::Poisoned)
    }
}

fn check_shadow(path: &DocPath, content: &str, fp: &str) -> Result<(), DraftStoreError> {
    if fingerprint::matches(content, fp) {
        Ok(())
    } else {
        Err(DraftStoreError::ShadowMismatch(path.to_string()))
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn require_row(conn: &Connection, path: &DocPath) -> Result<Draft, DraftStoreError> {
    select_one(conn, path)?.ok_or_else(|| DraftStoreError::Corrupt {
        path: path.to_string(),
        reason: "row missing after write".into(),
    })
}

fn select_one(conn: &Connection, path: &DocPath) -> Result<Option<Draft>, DraftStoreError> {
    let raw = conn
        .query_row(
            &format!("SELECT {DRAFT_COLUMNS} FROM drafts WHERE path = ?1"),
            [path.as_str()],
            RawDraft::from_row,
        )
        .optional()?;
    raw.map(RawDraft::into_draft).transpose()
}

fn select_many(conn: &Connection, sql: &str) -> Result<Vec<Draft>, DraftStoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], RawDraft::from_row)?;
    let mut drafts = Vec::new();
    for raw in rows {
        drafts.push(raw?.into_draft()?);
    }
    Ok(drafts)
}

/// Stored keys equal to `root` or nested beneath it.
fn keys_under(conn: &Connection, root: &DocPath) -> Result<Vec<DocPath>, DraftStoreError> {
    let mut stmt = conn.prepare("SELECT path FROM drafts")?;
    let keys = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut matched = Vec::new();
    for key in keys {
        let key = key?;
        if let Ok(path) = DocPath::parse(&key) {
            if path.starts_with(root) {
                matched.push(path);
            }
        }
    }
    Ok(matched)
}

struct RawDraft {
    path: String,
    content: String,
    updated_at_ms: i64,
    dirty: bool,
    shadow_content: Option<String>,
    shadow_fingerprint: Option<String>,
    server_modified_ms: Option<i64>,
}

impl RawDraft {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            path: row.get(0)?,
            content: row.get(1)?,
            updated_at_ms: row.get(2)?,
            dirty: row.get(3)?,
            shadow_content: row.get(4)?,
            shadow_fingerprint: row.get(5)?,
            server_modified_ms: row.get(6)?,
        })
    }

    fn into_draft(self) -> Result<Draft, DraftStoreError> {
        let corrupt = |reason: &str| DraftStoreError::Corrupt {
            path: self.path.clone(),
            reason: reason.to_string(),
        };
        let path = DocPath::parse(&self.path).map_err(|e| corrupt(&e.to_string()))?;
        let timestamp = DateTime::from_timestamp_millis(self.updated_at_ms)
            .ok_or_else(|| corrupt("timestamp out of range"))?;
        let server_last_modified = match self.server_modified_ms {
            Some(ms) => Some(
                DateTime::from_timestamp_millis(ms)
                    .ok_or_else(|| corrupt("server timestamp out of range"))?,
            ),
            None => None,
        };
        Ok(Draft {
            path,
            content: self.content,
            timestamp,
            dirty: self.dirty,
            shadow_content: self.shadow_content,
            shadow_fingerprint: self.shadow_fingerprint,
            server_last_modified,
        })
    }
}

fn ensure_migration_table(conn: &Connection) -> Result<(), DraftStoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY,
            applied_at  TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

fn current_schema_version(conn: &Connection) -> Result<i64, DraftStoreError> {
    Ok(conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| {
        row.get(0)
    })?)
}

fn apply_pending_migrations(conn: &mut Connection) -> Result<(), DraftStoreError> {
    let current = current_schema_version(conn)?;

    for (version, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        let migrate = |conn: &mut Connection| -> rusqlite::Result<()> {
            let tx = conn.transaction()?;
            tx.execute_batch(sql)?;
            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, datetime('now'))",
                params![version],
            )?;
            tx.commit()
        };
        migrate(conn)
            .map_err(|source| DraftStoreError::Migration { version: *version, source })?;
        tracing::debug!(version, "applied draft store migration");
    }

    Ok(())
}

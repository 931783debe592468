// Recovery area shared by soft deletes and collector quarantine.
//
// Every relocation batch gets a top-level directory named
// `<unix_millis>_<tag>`; the original relative path is preserved beneath it.
// Reaping compares the millisecond prefix (or the entry's mtime when the
// prefix is unreadable) against the retention window.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct Trash {
    root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrashRecord {
    pub path: PathBuf,
    pub name: String,
    pub trashed_at: DateTime<Utc>,
}

impl Trash {
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory name for a batch relocated at `now`.
    pub fn batch_name(tag: &str, now: DateTime<Utc>) -> String {
        format!("{}_{tag}", now.timestamp_millis())
    }

    /// Moves `source` to `<root>/<batch>/<relative>` and returns the new location.
    pub fn relocate(&self, source: &Path, batch: &str, relative: &str) -> io::Result<PathBuf> {
        let mut destination = self.root.join(batch);
        destination.extend(relative.split('/').filter(|part| !part.is_empty()));
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(source, &destination)?;
        debug!(source = %source.display(), destination = %destination.display(), "relocated to trash");
        Ok(destination)
    }

    /// All top-level batches currently in the recovery area.
    pub fn records(&self) -> io::Result<Vec<TrashRecord>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let trashed_at = match parse_batch_time(&name) {
                Some(at) => at,
                None => match entry.metadata().and_then(|m| m.modified()) {
                    Ok(modified) => DateTime::<Utc>::from(modified),
                    Err(e) => {
                        warn!(entry = %name, error = %e, "cannot date trash entry, skipping");
                        continue;
                    }
                },
            };
            records.push(TrashRecord { path: entry.path(), name, trashed_at });
        }
        records.sort_by(|a, b| a.trashed_at.cmp(&b.trashed_at).then(a.name.cmp(&b.name)));
        Ok(records)
    }

    /// Permanently removes every batch older than `retention` at `now`.
    pub fn reap(&self, now: DateTime<Utc>, retention: chrono::Duration) -> io::Result<usize> {
        let mut reaped = 0;
        for record in self.records()? {
            if now.signed_duration_since(record.trashed_at) <= retention {
                continue;
            }
            let removed = if record.path.is_dir() {
                fs::remove_dir_all(&record.path)
            } else {
                fs::remove_file(&record.path)
            };
            match removed {
                Ok(()) => {
                    debug!(entry = %record.name, "reaped trash entry");
                    reaped += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(entry = %record.name, error = %e, "failed to reap trash entry"),
            }
        }
        Ok(reaped)
    }
}

fn parse_batch_time(name: &str) -> Option<DateTime<Utc>> {
    let (millis, _) = name.split_once('_')?;
    let millis: i64 = millis.parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

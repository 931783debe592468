// Lazy depth-first directory walk.
//
// Entries are produced one at a time from a stack of open directory handles,
// so callers can stop early. Each walk starts from scratch. Symlinks and
// server-owned `.folio*` entries are never yielded or descended into.

use std::fs::{self, Metadata, ReadDir};
use std::io;
use std::path::{Path, PathBuf};

use folio_common::path::normalize::RESERVED_PREFIX;
use folio_common::protocol::http::EntryKind;

#[derive(Debug, Clone)]
pub struct WalkEntry {
    pub path: PathBuf,
    /// `/`-separated path relative to the walk root.
    pub relative: String,
    pub kind: EntryKind,
    pub metadata: Metadata,
}

#[derive(Debug)]
pub struct TreeWalker {
    root: PathBuf,
    stack: Vec<ReadDir>,
    excluded: Vec<PathBuf>,
    started: bool,
}

impl TreeWalker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), stack: Vec::new(), excluded: Vec::new(), started: false }
    }

    /// Skip `path` and everything below it.
    pub fn exclude(mut self, path: impl Into<PathBuf>) -> Self {
        self.excluded.push(path.into());
        self
    }

    /// Only regular files.
    pub fn files(self) -> impl Iterator<Item = io::Result<WalkEntry>> {
        self.filter(|entry| !matches!(entry, Ok(e) if e.kind == EntryKind::Directory))
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .map(|rel| {
                rel.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_default()
    }
}

impl Iterator for TreeWalker {
    type Item = io::Result<WalkEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started {
            self.started = true;
            match fs::read_dir(&self.root) {
                Ok(dir) => self.stack.push(dir),
                Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
                Err(e) => return Some(Err(e)),
            }
        }

        loop {
            let dir = self.stack.last_mut()?;
            let Some(next) = dir.next() else {
                self.stack.pop();
                continue;
            };

            let entry = match next {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e)),
            };
            if entry.file_name().to_string_lossy().starts_with(RESERVED_PREFIX) {
                continue;
            }
            let path = entry.path();
            if self.excluded.iter().any(|ex| path.starts_with(ex)) {
                continue;
            }

            let metadata = match fs::symlink_metadata(&path) {
                Ok(metadata) => metadata,
                // Removed between listing and stat.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Some(Err(e)),
            };

            let kind = if metadata.is_dir() {
                match fs::read_dir(&path) {
                    Ok(child) => self.stack.push(child),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                    Err(e) => return Some(Err(e)),
                }
                EntryKind::Directory
            } else if metadata.is_file() {
                EntryKind::File
            } else {
                continue;
            };

            let relative = self.relative(&path);
            return Some(Ok(WalkEntry { path, relative, kind, metadata }));
        }
    }
}

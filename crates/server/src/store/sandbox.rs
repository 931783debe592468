// Sandboxed path resolution: every request path must land inside the root.
//
// Lexical checks come from `DocPath` (no `..`, no reserved names). This
// module adds the filesystem half: the deepest existing ancestor of the
// target is canonicalized and must still lie under the canonical root, so a
// symlink inside the tree cannot be used to reach outside it.

use std::io;
use std::path::{Path, PathBuf};

use folio_common::path::DocPath;

use super::StoreError;

#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Creates the root if needed and pins its canonical form.
    pub fn open(root: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(root)?;
        Ok(Self { root: root.canonicalize()? })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Parses and resolves a request path to an absolute path under the root.
    pub fn resolve(&self, raw: &str) -> Result<(DocPath, PathBuf), StoreError> {
        let doc_path = DocPath::parse(raw)?;
        let absolute = self.resolve_doc_path(&doc_path)?;
        Ok((doc_path, absolute))
    }

    pub fn resolve_doc_path(&self, doc_path: &DocPath) -> Result<PathBuf, StoreError> {
        let mut absolute = self.root.clone();
        absolute.extend(doc_path.components());

        let mut probe = absolute.as_path();
        loop {
            match probe.symlink_metadata() {
                Ok(_) => {
                    // Dangling links fail to canonicalize and are rejected too.
                    let canonical = probe
                        .canonicalize()
                        .map_err(|_| StoreError::OutsideRoot(doc_path.to_string()))?;
                    if !canonical.starts_with(&self.root) {
                        return Err(StoreError::OutsideRoot(doc_path.to_string()));
                    }
                    break;
                }
                Err(_) => match probe.parent() {
                    Some(parent) if parent.starts_with(&self.root) => probe = parent,
                    _ => break,
                },
            }
        }

        Ok(absolute)
    }

    /// Root-relative, `/`-separated form of an absolute path under the root.
    pub fn relative(&self, absolute: &Path) -> Option<String> {
        let rel = absolute.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> =
            rel.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
        Some(parts.join("/"))
    }
}

// Document path canonicalization: NFKC normalization, traversal rejection,
// reserved-name rejection, 512 char max.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Maximum allowed path length in characters.
const MAX_PATH_CHARS: usize = 512;

/// Components with this prefix are owned by the server (trash, temp files).
pub const RESERVED_PREFIX: &str = ".folio";

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("path exceeds maximum length of {MAX_PATH_CHARS} characters")]
    TooLong,

    #[error("path contains directory traversal component: {0}")]
    Traversal(String),

    #[error("path contains null byte")]
    NullByte,

    #[error("path contains invalid component: {0}")]
    InvalidComponent(String),

    #[error("path uses reserved name: {0}")]
    Reserved(String),
}

/// Normalize a relative document path.
///
/// - Unicode NFKC, `\` treated as `/`
/// - empty segments collapsed, leading and trailing `/` stripped
/// - `.` and `..` rejected (never resolved)
/// - NUL, whitespace-only components and reserved names rejected
/// - at most 512 characters after normalization
pub fn normalize_path(input: &str) -> Result<String, PathError> {
    if input.contains('\0') {
        return Err(PathError::NullByte);
    }

    let normalized: String = input.nfkc().collect();
    let unified = normalized.replace('\\', "/");
    let components: Vec<&str> = unified.split('/').filter(|s| !s.is_empty()).collect();

    if components.is_empty() {
        return Err(PathError::Empty);
    }

    for component in &components {
        match *component {
            "." | ".." => return Err(PathError::Traversal((*component).to_string())),
            c if c.trim().is_empty() => {
                return Err(PathError::InvalidComponent("(whitespace-only component)".into()))
            }
            c if c.starts_with(RESERVED_PREFIX) => return Err(PathError::Reserved(c.to_string())),
            _ => {}
        }
    }

    let result = components.join("/");
    if result.chars().count() > MAX_PATH_CHARS {
        return Err(PathError::TooLong);
    }

    Ok(result)
}

/// A normalized, root-relative document path such as `notes/todo.md`.
///
/// Only constructible through [`DocPath::parse`], so every value satisfies
/// the rules of [`normalize_path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocPath(String);

impl DocPath {
    pub fn parse(input: &str) -> Result<Self, PathError> {
        normalize_path(input).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final component (`todo.md` for `notes/todo.md`).
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Parent directory, or `None` for a top-level entry.
    pub fn parent(&self) -> Option<DocPath> {
        self.0.rsplit_once('/').map(|(parent, _)| DocPath(parent.to_string()))
    }

    /// Append a relative path below this one.
    pub fn join(&self, child: &str) -> Result<DocPath, PathError> {
        DocPath::parse(&format!("{}/{}", self.0, child))
    }

    /// Iterate the `/`-separated components.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// True when `self` equals `ancestor` or lies beneath it.
    pub fn starts_with(&self, ancestor: &DocPath) -> bool {
        self.0 == ancestor.0
            || (self.0.starts_with(&ancestor.0) && self.0[ancestor.0.len()..].starts_with('/'))
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DocPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DocPath::parse(&value)
    }
}

impl From<DocPath> for String {
    fn from(value: DocPath) -> Self {
        value.0
    }
}

impl AsRef<str> for DocPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

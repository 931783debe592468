// Server-side file operations as seen from the client.
//
// The sync engine only talks to the server through `RemoteFiles`, so tests
// can drive it with an in-memory double.

pub mod http;

use std::future::Future;

use folio_common::path::DocPath;
use folio_common::protocol::http::{ContentResponse, EntryKind, WriteResponse};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("document not found")]
    NotFound,
    #[error("base fingerprint is stale")]
    VersionConflict { current_content: Option<String> },
    #[error("patch could not be applied")]
    PatchApplyFailed { current_content: Option<String> },
    #[error("destination already exists")]
    DestinationExists,
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("server unreachable: {0}")]
    Unreachable(String),
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
}

impl RemoteError {
    /// Whether a failed patch should be retried as a full overwrite. Only
    /// transport failures and rejected paths are final.
    pub fn falls_back_to_overwrite(&self) -> bool {
        !matches!(self, Self::Unreachable(_) | Self::InvalidPath(_))
    }
}

pub trait RemoteFiles: Send + Sync {
    fn read(
        &self,
        path: &DocPath,
    ) -> impl Future<Output = Result<ContentResponse, RemoteError>> + Send;

    /// Unconditional overwrite; creates the document when missing.
    fn full_update(
        &self,
        path: &DocPath,
        content: &str,
    ) -> impl Future<Output = Result<WriteResponse, RemoteError>> + Send;

    /// Conditional update against `base_fingerprint`.
    fn patch(
        &self,
        path: &DocPath,
        patch: &str,
        base_fingerprint: &str,
    ) -> impl Future<Output = Result<WriteResponse, RemoteError>> + Send;

    fn create(
        &self,
        path: &DocPath,
        kind: EntryKind,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn delete(&self, path: &DocPath) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn rename(
        &self,
        old: &DocPath,
        new: &DocPath,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn move_to(
        &self,
        old: &DocPath,
        new: &DocPath,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

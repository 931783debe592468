// Consistent exit codes for the folio CLI.
//
//   0  = success
//   1  = general error
//   2  = usage/argument error
//   10 = server unreachable (edits kept locally)
//   11 = document not found
//   12 = conflict (destination exists)

use std::process;

use folio_client::{RemoteError, SyncError};
use folio_common::path::PathError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
    Offline = 10,
    NotFound = 11,
    Conflict = 12,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(remote) = cause.downcast_ref::<RemoteError>() {
                return Self::from_remote(remote);
            }
            if let Some(sync) = cause.downcast_ref::<SyncError>() {
                return match sync {
                    SyncError::NotFound => Self::NotFound,
                    SyncError::Remote(remote) => Self::from_remote(remote),
                    SyncError::Drafts(_) => Self::Error,
                };
            }
            if cause.downcast_ref::<PathError>().is_some() {
                return Self::Usage;
            }
        }
        Self::Error
    }

    fn from_remote(err: &RemoteError) -> Self {
        match err {
            RemoteError::Unreachable(_) => Self::Offline,
            RemoteError::NotFound => Self::NotFound,
            RemoteError::DestinationExists | RemoteError::VersionConflict { .. } => Self::Conflict,
            RemoteError::InvalidPath(_) => Self::Usage,
            RemoteError::PatchApplyFailed { .. } | RemoteError::Server { .. } => Self::Error,
        }
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code() as u8)
    }
}

// Folio client: local draft cache, sync engine and the HTTP remote it
// pushes to.

pub mod config;
pub mod engine;
pub mod remote;
pub mod store;

pub use config::ClientConfig;
pub use engine::{
    DocStatus, EngineConfig, LoadSource, LoadedDocument, SyncEngine, SyncError, SyncOutcome,
};
pub use remote::{http::HttpRemote, RemoteError, RemoteFiles};
pub use store::drafts::{Draft, DraftStore, DraftStoreError};

// folio-server library: file store, asset store, collector and HTTP API.

pub mod api;
pub mod assets;
pub mod config;
pub mod cors;
pub mod error;
pub mod gc;
pub mod store;

pub use api::{build_app, AppState};
pub use config::ServerConfig;

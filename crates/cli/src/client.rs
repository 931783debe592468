// Shared command context: resolved config, output format and the handles
// commands need to talk to the server and the draft cache.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use folio_client::{ClientConfig, DraftStore, HttpRemote, SyncEngine};
use folio_common::path::DocPath;

use crate::output::OutputFormat;

pub struct Context {
    pub config: ClientConfig,
    pub format: OutputFormat,
}

impl Context {
    pub fn load(
        config_path: Option<&Path>,
        server_override: Option<String>,
        format: OutputFormat,
    ) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => ClientConfig::load_from(path)
                .with_context(|| format!("failed to load config `{}`", path.display()))?,
            None => ClientConfig::load(),
        };
        if let Some(server) = server_override {
            config.server_url = server;
        }
        Ok(Self { config, format })
    }

    pub fn remote(&self) -> Result<HttpRemote> {
        HttpRemote::new(&self.config.server_url, self.config.request_timeout())
    }

    pub fn drafts(&self) -> Result<DraftStore> {
        let path = self.config.drafts_db_path();
        DraftStore::open(&path)
            .with_context(|| format!("failed to open draft cache `{}`", path.display()))
    }

    pub fn engine(&self) -> Result<SyncEngine<HttpRemote>> {
        Ok(SyncEngine::new(self.remote()?, Arc::new(self.drafts()?), self.config.engine_config()))
    }
}

pub fn doc_path(raw: &str) -> Result<DocPath> {
    DocPath::parse(raw).with_context(|| format!("invalid document path `{raw}`"))
}

/// Run a future to completion on a fresh current-thread runtime.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    Ok(runtime.block_on(future))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_override_replaces_configured_url() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("config.toml");
        ClientConfig { server_url: "http://configured:1".into(), ..ClientConfig::default() }
            .save_to(&path)
            .expect("config should save");

        let ctx = Context::load(Some(&path), Some("http://override:2".into()), OutputFormat::Json)
            .expect("context should load");
        assert_eq!(ctx.config.server_url, "http://override:2");
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let result = Context::load(Some(&dir.path().join("nope.toml")), None, OutputFormat::Json);
        assert!(result.is_err());
    }

    #[test]
    fn doc_path_rejects_traversal() {
        assert!(doc_path("../etc/passwd").is_err());
        assert_eq!(doc_path("notes//a.md").expect("valid path").as_str(), "notes/a.md");
    }

    #[test]
    fn block_on_runs_future() {
        assert_eq!(block_on(async { 41 + 1 }).expect("runtime should start"), 42);
    }
}

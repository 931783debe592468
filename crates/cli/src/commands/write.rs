// `folio write`: replace a document's content from stdin or a file and
// push it right away. When the server is unreachable the edit stays in the
// draft cache for the next `folio sync`.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use folio_client::{DocStatus, RemoteError};
use serde::{Deserialize, Serialize};

use crate::client::{self, Context};
use crate::output;

#[derive(Debug, Args)]
pub struct WriteArgs {
    /// Document path.
    pub path: String,

    /// Read content from this file instead of stdin.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    pub path: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

pub fn run(args: WriteArgs, ctx: &Context) -> Result<()> {
    let path = client::doc_path(&args.path)?;
    let content = read_content(args.file.as_ref())?;
    let engine = ctx.engine()?;

    engine.edit(&path, content);
    let outcome = client::block_on(engine.force_save(&path))?;
    let status = engine.status(&path);

    if !outcome.success {
        let error = outcome.error.unwrap_or_else(|| "push failed".to_string());
        if status == DocStatus::Offline {
            output::print_warning(
                ctx.format,
                "SAVED_LOCALLY",
                &format!("{path} saved locally; run `folio sync` once the server is reachable"),
            );
            return Err(RemoteError::Unreachable(error).into());
        }
        anyhow::bail!("failed to push `{path}`: {error}");
    }

    let result = WriteResult {
        path: path.to_string(),
        status: status.to_string(),
        fingerprint: outcome.fingerprint,
        last_modified: outcome.last_modified.map(|t| t.to_rfc3339()),
    };
    output::print_output(ctx.format, &result, format_human)?;
    Ok(())
}

fn read_content(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read `{}`", path.display())),
        None => {
            let mut content = String::new();
            std::io::stdin().read_to_string(&mut content).context("failed to read stdin")?;
            Ok(content)
        }
    }
}

fn format_human(result: &WriteResult) -> String {
    match &result.fingerprint {
        Some(fp) => format!("{} {} ({})", result.status, result.path, short(fp)),
        None => format!("{} {}", result.status, result.path),
    }
}

fn short(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}

// `folio open`: print a document, reconciling the server copy with any
// local draft.

use clap::Args;
use folio_client::LoadSource;
use serde::{Deserialize, Serialize};

use crate::client::{self, Context};
use crate::output;

#[derive(Debug, Args)]
pub struct OpenArgs {
    /// Document path.
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenResult {
    pub path: String,
    /// `server` or `local`.
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    pub content: String,
}

pub fn run(args: OpenArgs, ctx: &Context) -> anyhow::Result<()> {
    let path = client::doc_path(&args.path)?;
    let engine = ctx.engine()?;

    let loaded = client::block_on(async {
        let loaded = engine.load(&path).await?;
        // A dirty draft won the load; push it now since no timer will.
        if loaded.source == LoadSource::Local && loaded.notice.is_none() {
            let outcome = engine.sync_file(&path).await;
            if let Some(error) = outcome.error {
                tracing::warn!(path = %path, error = %error, "push of local draft failed");
            }
        }
        anyhow::Ok(loaded)
    })??;

    if let Some(notice) = loaded.notice {
        output::print_warning(ctx.format, "OFFLINE_COPY", &format!("{path}: {notice}"));
    }

    let result = OpenResult {
        path: path.to_string(),
        source: source_label(loaded.source).to_string(),
        notice: loaded.notice.map(str::to_string),
        content: loaded.content,
    };
    output::print_output(ctx.format, &result, format_human)?;
    Ok(())
}

fn source_label(source: LoadSource) -> &'static str {
    match source {
        LoadSource::Server => "server",
        LoadSource::Local => "local",
    }
}

fn format_human(result: &OpenResult) -> String {
    result.content.strip_suffix('\n').unwrap_or(&result.content).to_string()
}

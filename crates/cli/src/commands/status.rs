// `folio status`: list cached drafts and whether the server has them.
// Reads only the local draft cache; works offline.

use anyhow::Result;
use clap::Args;
use folio_client::Draft;
use serde::{Deserialize, Serialize};

use crate::client::Context;
use crate::output;

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Only show drafts with unsynced edits.
    #[arg(long)]
    pub dirty: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResult {
    pub drafts: Vec<DraftStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftStatus {
    pub path: String,
    pub dirty: bool,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_last_modified: Option<String>,
}

impl From<&Draft> for DraftStatus {
    fn from(draft: &Draft) -> Self {
        Self {
            path: draft.path.to_string(),
            dirty: draft.dirty,
            updated_at: draft.timestamp.to_rfc3339(),
            server_last_modified: draft.server_last_modified.map(|t| t.to_rfc3339()),
        }
    }
}

pub fn run(args: StatusArgs, ctx: &Context) -> Result<()> {
    let store = ctx.drafts()?;
    let drafts = if args.dirty { store.list_dirty()? } else { store.list()? };
    let result = StatusResult { drafts: drafts.iter().map(DraftStatus::from).collect() };
    output::print_output(ctx.format, &result, format_human)?;
    Ok(())
}

fn format_human(result: &StatusResult) -> String {
    if result.drafts.is_empty() {
        return "no cached drafts".to_string();
    }
    result
        .drafts
        .iter()
        .map(|d| {
            let marker = if d.dirty { "M" } else { " " };
            format!("{marker} {}  {}", d.path, d.updated_at)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

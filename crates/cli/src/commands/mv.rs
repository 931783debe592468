// `folio mv`: move a document or directory, creating missing parents.

use anyhow::Result;
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::client::{self, Context};
use crate::output;

#[derive(Debug, Args)]
pub struct MvArgs {
    /// Current path.
    pub from: String,
    /// Destination path.
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveResult {
    pub from: String,
    pub to: String,
}

pub fn run(args: MvArgs, ctx: &Context) -> Result<()> {
    let from = client::doc_path(&args.from)?;
    let to = client::doc_path(&args.to)?;
    let engine = ctx.engine()?;
    client::block_on(engine.move_document(&from, &to))??;
    let result = MoveResult { from: from.to_string(), to: to.to_string() };
    output::print_output(ctx.format, &result, |r| format_human("moved", r))?;
    Ok(())
}

/// Shared with `folio rename`.
pub(crate) fn format_human(verb: &str, result: &MoveResult) -> String {
    format!("{verb} {} -> {}", result.from, result.to)
}

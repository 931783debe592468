// `folio rename`: rename in place. The destination's parent must exist.

use anyhow::Result;
use clap::Args;

use crate::client::{self, Context};
use crate::commands::mv::{self, MoveResult};
use crate::output;

#[derive(Debug, Args)]
pub struct RenameArgs {
    /// Current path.
    pub from: String,
    /// New path.
    pub to: String,
}

pub fn run(args: RenameArgs, ctx: &Context) -> Result<()> {
    let from = client::doc_path(&args.from)?;
    let to = client::doc_path(&args.to)?;
    let engine = ctx.engine()?;
    client::block_on(engine.rename_document(&from, &to))??;
    let result = MoveResult { from: from.to_string(), to: to.to_string() };
    output::print_output(ctx.format, &result, |r| mv::format_human("renamed", r))?;
    Ok(())
}

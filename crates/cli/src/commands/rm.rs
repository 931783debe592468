// `folio rm`: delete a document or directory on the server and drop its
// cached drafts.

use anyhow::Result;
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::client::{self, Context};
use crate::output;

#[derive(Debug, Args)]
pub struct RmArgs {
    /// Document or directory path.
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RmResult {
    pub deleted: String,
}

pub fn run(args: RmArgs, ctx: &Context) -> Result<()> {
    let path = client::doc_path(&args.path)?;
    let engine = ctx.engine()?;
    client::block_on(engine.delete_document(&path))??;
    output::print_output(ctx.format, &RmResult { deleted: path.to_string() }, |r| {
        format!("deleted {}", r.deleted)
    })?;
    Ok(())
}

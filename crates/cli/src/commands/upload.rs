// `folio upload`: upload an asset and print a Markdown snippet that
// references it.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::client::{self, Context};
use crate::output;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg", "avif"];

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// File to upload.
    pub file: PathBuf,

    /// Name sent to the server; its extension picks the stored extension.
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResult {
    pub path: String,
    pub markdown: String,
}

pub fn run(args: UploadArgs, ctx: &Context) -> Result<()> {
    let name = match args.name {
        Some(name) => name,
        None => args
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("`{}` has no file name", args.file.display()))?,
    };
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("failed to read `{}`", args.file.display()))?;

    let remote = ctx.remote()?;
    let uploaded = client::block_on(remote.upload_asset(&name, bytes))??;
    let result = UploadResult { markdown: markdown_snippet(&name, &uploaded.path), path: uploaded.path };
    output::print_output(ctx.format, &result, |r| r.markdown.clone())?;
    Ok(())
}

fn markdown_snippet(name: &str, url: &str) -> String {
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    let is_image = name
        .rsplit_once('.')
        .is_some_and(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
    if is_image {
        format!("![{stem}]({url})")
    } else {
        format!("[{name}]({url})")
    }
}

// CLI subcommand dispatch.

use clap::Subcommand;

use crate::client::Context;

pub mod gc;
pub mod mv;
pub mod open;
pub mod rename;
pub mod rm;
pub mod status;
pub mod sync;
pub mod tree;
pub mod upload;
pub mod write;

#[derive(Subcommand)]
pub enum Command {
    /// Print a document, preferring unsynced local edits
    Open(open::OpenArgs),
    /// Replace a document's content and push it
    Write(write::WriteArgs),
    /// Push every draft with unsynced edits
    Sync(sync::SyncArgs),
    /// List locally cached drafts and their sync state
    Status(status::StatusArgs),
    /// List the server's file tree
    Tree(tree::TreeArgs),
    /// Delete a document or directory
    Rm(rm::RmArgs),
    /// Move a document or directory, creating parents as needed
    Mv(mv::MvArgs),
    /// Rename a document or directory in place
    Rename(rename::RenameArgs),
    /// Upload an image or other asset
    Upload(upload::UploadArgs),
    /// Run one garbage-collection pass over uploaded assets
    Gc(gc::GcArgs),
}

pub fn run(cmd: Command, ctx: &Context) -> anyhow::Result<()> {
    match cmd {
        Command::Open(args) => open::run(args, ctx),
        Command::Write(args) => write::run(args, ctx),
        Command::Sync(args) => sync::run(args, ctx),
        Command::Status(args) => status::run(args, ctx),
        Command::Tree(args) => tree::run(args, ctx),
        Command::Rm(args) => rm::run(args, ctx),
        Command::Mv(args) => mv::run(args, ctx),
        Command::Rename(args) => rename::run(args, ctx),
        Command::Upload(args) => upload::run(args, ctx),
        Command::Gc(args) => gc::run(args, ctx),
    }
}

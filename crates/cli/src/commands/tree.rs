// `folio tree`: list every file and directory on the server.

use anyhow::Result;
use clap::Args;
use folio_common::protocol::http::{EntryKind, TreeResponse};

use crate::client::{self, Context};
use crate::output;

#[derive(Debug, Args)]
pub struct TreeArgs {}

pub fn run(_args: TreeArgs, ctx: &Context) -> Result<()> {
    let remote = ctx.remote()?;
    let tree = client::block_on(remote.tree())??;
    output::print_output(ctx.format, &tree, format_human)?;
    Ok(())
}

fn format_human(tree: &TreeResponse) -> String {
    if tree.items.is_empty() {
        return "(empty)".to_string();
    }
    let mut items: Vec<_> = tree.items.iter().collect();
    items.sort_by(|a, b| a.path.cmp(&b.path));
    items
        .into_iter()
        .map(|entry| {
            let depth = entry.path.matches('/').count();
            let name = entry.path.rsplit('/').next().unwrap_or(&entry.path);
            let indent = "  ".repeat(depth);
            match entry.kind {
                EntryKind::Directory => format!("{indent}{name}/"),
                EntryKind::File => format!("{indent}{name}  ({} bytes)", entry.size),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use folio_common::protocol::http::TreeEntry;

    fn entry(path: &str, kind: EntryKind, size: u64) -> TreeEntry {
        TreeEntry {
            path: path.into(),
            kind,
            size,
            last_modified: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid date"),
        }
    }

    #[test]
    fn human_format_indents_by_depth() {
        let tree = TreeResponse {
            items: vec![
                entry("notes/todo.md", EntryKind::File, 12),
                entry("notes", EntryKind::Directory, 0),
                entry("readme.md", EntryKind::File, 3),
            ],
        };
        assert_eq!(format_human(&tree), "notes/\n  todo.md  (12 bytes)\nreadme.md  (3 bytes)");
    }

    #[test]
    fn human_format_empty_tree() {
        assert_eq!(format_human(&TreeResponse { items: vec![] }), "(empty)");
    }
}
